//! Sequential hook runner

use super::{LifecycleError, Phase, Result, SharedHook};

/// Run `hooks` one at a time, in order
///
/// Hook *i+1* is not started until hook *i* has finished. The first failure
/// stops the chain and is returned; later hooks are never invoked.
pub async fn run_sequential(phase: Phase, hooks: &[SharedHook]) -> Result<()> {
    for hook in hooks {
        tracing::debug!(%phase, hook = hook.name(), "Running hook");
        hook.run()
            .await
            .map_err(|e| LifecycleError::hook_failed(phase, hook.name(), &e))?;
        tracing::debug!(%phase, hook = hook.name(), "Hook complete");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::hook_fn;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str, delay_ms: u64) -> SharedHook {
        let log = Arc::clone(log);
        Arc::new(hook_fn(name, move || {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{name}:start"));
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                log.lock().unwrap().push(format!("{name}:end"));
                Ok(())
            }
        }))
    }

    #[tokio::test]
    async fn test_empty_list_resolves() {
        run_sequential(Phase::Booting, &[]).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_hooks_never_overlap() {
        let log = Arc::new(Mutex::new(Vec::new()));
        // The slow hook goes first; the fast one must still wait for it.
        let hooks = vec![recorder(&log, "slow", 50), recorder(&log, "fast", 1)];

        run_sequential(Phase::Booting, &hooks).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            ["slow:start", "slow:end", "fast:start", "fast:end"]
        );
    }

    #[tokio::test]
    async fn test_failure_skips_remaining_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing: SharedHook = Arc::new(hook_fn("broken", || async {
            anyhow::bail!("disk full")
        }));
        let hooks = vec![recorder(&log, "first", 0), failing, recorder(&log, "never", 0)];

        let err = run_sequential(Phase::Ready, &hooks).await.unwrap_err();

        assert_eq!(
            err,
            LifecycleError::HookFailed {
                phase: Phase::Ready,
                hook: "broken".into(),
                message: "disk full".into(),
            }
        );
        assert_eq!(*log.lock().unwrap(), ["first:start", "first:end"]);
    }
}
