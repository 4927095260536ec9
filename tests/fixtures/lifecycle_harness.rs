//! Small service wired the way a real binary wires runlevel.
//!
//! `runlevel-harness <task-error|sigterm>` prints one stdout line per
//! teardown step so a parent process can check what ran before exit.

use runlevel::prelude::*;

fn teardown_step(name: &'static str) -> impl IntoHooks {
    hook_fn(name, move || async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        println!("teardown {name}");
        Ok(())
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let scenario = std::env::args().nth(1).unwrap_or_default();

    let app = Application::builder()
        .config(LifecycleConfig::from_service(&ConfigService::from_env())?)
        .on(Phase::ShuttingDown, teardown_step("shutting-down"))
        .on(Phase::Terminated, teardown_step("terminated"))
        .build();
    let reporter = ShutdownSupervisor::new(app.clone()).install()?;

    match scenario.as_str() {
        "task-error" => {
            reporter.spawn_supervised(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err::<(), _>(anyhow::anyhow!("upstream closed"))
            });
        }
        "sigterm" => {
            let terminator = app.clone();
            app.once(
                Phase::Running,
                hook_fn("self-terminate", move || {
                    let app = terminator.clone();
                    async move {
                        tokio::spawn(async move {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            if let Err(e) = app.terminate() {
                                eprintln!("terminate failed: {e}");
                            }
                        });
                        Ok(())
                    }
                }),
            );
        }
        other => anyhow::bail!("unknown scenario {other:?}"),
    }

    app.start().await?;
    reporter.wait().await;
    println!("main returning");
    Ok(())
}
