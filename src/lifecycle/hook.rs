//! Hook contract
//!
//! A hook is a zero-argument asynchronous unit of work bound to one
//! [`Phase`](super::Phase). Services implement [`Hook`] directly; plain async
//! closures are adapted with [`hook_fn`].

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Work attached to a lifecycle phase
///
/// Use this hook to:
/// - Open or close network listeners
/// - Warm up caches
/// - Flush telemetry before exit
///
/// # Example
///
/// ```rust,ignore
/// use runlevel::lifecycle::Hook;
/// use async_trait::async_trait;
///
/// #[async_trait]
/// impl Hook for MetricsFlusher {
///     async fn run(&self) -> anyhow::Result<()> {
///         self.exporter.flush().await?;
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "MetricsFlusher"
///     }
/// }
/// ```
#[async_trait]
pub trait Hook: Send + Sync {
    /// Run the hook. An `Err` aborts the remaining hooks of the phase.
    async fn run(&self) -> anyhow::Result<()>;

    /// Name used in logs and errors
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A registered hook
pub type SharedHook = Arc<dyn Hook>;

#[async_trait]
impl<T: Hook + ?Sized> Hook for Arc<T> {
    async fn run(&self) -> anyhow::Result<()> {
        (**self).run().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Named closure hook, built by [`hook_fn`]
pub struct HookFn<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> Hook for HookFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self) -> anyhow::Result<()> {
        (self.f)().await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap an async closure as a named hook
///
/// ```rust,ignore
/// app.once(Phase::Ready, hook_fn("listener", move || {
///     let server = server.clone();
///     async move { server.listen().await }
/// }));
/// ```
pub fn hook_fn<F, Fut>(name: impl Into<String>, f: F) -> HookFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    HookFn {
        name: name.into(),
        f,
    }
}

/// Where newly registered hooks go within a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Run after everything already registered
    #[default]
    Append,
    /// Run before everything already registered
    Prepend,
}

/// One hook or an ordered list of hooks
pub trait IntoHooks {
    fn into_hooks(self) -> Vec<SharedHook>;
}

impl<H: Hook + 'static> IntoHooks for H {
    fn into_hooks(self) -> Vec<SharedHook> {
        vec![Arc::new(self) as SharedHook]
    }
}

impl<H: Hook + 'static> IntoHooks for Vec<H> {
    fn into_hooks(self) -> Vec<SharedHook> {
        self.into_iter()
            .map(|hook| Arc::new(hook) as SharedHook)
            .collect()
    }
}
