//! Application controller
//!
//! Owns the run state, walks the [`Ladder`] forward once on `start` and once
//! on `stop`, and lets collaborators attach hooks to phases.

use super::{
    HookRegistry, IntoHooks, Ladder, LifecycleError, OneShotTimer, Order, Phase, Result, RunState,
    Transition, run_sequential,
};
use crate::config::LifecycleConfig;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

/// Outcome of a start or stop, shared by every caller of that operation
type Flight = Shared<BoxFuture<'static, Result<()>>>;

struct Inner {
    config: LifecycleConfig,
    registry: HookRegistry,
    ladder: Mutex<Ladder>,
    state: watch::Sender<RunState>,
    /// Release gate: present while `start` is parked in `running`
    gate: Mutex<Option<oneshot::Sender<()>>>,
    start_flight: Mutex<Option<Flight>>,
    stop_flight: Mutex<Option<Flight>>,
}

/// Lifecycle controller for one process
///
/// Cheap to clone; all clones drive the same lifecycle.
///
/// # Example
///
/// ```rust,ignore
/// use runlevel::prelude::*;
///
/// let app = Application::builder()
///     .shutdown_timeout(Duration::from_secs(15))
///     .on(Phase::Ready, hook_fn("http", move || open_listener(addr)))
///     .on(Phase::ShuttingDown, hook_fn("http", move || close_listener()))
///     .build();
///
/// let reporter = ShutdownSupervisor::new(app.clone()).install()?;
/// app.start().await?; // returns once the application is stopped
/// reporter.wait().await; // lets the supervisor pick the exit code
/// ```
#[derive(Clone)]
pub struct Application {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Application {
    /// Create an application with no hooks registered
    pub fn new(config: LifecycleConfig) -> Self {
        Self::with_registry(config, HookRegistry::new())
    }

    fn with_registry(config: LifecycleConfig, registry: HookRegistry) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                ladder: Mutex::new(Ladder::new()),
                state,
                gate: Mutex::new(None),
                start_flight: Mutex::new(None),
                stop_flight: Mutex::new(None),
            }),
        }
    }

    /// Create a new application builder
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.inner.config
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        *self.inner.state.borrow()
    }

    /// Watch run state changes
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.inner.state.subscribe()
    }

    /// Last phase entered, `None` before `start`
    pub fn phase(&self) -> Option<Phase> {
        lock(&self.inner.ladder).current()
    }

    /// Register hooks to run after those already attached to `phase`
    pub fn once(&self, phase: Phase, hooks: impl IntoHooks) {
        self.once_with(phase, hooks, Order::Append);
    }

    /// Register hooks with an explicit [`Order`]
    ///
    /// Hooks registered after `phase` has already run are kept but never run.
    pub fn once_with(&self, phase: Phase, hooks: impl IntoHooks, order: Order) {
        self.inner.registry.register(phase, hooks, order);
    }

    /// Number of hooks attached to `phase`
    pub fn hook_count(&self, phase: Phase) -> usize {
        self.inner.registry.len(phase)
    }

    /// Boot the application and stay parked in `running` until [`stop`] is called
    ///
    /// Returns only after that stop has run the teardown phases, whether or
    /// not they succeeded. Concurrent callers share the in-flight run. Once that run has finished,
    /// further calls fail with [`LifecycleError::AlreadyStarted`]. A failing
    /// startup hook does not fail `start`: it is logged and the application is
    /// stopped instead.
    ///
    /// [`stop`]: Application::stop
    pub async fn start(&self) -> Result<()> {
        let flight = {
            let mut slot = lock(&self.inner.start_flight);
            let in_flight = slot.as_ref().filter(|f| f.peek().is_none()).cloned();
            match in_flight {
                Some(flight) => flight,
                None => {
                    let state = self.state();
                    if state != RunState::Idle {
                        return Err(LifecycleError::AlreadyStarted { state });
                    }
                    let this = self.clone();
                    let flight = async move { this.run_start().await }.boxed().shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };
        flight.await
    }

    /// Release a parked `start` and run the teardown phases
    ///
    /// Concurrent and later callers share the first call's outcome.
    pub async fn stop(&self) -> Result<()> {
        let flight = {
            let mut slot = lock(&self.inner.stop_flight);
            match slot.clone() {
                Some(flight) => flight,
                None => {
                    if self.state() == RunState::Idle {
                        return Err(LifecycleError::NotRunning);
                    }
                    let this = self.clone();
                    let flight = async move { this.run_stop().await }.boxed().shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };
        flight.await
    }

    /// Send SIGTERM to this process
    ///
    /// Self-initiated shutdown then takes the same path as an external
    /// signal, through the installed [`ShutdownSupervisor`](super::ShutdownSupervisor).
    #[cfg(unix)]
    pub fn terminate(&self) -> Result<()> {
        tracing::info!("Requesting termination of this process");
        // SAFETY: kill(2) on our own pid has no memory-safety preconditions.
        let rc = unsafe { libc::kill(libc::getpid(), libc::SIGTERM) };
        if rc != 0 {
            return Err(LifecycleError::signal(format!(
                "failed to send SIGTERM to self: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    /// Self-termination needs unix signals
    #[cfg(not(unix))]
    pub fn terminate(&self) -> Result<()> {
        Err(LifecycleError::signal(
            "self-termination is only supported on unix",
        ))
    }

    /// Move the run state forward; false if `next` is not ahead of it
    fn advance_state(&self, next: RunState) -> bool {
        self.inner.state.send_if_modified(|state| {
            if next > *state {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    /// Enter `phase` if it is ahead of the current one and run its hooks
    async fn enter(&self, phase: Phase) -> Result<Transition> {
        let transition = lock(&self.inner.ladder).advance(phase);
        if transition == Transition::Skipped {
            tracing::debug!(%phase, "Phase already passed, skipping its hooks");
            return Ok(transition);
        }

        let hooks = self.inner.registry.get(phase);
        tracing::info!(%phase, hooks = hooks.len(), "Entering phase");
        run_sequential(phase, &hooks).await?;
        Ok(transition)
    }

    async fn run_start(&self) -> Result<()> {
        self.advance_state(RunState::Starting);
        tracing::info!("Starting application...");

        match self.boot().await {
            Ok(Some(released)) => {
                tracing::info!("Application started");
                // A dropped sender means the gate was discarded; either way we are done.
                let _ = released.await;
                tracing::debug!("Release gate opened");
                self.settle_stop().await;
            }
            Ok(None) => {
                tracing::info!("Stop requested during startup, not entering running state");
                self.settle_stop().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Application failed to start, shutting down");
                if let Err(stop_err) = self.stop().await {
                    tracing::error!(error = %stop_err, "Shutdown after failed start did not complete");
                }
            }
        }
        Ok(())
    }

    /// Wait for the stop that released us to finish its teardown
    ///
    /// Its error belongs to whoever called `stop`.
    async fn settle_stop(&self) {
        let flight = lock(&self.inner.stop_flight).clone();
        if let Some(flight) = flight {
            let _ = flight.await;
        }
    }

    /// Walk the startup phases. Returns the release gate receiver if
    /// `running` was reached before any stop request.
    async fn boot(&self) -> Result<Option<oneshot::Receiver<()>>> {
        let mut reached_running = false;
        for phase in Phase::STARTUP {
            let transition = self.enter(phase).await?;
            reached_running = phase == Phase::Running && transition == Transition::Advanced;
        }
        if !reached_running {
            return Ok(None);
        }

        let (tx, rx) = oneshot::channel();
        let mut gate = lock(&self.inner.gate);
        if !self.advance_state(RunState::Started) {
            return Ok(None);
        }
        *gate = Some(tx);
        Ok(Some(rx))
    }

    async fn run_stop(&self) -> Result<()> {
        {
            let mut gate = lock(&self.inner.gate);
            if let Some(release) = gate.take() {
                let _ = release.send(());
            }
            self.advance_state(RunState::Stopping);
        }
        tracing::info!("Stopping application...");

        for phase in Phase::TEARDOWN {
            self.enter(phase).await?;
        }

        self.advance_state(RunState::Stopped);
        tracing::info!("Application stopped");

        let delay = self.inner.config.exit_warning_delay;
        OneShotTimer::schedule(delay, move || async move {
            warn_still_alive(delay);
        })
        .unref();
        Ok(())
    }
}

fn warn_still_alive(delay: Duration) {
    tracing::warn!(
        ?delay,
        "Process has not exited after stop; something is still keeping it alive"
    );
}

/// Builder for Application
pub struct ApplicationBuilder {
    config: LifecycleConfig,
    registry: HookRegistry,
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationBuilder {
    /// Create a new application builder
    pub fn new() -> Self {
        Self {
            config: LifecycleConfig::default(),
            registry: HookRegistry::new(),
        }
    }

    /// Replace the whole config
    pub fn config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the time allowed for shutdown before a forced exit
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Append hooks to a phase
    pub fn on(self, phase: Phase, hooks: impl IntoHooks) -> Self {
        self.registry.append(phase, hooks);
        self
    }

    /// Register hooks to a phase with an explicit [`Order`]
    pub fn on_with(self, phase: Phase, hooks: impl IntoHooks, order: Order) -> Self {
        self.registry.register(phase, hooks, order);
        self
    }

    pub fn build(self) -> Application {
        Application::with_registry(self.config, self.registry)
    }
}
