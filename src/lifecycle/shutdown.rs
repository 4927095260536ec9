//! Graceful Shutdown Supervisor
//!
//! Turns OS signals and fatal process events into exactly one `stop` per
//! shutdown, and makes sure the process exits within the configured timeout.
//!
//! ```text
//! SIGTERM ─┐
//! SIGINT  ─┼─▶ event channel ─▶ shutdown(code) ─▶ Application::stop ─▶ exit(code)
//! panic   ─┤                         │
//! Err task ┘                         └─ deadline timer ─▶ forced exit(code)
//! ```

use super::{Application, LifecycleError, OneShotTimer, Result, RunState};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Set once OS listeners and the panic hook are installed for this process
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Something that should end the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownEvent {
    /// SIGTERM
    Terminate,
    /// SIGINT / Ctrl-C
    Interrupt,
    /// A panic escaped
    Fault(String),
    /// A supervised task returned an error nobody handled
    Rejection(String),
}

impl ShutdownEvent {
    /// Exit code the process ends with for this event
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownEvent::Terminate | ShutdownEvent::Interrupt => 0,
            ShutdownEvent::Fault(_) | ShutdownEvent::Rejection(_) => 1,
        }
    }
}

impl fmt::Display for ShutdownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownEvent::Terminate => write!(f, "SIGTERM"),
            ShutdownEvent::Interrupt => write!(f, "SIGINT"),
            ShutdownEvent::Fault(msg) => write!(f, "uncaught panic: {}", msg),
            ShutdownEvent::Rejection(msg) => write!(f, "unhandled task error: {}", msg),
        }
    }
}

/// Ends the process
pub trait Exit: Send + Sync + 'static {
    fn exit(&self, code: i32);
}

/// [`Exit`] backed by [`std::process::exit`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExit;

impl Exit for ProcessExit {
    fn exit(&self, code: i32) {
        std::process::exit(code)
    }
}

/// How far the supervisor has got towards ending the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Idle,
    Draining,
    Exited(i32),
}

/// [`Exit`] that also tells waiters the process is ending
struct ExitLatch {
    exit: Box<dyn Exit>,
    progress: watch::Sender<Progress>,
}

impl ExitLatch {
    fn exit(&self, code: i32) {
        self.exit.exit(code);
        self.progress.send_replace(Progress::Exited(code));
    }
}

/// Handle for feeding fatal events to a running supervisor
#[derive(Clone)]
pub struct FatalReporter {
    tx: mpsc::UnboundedSender<ShutdownEvent>,
    progress: watch::Receiver<Progress>,
}

impl FatalReporter {
    /// Deliver an event; false if the supervisor is gone
    pub fn send(&self, event: ShutdownEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Report an unrecoverable synchronous failure
    pub fn report_fault(&self, message: impl Into<String>) {
        self.send(ShutdownEvent::Fault(message.into()));
    }

    /// Report an asynchronous failure nobody else will handle
    pub fn report_rejection(&self, err: impl fmt::Display) {
        self.send(ShutdownEvent::Rejection(format!("{err:#}")));
    }

    /// Spawn a task whose error, if any, shuts the process down with code 1
    pub fn spawn_supervised<F, E>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let reporter = self.clone();
        tokio::spawn(async move {
            if let Err(e) = task.await {
                reporter.report_rejection(e);
            }
        })
    }

    /// Park while the supervisor is shutting the process down
    ///
    /// Call this after [`Application::start`] returns so `main` cannot end
    /// the runtime under an in-flight shutdown. Returns `None` at once if no
    /// shutdown was requested through the supervisor (the application was
    /// stopped directly). With [`ProcessExit`] it never returns once a
    /// shutdown has begun; with a custom [`Exit`] it yields the exit code.
    pub async fn wait(&self) -> Option<i32> {
        let mut progress = self.progress.clone();
        let settled = match progress.wait_for(|p| *p != Progress::Draining).await {
            Ok(p) => *p,
            Err(_) => return None,
        };
        match settled {
            Progress::Exited(code) => Some(code),
            _ => None,
        }
    }
}

/// Drives [`Application::stop`] from signals and fatal events
///
/// # Example
///
/// ```rust,ignore
/// use runlevel::lifecycle::{Application, ShutdownSupervisor};
///
/// let app = Application::builder().build();
/// let reporter = ShutdownSupervisor::new(app.clone()).install()?;
/// reporter.spawn_supervised(background_sync());
/// app.start().await?;
/// reporter.wait().await;
/// ```
pub struct ShutdownSupervisor {
    app: Application,
    exit: Arc<ExitLatch>,
    force_requested: AtomicBool,
}

impl ShutdownSupervisor {
    /// Supervisor that ends the real process
    pub fn new(app: Application) -> Self {
        Self::with_exit(app, ProcessExit)
    }

    /// Supervisor with a custom [`Exit`]
    pub fn with_exit(app: Application, exit: impl Exit) -> Self {
        let (progress, _) = watch::channel(Progress::Idle);
        Self {
            app,
            exit: Arc::new(ExitLatch {
                exit: Box::new(exit),
                progress,
            }),
            force_requested: AtomicBool::new(false),
        }
    }

    /// Start handling events from the returned reporter
    ///
    /// Each event is handled on its own task so a repeated signal is seen
    /// while an earlier one is still waiting on `stop`.
    pub fn spawn(self) -> FatalReporter {
        let (tx, mut rx) = mpsc::unbounded_channel::<ShutdownEvent>();
        let progress = self.exit.progress.subscribe();
        let supervisor = Arc::new(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let code = event.exit_code();
                if code == 0 {
                    tracing::info!(%event, "Received shutdown signal");
                } else {
                    tracing::error!(%event, "Fatal error, shutting down");
                }
                let supervisor = Arc::clone(&supervisor);
                tokio::spawn(async move { supervisor.shutdown(code).await });
            }
        });
        FatalReporter { tx, progress }
    }

    /// [`spawn`](Self::spawn), then subscribe to SIGTERM, SIGINT and panics
    ///
    /// Only one supervisor may be installed per process. A failed attempt
    /// leaves nothing behind, so it can be retried.
    pub fn install(self) -> Result<FatalReporter> {
        let signals = claim(&INSTALLED, SignalSources::open)?;
        let reporter = self.spawn();
        signals.forward(&reporter);
        install_panic_hook(reporter.clone());
        tracing::debug!("Shutdown supervisor installed");
        Ok(reporter)
    }

    /// Shut down and exit with `code`
    ///
    /// A second graceful signal during shutdown asks for a forced exit; a
    /// third one exits immediately.
    pub async fn shutdown(&self, code: i32) {
        // Keep log lines off the terminal's ^C echo.
        eprintln!();

        self.exit.progress.send_if_modified(|progress| {
            if *progress == Progress::Idle {
                *progress = Progress::Draining;
                true
            } else {
                false
            }
        });
        let deadline = self.arm_deadline(code);

        if code == 0 && self.app.state() == RunState::Stopping {
            if self.force_requested.swap(true, Ordering::SeqCst) {
                tracing::warn!("Forcing exit");
                deadline.cancel();
                self.exit.exit(code);
            } else {
                tracing::warn!("Shutdown already in progress, signal again to force exit");
                deadline.unref();
            }
            return;
        }

        if self.app.state() != RunState::Stopped {
            if let Err(e) = self.app.stop().await {
                tracing::error!(error = %e, "Error during shutdown");
            }
        }

        deadline.cancel();
        self.exit.exit(code);
    }

    fn arm_deadline(&self, code: i32) -> OneShotTimer {
        let exit = Arc::clone(&self.exit);
        let timeout = self.app.config().shutdown_timeout;
        OneShotTimer::schedule(timeout, move || async move {
            tracing::error!(?timeout, code, "Shutdown timed out, forcing exit");
            exit.exit(code);
        })
    }
}

/// Take the process-wide installation slot, giving it back if `open` fails
fn claim<T>(slot: &AtomicBool, open: impl FnOnce() -> Result<T>) -> Result<T> {
    if slot.swap(true, Ordering::SeqCst) {
        return Err(LifecycleError::signal(
            "a shutdown supervisor is already installed",
        ));
    }
    open().inspect_err(|_| slot.store(false, Ordering::SeqCst))
}

/// OS signal streams, opened before anything is spawned
#[cfg(unix)]
struct SignalSources(Vec<(tokio::signal::unix::Signal, ShutdownEvent)>);

#[cfg(unix)]
impl SignalSources {
    fn open() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        let kinds = [
            (SignalKind::terminate(), ShutdownEvent::Terminate),
            (SignalKind::interrupt(), ShutdownEvent::Interrupt),
        ];
        let mut sources = Vec::with_capacity(kinds.len());
        for (kind, event) in kinds {
            let stream = signal(kind).map_err(|e| {
                LifecycleError::signal(format!("failed to install {event} handler: {e}"))
            })?;
            sources.push((stream, event));
        }
        Ok(Self(sources))
    }

    fn forward(self, reporter: &FatalReporter) {
        for (mut stream, event) in self.0 {
            let reporter = reporter.clone();
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    if !reporter.send(event.clone()) {
                        break;
                    }
                }
            });
        }
    }
}

#[cfg(not(unix))]
struct SignalSources;

#[cfg(not(unix))]
impl SignalSources {
    fn open() -> Result<Self> {
        Ok(Self)
    }

    fn forward(self, reporter: &FatalReporter) {
        let reporter = reporter.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !reporter.send(ShutdownEvent::Interrupt) {
                    break;
                }
            }
        });
    }
}

/// Chain a panic hook that reports the panic after the default output
fn install_panic_hook(reporter: FatalReporter) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        previous(info);
        reporter.report_fault(info.to_string());
    }));
}
