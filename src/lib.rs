//! # Runlevel
//!
//! In-process lifecycle supervisor for long-running tokio services.
//!
//! Runlevel walks a service through a fixed ladder of phases, runs the hooks
//! collaborators attached to each phase, and turns SIGTERM, SIGINT, panics
//! and unhandled task errors into exactly one graceful shutdown with a hard
//! exit deadline.
//!
//! ## Features
//!
//! - **Ordered phases**: `booting → booted → ready → running → shutting-down → terminated`
//! - **Hooks**: append or prepend async work to any phase
//! - **Idempotent start/stop**: concurrent callers share one run
//! - **Signal-driven shutdown**: double Ctrl-C forces exit, deadline bounds shutdown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use runlevel::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     runlevel::logging::init_tracing()?;
//!
//!     let app = Application::builder()
//!         .config(LifecycleConfig::from_service(&ConfigService::from_env())?)
//!         .on(Phase::Ready, hook_fn("listener", || async {
//!             tracing::info!("Listening");
//!             Ok(())
//!         }))
//!         .on(Phase::ShuttingDown, hook_fn("listener", || async {
//!             tracing::info!("Closing listener");
//!             Ok(())
//!         }))
//!         .build();
//!
//!     let reporter = ShutdownSupervisor::new(app.clone()).install()?;
//!
//!     // Parks until SIGTERM/SIGINT drives stop(), and returns once teardown is done.
//!     app.start().await?;
//!     // Lets the supervisor end the process with its exit code.
//!     reporter.wait().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod lifecycle;
pub mod logging;

// Re-export core types
pub use config::{ConfigService, LifecycleConfig};
pub use lifecycle::{
    Application, ApplicationBuilder, Hook, LifecycleError, Phase, Result, RunState,
    ShutdownSupervisor,
};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;

/// Prelude module for convenient imports
///
/// ```
/// use runlevel::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigService, LifecycleConfig};
    pub use crate::lifecycle::{
        Application, ApplicationBuilder, FatalReporter, Hook, IntoHooks, LifecycleError, Order,
        Phase, RunState, ShutdownEvent, ShutdownSupervisor, hook_fn,
    };
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
    pub use std::time::Duration;
}
