//! Lifecycle Module
//!
//! Sequences one process through a fixed ladder of phases and lets services
//! attach asynchronous hooks to each phase.
//!
//! # Lifecycle Phases
//!
//! ```text
//! start():
//!   booting → booted → ready → running
//!                                 │  parked until stop()
//!                                 ↓
//! stop():
//!   shutting-down → terminated
//! ```
//!
//! Hooks of one phase run one at a time in registration order, and all of
//! them finish before the next phase begins. The ladder only moves forward:
//! a phase that has already been passed is skipped, never re-entered.
//!
//! Run state (what [`Application::state`] reports) is coarser:
//! `idle → starting → started → stopping → stopped`.
//!
//! # Example
//!
//! ```rust,ignore
//! use runlevel::lifecycle::{Application, Hook, Phase, ShutdownSupervisor};
//! use async_trait::async_trait;
//!
//! struct DatabasePool { /* ... */ }
//!
//! #[async_trait]
//! impl Hook for DatabasePool {
//!     async fn run(&self) -> anyhow::Result<()> {
//!         tracing::info!("Closing database connections");
//!         self.close().await
//!     }
//! }
//!
//! let app = Application::builder()
//!     .on(Phase::ShuttingDown, pool)
//!     .build();
//! ShutdownSupervisor::new(app.clone()).install()?;
//! app.start().await?;
//! ```

mod application;
mod error;
mod hook;
mod phase;
mod registry;
mod runner;
mod shutdown;
mod timer;

pub use application::{Application, ApplicationBuilder};
pub use error::{LifecycleError, Result};
pub use hook::{Hook, HookFn, IntoHooks, Order, SharedHook, hook_fn};
pub use phase::{Ladder, Phase, RunState, Transition};
pub use registry::HookRegistry;
pub use runner::run_sequential;
pub use shutdown::{Exit, FatalReporter, ProcessExit, ShutdownEvent, ShutdownSupervisor};
pub use timer::OneShotTimer;
