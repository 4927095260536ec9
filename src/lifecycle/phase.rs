//! Lifecycle ladder
//!
//! The six phases form a fixed total order. The application only ever moves
//! forward along it; a request to move sideways or backwards is skipped, not
//! rejected.

use strum_macros::{Display, EnumIter};

/// One step of the boot/teardown ladder, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Phase {
    /// First phase of `start`
    Booting,
    /// Core services are up
    Booted,
    /// Everything is wired; about to serve
    Ready,
    /// Serving; `start` parks here until released
    Running,
    /// First phase of `stop`
    ShuttingDown,
    /// Last phase; nothing runs after it
    Terminated,
}

impl Phase {
    /// Phases walked by `start`
    pub const STARTUP: [Phase; 4] = [Phase::Booting, Phase::Booted, Phase::Ready, Phase::Running];

    /// Phases walked by `stop`
    pub const TEARDOWN: [Phase; 2] = [Phase::ShuttingDown, Phase::Terminated];

    /// Position in the ladder
    pub fn ordinal(self) -> usize {
        self as usize
    }
}

/// Externally visible status of the application
///
/// Advances idle → starting → started → stopping → stopped, once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Starting,
    Started,
    Stopping,
    Stopped,
}

/// Outcome of a transition request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The ladder moved; run the phase's hooks
    Advanced,
    /// The target was not ahead of the current phase; do not run its hooks
    Skipped,
}

/// Forward-only cursor over [`Phase`]
#[derive(Debug, Default)]
pub struct Ladder {
    current: Option<Phase>,
}

impl Ladder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase, `None` before the first transition
    pub fn current(&self) -> Option<Phase> {
        self.current
    }

    /// True iff `target` is strictly after the current phase
    pub fn can_advance(&self, target: Phase) -> bool {
        self.current.is_none_or(|current| target > current)
    }

    /// Move to `target`. Only call after [`Ladder::can_advance`] returned true.
    pub fn commit(&mut self, target: Phase) {
        debug_assert!(self.can_advance(target), "non-forward commit to {target}");
        self.current = Some(target);
    }

    /// Check and commit in one step
    pub fn advance(&mut self, target: Phase) -> Transition {
        if self.can_advance(target) {
            self.commit(target);
            Transition::Advanced
        } else {
            Transition::Skipped
        }
    }
}
