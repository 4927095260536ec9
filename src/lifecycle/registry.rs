//! Hook Registry
//!
//! Per-phase ordered hook lists.

use super::{IntoHooks, Order, Phase, SharedHook};
use dashmap::DashMap;

/// Maps each [`Phase`] to the hooks that run when it is entered
///
/// No de-duplication: a hook registered twice runs twice. Registering after a
/// phase has run is accepted but has no effect on that run.
#[derive(Default)]
pub struct HookRegistry {
    hooks: DashMap<Phase, Vec<SharedHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the phase's hooks, empty if none were registered
    pub fn get(&self, phase: Phase) -> Vec<SharedHook> {
        self.hooks
            .get(&phase)
            .map(|hooks| hooks.clone())
            .unwrap_or_default()
    }

    /// Add hooks after the ones already registered
    pub fn append(&self, phase: Phase, hooks: impl IntoHooks) {
        self.hooks
            .entry(phase)
            .or_default()
            .extend(hooks.into_hooks());
    }

    /// Add hooks before the ones already registered, keeping their own order
    pub fn prepend(&self, phase: Phase, hooks: impl IntoHooks) {
        let mut entry = self.hooks.entry(phase).or_default();
        entry.splice(0..0, hooks.into_hooks());
    }

    /// Register with an explicit [`Order`]
    pub fn register(&self, phase: Phase, hooks: impl IntoHooks, order: Order) {
        match order {
            Order::Append => self.append(phase, hooks),
            Order::Prepend => self.prepend(phase, hooks),
        }
    }

    /// Number of hooks registered for `phase`
    pub fn len(&self, phase: Phase) -> usize {
        self.hooks.get(&phase).map_or(0, |hooks| hooks.len())
    }

    pub fn is_empty(&self, phase: Phase) -> bool {
        self.len(phase) == 0
    }
}
