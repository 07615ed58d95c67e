use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle states of a module.
///
/// Stable states:
/// - Installed, Resolved, Active, Uninstalled
///
/// Transient states (observable by advisory readers while a transition runs):
/// - LazyStarting, Starting, Stopping
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ModuleState {
    Installed,
    Resolved,
    LazyStarting,
    Starting,
    Active,
    Stopping,
    Uninstalled,
}

/// States in which a module counts as active for listeners and queries.
pub const ACTIVE_SET: [ModuleState; 4] = [
    ModuleState::Starting,
    ModuleState::LazyStarting,
    ModuleState::Active,
    ModuleState::Stopping,
];

/// States in which a module has at least one resolved revision.
pub const RESOLVED_SET: [ModuleState; 5] = [
    ModuleState::Resolved,
    ModuleState::Starting,
    ModuleState::LazyStarting,
    ModuleState::Active,
    ModuleState::Stopping,
];

/// Canonical list of all module states.
pub const ALL_STATES: [ModuleState; 7] = [
    ModuleState::Installed,
    ModuleState::Resolved,
    ModuleState::LazyStarting,
    ModuleState::Starting,
    ModuleState::Active,
    ModuleState::Stopping,
    ModuleState::Uninstalled,
];

impl ModuleState {
    /// Compact id used for atomic storage and error payloads.
    pub const fn id(self) -> u8 {
        match self {
            ModuleState::Installed => 0,
            ModuleState::Resolved => 1,
            ModuleState::LazyStarting => 2,
            ModuleState::Starting => 3,
            ModuleState::Active => 4,
            ModuleState::Stopping => 5,
            ModuleState::Uninstalled => 6,
        }
    }

    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(ModuleState::Installed),
            1 => Some(ModuleState::Resolved),
            2 => Some(ModuleState::LazyStarting),
            3 => Some(ModuleState::Starting),
            4 => Some(ModuleState::Active),
            5 => Some(ModuleState::Stopping),
            6 => Some(ModuleState::Uninstalled),
            _ => None,
        }
    }

    /// Member of [`ACTIVE_SET`].
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            ModuleState::Starting
                | ModuleState::LazyStarting
                | ModuleState::Active
                | ModuleState::Stopping
        )
    }

    /// Member of [`RESOLVED_SET`].
    pub const fn is_resolved(self) -> bool {
        matches!(self, ModuleState::Resolved) || self.is_active()
    }

    pub const fn label(self) -> &'static str {
        match self {
            ModuleState::Installed => "INSTALLED",
            ModuleState::Resolved => "RESOLVED",
            ModuleState::LazyStarting => "LAZY_STARTING",
            ModuleState::Starting => "STARTING",
            ModuleState::Active => "ACTIVE",
            ModuleState::Stopping => "STOPPING",
            ModuleState::Uninstalled => "UNINSTALLED",
        }
    }
}

/// Atomic holder for a module's current state.
///
/// Loads are unsynchronized with in-flight transitions: a reader may see any state in
/// the sequence, including `Starting`, `Stopping` and `LazyStarting`. Stores are only
/// issued by the thread holding the module's transition lock.
#[derive(Debug)]
pub(crate) struct StateCell {
    state: AtomicU8,
}

impl StateCell {
    pub(crate) const fn new(initial: ModuleState) -> Self {
        Self {
            state: AtomicU8::new(initial.id()),
        }
    }

    pub(crate) fn load(&self) -> ModuleState {
        // Only ids produced by `ModuleState::id` are ever stored.
        ModuleState::from_id(self.state.load(Ordering::Acquire)).unwrap_or(ModuleState::Installed)
    }

    pub(crate) fn store(&self, state: ModuleState) {
        self.state.store(state.id(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_sets_match_predicates() {
        for state in ALL_STATES {
            assert_eq!(state.is_active(), ACTIVE_SET.contains(&state), "{state:?}");
            assert_eq!(state.is_resolved(), RESOLVED_SET.contains(&state), "{state:?}");
        }
        assert!(!ModuleState::Installed.is_resolved());
        assert!(!ModuleState::Uninstalled.is_resolved());
    }

    #[test]
    fn ids_round_trip_through_cell() {
        let cell = StateCell::new(ModuleState::Installed);
        for state in ALL_STATES {
            cell.store(state);
            assert_eq!(cell.load(), state);
        }
        assert_eq!(ModuleState::from_id(42), None);
    }
}
