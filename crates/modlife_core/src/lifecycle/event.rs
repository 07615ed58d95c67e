/// Lifecycle notifications fired for a module.
///
/// A subset of these also name the transition kinds held on a module's
/// transition lock (`Started`, `Stopped`, `Resolved`, `Updated`, `Uninstalled`,
/// `Unresolved`).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ModuleEvent {
    Installed,
    /// Activated with the lazy policy; waiting for a lazy trigger.
    LazyActivation,
    Resolved,
    Started,
    /// About to be activated.
    Starting,
    Stopped,
    /// About to be deactivated.
    Stopping,
    Uninstalled,
    Unresolved,
    Updated,
}

pub const ALL_EVENTS: [ModuleEvent; 10] = [
    ModuleEvent::Installed,
    ModuleEvent::LazyActivation,
    ModuleEvent::Resolved,
    ModuleEvent::Started,
    ModuleEvent::Starting,
    ModuleEvent::Stopped,
    ModuleEvent::Stopping,
    ModuleEvent::Uninstalled,
    ModuleEvent::Unresolved,
    ModuleEvent::Updated,
];

impl ModuleEvent {
    pub const fn id(self) -> u8 {
        match self {
            ModuleEvent::Installed => 0,
            ModuleEvent::LazyActivation => 1,
            ModuleEvent::Resolved => 2,
            ModuleEvent::Started => 3,
            ModuleEvent::Starting => 4,
            ModuleEvent::Stopped => 5,
            ModuleEvent::Stopping => 6,
            ModuleEvent::Uninstalled => 7,
            ModuleEvent::Unresolved => 8,
            ModuleEvent::Updated => 9,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ModuleEvent::Installed => "installed",
            ModuleEvent::LazyActivation => "lazy-activation",
            ModuleEvent::Resolved => "resolved",
            ModuleEvent::Started => "started",
            ModuleEvent::Starting => "starting",
            ModuleEvent::Stopped => "stopped",
            ModuleEvent::Stopping => "stopping",
            ModuleEvent::Uninstalled => "uninstalled",
            ModuleEvent::Unresolved => "unresolved",
            ModuleEvent::Updated => "updated",
        }
    }

    /// Kinds that may only open a transition on an otherwise idle lock.
    pub const fn is_initiating(self) -> bool {
        matches!(
            self,
            ModuleEvent::Started
                | ModuleEvent::Updated
                | ModuleEvent::Uninstalled
                | ModuleEvent::Unresolved
        )
    }
}

/// Small bit set of transition kinds currently open on a lock.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TransitionSet {
    bits: u16,
}

impl TransitionSet {
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    pub const fn of(events: &[ModuleEvent]) -> Self {
        let mut bits = 0u16;
        let mut i = 0;
        while i < events.len() {
            bits |= 1 << events[i].id();
            i += 1;
        }
        Self { bits }
    }

    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    pub const fn contains(self, event: ModuleEvent) -> bool {
        self.bits & (1 << event.id()) != 0
    }

    /// Every member of `self` is also a member of `other`.
    pub const fn is_subset_of(self, other: TransitionSet) -> bool {
        self.bits & !other.bits == 0
    }

    pub fn insert(&mut self, event: ModuleEvent) {
        self.bits |= 1 << event.id();
    }

    pub fn remove(&mut self, event: ModuleEvent) {
        self.bits &= !(1 << event.id());
    }

    pub fn iter(self) -> impl Iterator<Item = ModuleEvent> {
        ALL_EVENTS.into_iter().filter(move |e| self.contains(*e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_semantics() {
        let started = TransitionSet::of(&[ModuleEvent::Started]);
        assert!(TransitionSet::empty().is_subset_of(started));
        assert!(started.is_subset_of(started));
        assert!(!TransitionSet::of(&[ModuleEvent::Uninstalled]).is_subset_of(started));
    }

    #[test]
    fn insert_remove_iter() {
        let mut set = TransitionSet::empty();
        set.insert(ModuleEvent::Updated);
        set.insert(ModuleEvent::Stopped);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![ModuleEvent::Stopped, ModuleEvent::Updated]
        );
        set.remove(ModuleEvent::Updated);
        assert!(set.contains(ModuleEvent::Stopped));
        assert!(!set.contains(ModuleEvent::Updated));
    }
}
