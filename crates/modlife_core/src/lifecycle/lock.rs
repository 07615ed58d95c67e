use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::error::{CoreError, Domain, ErrorKind, Payload, Result};

use super::{ModuleEvent, TransitionSet};

const VALID_RESOLVED_NESTING: TransitionSet = TransitionSet::of(&[ModuleEvent::Started]);
const VALID_STOPPED_NESTING: TransitionSet = TransitionSet::of(&[
    ModuleEvent::Updated,
    ModuleEvent::Unresolved,
    ModuleEvent::Uninstalled,
]);

/// Whether `kind` may be opened while `open` is already open on the same lock.
///
/// - `Started`, `Updated`, `Uninstalled`, `Unresolved` only initiate: nothing else open.
/// - `Resolved` nests inside `Started`.
/// - `Stopped` nests inside `Updated`, `Unresolved` or `Uninstalled`.
/// - nothing else is a lockable transition kind.
pub fn may_open(kind: ModuleEvent, open: TransitionSet) -> bool {
    match kind {
        _ if kind.is_initiating() => open.is_empty(),
        ModuleEvent::Resolved => open.is_subset_of(VALID_RESOLVED_NESTING),
        ModuleEvent::Stopped => open.is_subset_of(VALID_STOPPED_NESTING),
        _ => false,
    }
}

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
    open: TransitionSet,
}

impl LockState {
    fn owned_by_other(&self, me: ThreadId) -> bool {
        self.owner.is_some_and(|owner| owner != me)
    }
}

/// Per-module reentrant lock that also tracks which transition kinds are open.
///
/// The holding thread may acquire again (each successful `acquire` is one level),
/// but only for kinds the nesting table allows given what is already open.
/// Other threads wait up to the timeout.
#[derive(Debug)]
pub struct TransitionLock {
    module_id: u64,
    timeout: Duration,
    state: Mutex<LockState>,
    released: Condvar,
}

impl TransitionLock {
    pub fn new(module_id: u64, timeout: Duration) -> Self {
        Self {
            module_id,
            timeout,
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
        }
    }

    /// Acquire the lock for `kind`, waiting at most the configured timeout.
    pub fn acquire(&self, kind: ModuleEvent) -> Result<()> {
        self.acquire_within(kind, self.timeout)
    }

    /// Boolean form of [`acquire_within`](Self::acquire_within). `Duration::MAX`
    /// waits for as long as it takes.
    pub fn try_acquire(&self, kind: ModuleEvent, timeout: Duration) -> bool {
        self.acquire_within(kind, timeout).is_ok()
    }

    /// Acquire the lock for `kind`, waiting at most `timeout`.
    ///
    /// Fails with `StateChange` on timeout or when `kind` may not nest inside the
    /// kinds this thread already holds. A failed call leaves the lock as it was.
    pub fn acquire_within(&self, kind: ModuleEvent, timeout: Duration) -> Result<()> {
        let me = thread::current().id();
        // No deadline when the timeout does not fit in an Instant.
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();

        while state.owned_by_other(me) {
            let Some(deadline) = deadline else {
                self.released.wait(&mut state);
                continue;
            };
            if self.released.wait_until(&mut state, deadline).timed_out()
                && state.owned_by_other(me)
            {
                warn!(
                    module_id = self.module_id,
                    transition = kind.label(),
                    timeout_ms = timeout.as_millis() as u64,
                    "timed out waiting for the state change lock"
                );
                return Err(CoreError::state_change(
                    self.module_id,
                    kind.id(),
                    "unable to acquire the state change lock for the module",
                ));
            }
        }

        state.owner = Some(me);
        state.depth += 1;

        if !may_open(kind, state.open) {
            let open: Vec<_> = state.open.iter().map(ModuleEvent::label).collect();
            self.exit_level(&mut state);
            warn!(
                module_id = self.module_id,
                transition = kind.label(),
                ?open,
                "transition may not nest inside open transitions"
            );
            return Err(CoreError::state_change(
                self.module_id,
                kind.id(),
                "invalid state change transition for the module",
            ));
        }

        state.open.insert(kind);
        debug!(
            module_id = self.module_id,
            transition = kind.label(),
            depth = state.depth,
            "state change lock acquired"
        );
        Ok(())
    }

    /// Release one level held for `kind` by the calling thread.
    ///
    /// Releasing a kind this thread does not hold is a caller bug and fails with
    /// `InvalidState`.
    pub fn release(&self, kind: ModuleEvent) -> Result<()> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if state.owner != Some(me) || state.depth == 0 || !state.open.contains(kind) {
            return Err(CoreError::fatal()
                .domain(Domain::Lock)
                .kind(ErrorKind::InvalidState)
                .msgf(format_args!(
                    "current thread does not hold the state change lock for: {}",
                    kind.label()
                ))
                .payload(Payload::Transition {
                    module_id: self.module_id,
                    event: kind.id(),
                })
                .build());
        }

        state.open.remove(kind);
        self.exit_level(&mut state);
        debug!(module_id = self.module_id, transition = kind.label(), "state change lock released");
        Ok(())
    }

    /// True if the calling thread currently holds `kind` open.
    pub fn is_held_by_current_thread(&self, kind: ModuleEvent) -> bool {
        let state = self.state.lock();
        state.owner == Some(thread::current().id()) && state.open.contains(kind)
    }

    /// Snapshot of the open kinds (advisory; may change immediately).
    pub fn open_transitions(&self) -> TransitionSet {
        self.state.lock().open
    }

    fn exit_level(&self, state: &mut LockState) {
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_all();
        }
    }
}
