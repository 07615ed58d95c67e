use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::LifecycleConfig;
use crate::error::{CoreError, Domain, ErrorKind, Payload, Result};

use super::state::StateCell;
use super::{
    ModuleEvent, ModuleHooks, ModuleRevision, ModuleRevisions, ModuleState, StartOptions,
    StopOptions, TransitionLock,
};

/// A module installed in a container: identity, revisions, and the state machine that
/// moves it through its lifecycle.
///
/// `start` and `stop` are linearizable per module. They take the module's transition
/// lock, so at most one initiating transition (`Started`, `Updated`, `Uninstalled`,
/// `Unresolved`) runs at a time; nested kinds (`Resolved` inside `Started`, `Stopped`
/// inside the others) are allowed for the holding thread.
pub struct Module {
    id: u64,
    location: String,
    revisions: ModuleRevisions,
    state: StateCell,
    lock: TransitionLock,
    hooks: Arc<dyn ModuleHooks>,
}

/// What a transition procedure leaves for the caller to do after the lock is released.
struct TransitionOutcome {
    event: Option<ModuleEvent>,
    error: Option<CoreError>,
}

impl TransitionOutcome {
    const NONE: Self = Self {
        event: None,
        error: None,
    };

    fn event(event: ModuleEvent) -> Self {
        Self {
            event: Some(event),
            error: None,
        }
    }
}

impl Module {
    /// Create a module in `Installed`.
    pub fn new(
        id: u64,
        location: impl Into<String>,
        revisions: ModuleRevisions,
        hooks: Arc<dyn ModuleHooks>,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            id,
            location: location.into(),
            revisions,
            state: StateCell::new(ModuleState::Installed),
            lock: TransitionLock::new(id, config.lock_timeout),
            hooks,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn revisions(&self) -> &ModuleRevisions {
        &self.revisions
    }

    pub fn current_revision(&self) -> Option<Arc<ModuleRevision>> {
        self.revisions.current()
    }

    /// Current state. Not serialized against running transitions: the result may be
    /// a transient state and may be stale by the time it is used.
    pub fn state(&self) -> ModuleState {
        self.state.load()
    }

    pub fn transition_lock(&self) -> &TransitionLock {
        &self.lock
    }

    /// Take the transition lock for `kind`. The returned guard releases it on drop.
    pub fn lock_transition(&self, kind: ModuleEvent) -> Result<TransitionGuard<'_>> {
        self.lock.acquire(kind)?;
        Ok(TransitionGuard {
            module: self,
            kind,
            held: true,
            _thread_bound: PhantomData,
        })
    }

    /// Hand a revision that is no longer needed to the cleanup hook.
    pub fn cleanup(&self, revision: &ModuleRevision) {
        self.hooks.cleanup(self, revision);
    }

    /// Fire `event` through this module's hooks.
    pub fn fire_event(&self, event: ModuleEvent) {
        self.hooks.fire_event(self, event);
    }

    /// Fails with `InvalidState` once the module is uninstalled.
    pub fn check_valid(&self) -> Result<()> {
        if self.state() == ModuleState::Uninstalled {
            return Err(CoreError::uninstalled(self.id));
        }
        Ok(())
    }

    /// Start this module.
    ///
    /// - `Active` already: no-op.
    /// - `Installed`: resolved through the container first.
    /// - lazy policy without `LAZY_TRIGGER`: parks in `LazyStarting`.
    /// - otherwise runs the start worker and ends in `Active`.
    ///
    /// The resulting event is fired after the lock is released.
    pub fn start(&self, options: StartOptions) -> Result<()> {
        if options.is_lazy_trigger() && !options.is_transient() {
            return Err(CoreError::error()
                .domain(Domain::Lifecycle)
                .kind(ErrorKind::InvalidArgument)
                .msg("cannot use the lazy trigger option without the transient option")
                .build());
        }

        if options.is_lazy_trigger()
            && self.lock.is_held_by_current_thread(ModuleEvent::Started)
        {
            // The calling thread is the one activating this module.
            debug!(module_id = self.id, "lazy trigger during own activation ignored");
            return Ok(());
        }

        let outcome = {
            let mut guard = self.lock_transition(ModuleEvent::Started)?;
            self.check_valid()?;

            if !options.is_transient() {
                self.hooks.persist_start_options(self, options);
            }

            match self.state() {
                ModuleState::Active => return Ok(()),
                ModuleState::Installed => self.resolve_for_start()?,
                _ => {}
            }
            if self.state() == ModuleState::Installed {
                return Err(Self::resolve_error(None));
            }

            self.do_start(&mut guard, options)?
        };

        self.finish(
            outcome,
            &[
                ModuleEvent::Started,
                ModuleEvent::LazyActivation,
                ModuleEvent::Stopped,
            ],
        )
    }

    /// Stop this module.
    ///
    /// A module outside the active set is left alone. Otherwise the module always ends
    /// in `Resolved` with a `Stopped` event, and a stop worker failure is returned only
    /// after that event has been fired.
    pub fn stop(&self, options: StopOptions) -> Result<()> {
        let outcome = {
            let guard = self.lock_transition(ModuleEvent::Stopped)?;
            self.check_valid()?;

            if !options.is_transient() {
                self.hooks.persist_stop_options(self, options);
            }

            if !self.state().is_active() {
                return Ok(());
            }

            self.do_stop(&guard, options)
        };

        self.finish(outcome, &[ModuleEvent::Stopped])
    }

    fn finish(&self, outcome: TransitionOutcome, allowed: &[ModuleEvent]) -> Result<()> {
        if let Some(event) = outcome.event {
            if !allowed.contains(&event) {
                error!(module_id = self.id, event = event.label(), "wrong event type");
                return Err(CoreError::fatal()
                    .domain(Domain::Lifecycle)
                    .kind(ErrorKind::InvalidState)
                    .msgf(format_args!("wrong event type: {}", event.label()))
                    .payload(Payload::Transition {
                        module_id: self.id,
                        event: event.id(),
                    })
                    .build());
            }
            self.hooks.fire_event(self, event);
        }
        match outcome.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn resolve_for_start(&self) -> Result<()> {
        let container = self
            .revisions
            .container()
            .ok_or_else(|| Self::resolve_error(Some("container is no longer available".into())))?;

        container.resolve(&[self], true).map_err(|err| match err.kind {
            ErrorKind::StateChange | ErrorKind::InvalidState => err,
            _ => {
                warn!(module_id = self.id, error = %err, "could not resolve module");
                Self::resolve_error(Some(err.message))
            }
        })
    }

    fn resolve_error(cause: Option<std::borrow::Cow<'static, str>>) -> CoreError {
        let builder = CoreError::warn()
            .domain(Domain::Resolver)
            .kind(ErrorKind::Resolve)
            .msg("could not resolve module");
        match cause {
            Some(value) => builder
                .payload(Payload::Context {
                    key: "cause",
                    value,
                })
                .build(),
            None => builder.build(),
        }
    }

    fn do_start(
        &self,
        guard: &mut TransitionGuard<'_>,
        options: StartOptions,
    ) -> Result<TransitionOutcome> {
        if options.is_lazy_trigger() {
            if self.state() != ModuleState::LazyStarting {
                // Transition through LazyStarting so listeners see the lazy event.
                guard.set_state(ModuleState::LazyStarting);
                // Unlocked while listeners run: a synchronous listener may start this
                // module itself, so the state must be checked again afterwards.
                guard.release_during(|| {
                    self.hooks.fire_event(self, ModuleEvent::LazyActivation)
                })?;
                if self.state() == ModuleState::Active {
                    return Ok(TransitionOutcome::NONE);
                }
            }
        } else if self.hooks.is_lazy_activate(self) {
            if self.state() == ModuleState::LazyStarting {
                // A listener already re-entered start with the lazy policy.
                return Ok(TransitionOutcome::NONE);
            }
            guard.set_state(ModuleState::LazyStarting);
            return Ok(TransitionOutcome::event(ModuleEvent::LazyActivation));
        }

        guard.set_state(ModuleState::Starting);
        self.hooks.fire_event(self, ModuleEvent::Starting);
        debug!(module_id = self.id, "running start worker");

        match self.hooks.start_worker(self, options) {
            Ok(()) => {
                guard.set_state(ModuleState::Active);
                Ok(TransitionOutcome::event(ModuleEvent::Started))
            }
            Err(err) => {
                let err = CoreError::from_worker(err, "error starting module");
                error!(module_id = self.id, error = %err, "start worker failed");
                guard.set_state(ModuleState::Stopping);
                self.hooks.fire_event(self, ModuleEvent::Stopping);
                guard.set_state(ModuleState::Resolved);
                Ok(TransitionOutcome {
                    event: Some(ModuleEvent::Stopped),
                    error: Some(err),
                })
            }
        }
    }

    fn do_stop(&self, guard: &TransitionGuard<'_>, options: StopOptions) -> TransitionOutcome {
        guard.set_state(ModuleState::Stopping);
        self.hooks.fire_event(self, ModuleEvent::Stopping);

        // Resolved on every exit path, unwinding included.
        let _resolved = SetStateOnExit {
            guard,
            state: ModuleState::Resolved,
        };

        let error = self.hooks.stop_worker(self, options).err().map(|err| {
            let err = CoreError::from_worker(err, "error stopping module");
            error!(module_id = self.id, error = %err, "stop worker failed");
            err
        });

        TransitionOutcome {
            event: Some(ModuleEvent::Stopped),
            error,
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[id={}]", self.id)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Proof that the current thread holds one transition kind on a module's lock.
///
/// State and revision writes are only reachable through a guard. Dropping the guard
/// releases the kind.
#[derive(Debug)]
pub struct TransitionGuard<'m> {
    module: &'m Module,
    kind: ModuleEvent,
    held: bool,
    // The lock is owned by a thread; the guard must not move to another.
    _thread_bound: PhantomData<*const ()>,
}

impl<'m> TransitionGuard<'m> {
    pub fn set_state(&self, state: ModuleState) {
        debug!(
            module_id = self.module.id,
            from = self.module.state().label(),
            to = state.label(),
            "state change"
        );
        self.module.state.store(state);
    }

    /// Make `revision` current, returning the one it replaces.
    pub fn push_revision(&self, revision: ModuleRevision) -> Option<Arc<ModuleRevision>> {
        self.module.revisions.push(revision)
    }

    /// Mark the revision history as no longer usable.
    pub fn mark_uninstalled(&self) {
        self.module.revisions.mark_uninstalled();
    }

    /// Release this kind, run `f`, then take the kind again.
    ///
    /// Anything may happen to the module while `f` runs, including transitions by
    /// other threads or by `f` itself; callers must re-read state afterwards. If the
    /// kind cannot be taken again the error is returned and the guard no longer holds
    /// the lock.
    pub fn release_during<R>(&mut self, f: impl FnOnce() -> R) -> Result<R> {
        self.module.lock.release(self.kind)?;
        self.held = false;
        let value = f();
        self.module.lock.acquire(self.kind)?;
        self.held = true;
        Ok(value)
    }

    /// Release explicitly, surfacing a release failure.
    pub fn release(mut self) -> Result<()> {
        self.held = false;
        self.module.lock.release(self.kind)
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        if self.held {
            if let Err(err) = self.module.lock.release(self.kind) {
                error!(
                    module_id = self.module.id,
                    error = %err,
                    "failed to release transition lock"
                );
            }
        }
    }
}

struct SetStateOnExit<'g, 'm> {
    guard: &'g TransitionGuard<'m>,
    state: ModuleState,
}

impl Drop for SetStateOnExit<'_, '_> {
    fn drop(&mut self) {
        self.guard.set_state(self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Weak;

    use crate::lifecycle::ModuleResolver;

    #[derive(Default)]
    struct Events(Mutex<Vec<ModuleEvent>>);

    impl ModuleHooks for Events {
        fn fire_event(&self, _module: &Module, event: ModuleEvent) {
            self.0.lock().push(event);
        }
        fn persist_start_options(&self, _module: &Module, _options: StartOptions) {}
        fn persist_stop_options(&self, _module: &Module, _options: StopOptions) {}
        fn cleanup(&self, _module: &Module, _revision: &ModuleRevision) {}
        fn is_lazy_activate(&self, _module: &Module) -> bool {
            false
        }
    }

    struct NoResolver;

    impl ModuleResolver for NoResolver {
        fn resolve(&self, _modules: &[&Module], _triggers_only: bool) -> Result<()> {
            Ok(())
        }
    }

    fn module(hooks: Arc<Events>) -> Module {
        let container: Weak<dyn ModuleResolver> = Weak::<NoResolver>::new();
        Module::new(
            7,
            "file:/modules/t.jar",
            ModuleRevisions::new(ModuleRevision::new("t", "1.0.0"), container),
            hooks,
            &LifecycleConfig::default(),
        )
    }

    #[test]
    fn finish_rejects_an_event_outside_the_allowed_set() {
        let hooks = Arc::new(Events::default());
        let m = module(hooks.clone());

        let err = m
            .finish(
                TransitionOutcome::event(ModuleEvent::Updated),
                &[ModuleEvent::Started, ModuleEvent::LazyActivation],
            )
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::InvalidState);
        assert_eq!(
            err.payload,
            Payload::Transition {
                module_id: 7,
                event: ModuleEvent::Updated.id(),
            }
        );
        assert!(hooks.0.lock().is_empty());
    }

    #[test]
    fn finish_fires_allowed_event_then_returns_error() {
        let hooks = Arc::new(Events::default());
        let m = module(hooks.clone());

        let outcome = TransitionOutcome {
            event: Some(ModuleEvent::Stopped),
            error: Some(CoreError::state_change(7, 0, "x")),
        };
        let err = m.finish(outcome, &[ModuleEvent::Stopped]).unwrap_err();

        assert_eq!(err.kind, ErrorKind::StateChange);
        assert_eq!(*hooks.0.lock(), vec![ModuleEvent::Stopped]);
    }
}
