#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use modlife_core::config::LifecycleConfig;
use modlife_core::error::{CoreError, Domain, ErrorKind, Result};
use modlife_core::lifecycle::{
    Module, ModuleEvent, ModuleHooks, ModuleResolver, ModuleRevision, ModuleRevisions,
    ModuleState, StartOptions, StopOptions,
};

pub type Listener = Box<dyn Fn(&Module, ModuleEvent) + Send + Sync>;

/// Hooks that record everything and can be told to fail.
#[derive(Default)]
pub struct RecordingHooks {
    pub events: Mutex<Vec<ModuleEvent>>,
    pub persisted_start: Mutex<Vec<StartOptions>>,
    pub persisted_stop: Mutex<Vec<StopOptions>>,
    pub lazy: AtomicBool,
    pub fail_start: AtomicBool,
    pub fail_stop: AtomicBool,
    pub panic_stop: AtomicBool,
    pub start_calls: AtomicUsize,
    pub start_delay: Mutex<Option<Duration>>,
    pub listener: Mutex<Option<Arc<Listener>>>,
}

impl RecordingHooks {
    pub fn events(&self) -> Vec<ModuleEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: ModuleEvent) -> usize {
        self.events().iter().filter(|e| **e == event).count()
    }

    pub fn set_listener(&self, listener: Listener) {
        *self.listener.lock().unwrap() = Some(Arc::new(listener));
    }
}

impl ModuleHooks for RecordingHooks {
    fn fire_event(&self, module: &Module, event: ModuleEvent) {
        self.events.lock().unwrap().push(event);
        let listener = self.listener.lock().unwrap().clone();
        if let Some(listener) = listener {
            listener(module, event);
        }
    }

    fn persist_start_options(&self, _module: &Module, options: StartOptions) {
        self.persisted_start.lock().unwrap().push(options);
    }

    fn persist_stop_options(&self, _module: &Module, options: StopOptions) {
        self.persisted_stop.lock().unwrap().push(options);
    }

    fn cleanup(&self, _module: &Module, _revision: &ModuleRevision) {}

    fn is_lazy_activate(&self, _module: &Module) -> bool {
        self.lazy.load(Ordering::SeqCst)
    }

    fn start_worker(&self, _module: &Module, _options: StartOptions) -> anyhow::Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = *self.start_delay.lock().unwrap() {
            std::thread::sleep(delay);
        }
        if self.fail_start.load(Ordering::SeqCst) {
            anyhow::bail!("activator refused to start");
        }
        Ok(())
    }

    fn stop_worker(&self, _module: &Module, _options: StopOptions) -> anyhow::Result<()> {
        if self.panic_stop.load(Ordering::SeqCst) {
            panic!("activator panicked while stopping");
        }
        if self.fail_stop.load(Ordering::SeqCst) {
            anyhow::bail!("activator refused to stop");
        }
        Ok(())
    }
}

/// Resolver that resolves every listed module unless told to refuse.
#[derive(Default)]
pub struct StubResolver {
    pub refuse: AtomicBool,
    pub silent: AtomicBool,
    pub calls: AtomicUsize,
}

impl ModuleResolver for StubResolver {
    fn resolve(&self, modules: &[&Module], _triggers_only: bool) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(CoreError::warn()
                .domain(Domain::Resolver)
                .kind(ErrorKind::Other)
                .msg("missing requirement: osgi.ee")
                .build());
        }
        if self.silent.load(Ordering::SeqCst) {
            return Ok(());
        }
        for module in modules {
            let guard = module.lock_transition(ModuleEvent::Resolved)?;
            if module.state() == ModuleState::Installed {
                guard.set_state(ModuleState::Resolved);
            }
            drop(guard);
            module.fire_event(ModuleEvent::Resolved);
        }
        Ok(())
    }
}

pub struct Fixture {
    pub module: Arc<Module>,
    pub hooks: Arc<RecordingHooks>,
    pub resolver: Arc<StubResolver>,
}

pub fn fixture() -> Fixture {
    fixture_with_timeout(Duration::from_millis(500))
}

pub fn fixture_with_timeout(timeout: Duration) -> Fixture {
    let hooks = Arc::new(RecordingHooks::default());
    let resolver = Arc::new(StubResolver::default());
    let container: Arc<dyn ModuleResolver> = resolver.clone();
    let weak: Weak<dyn ModuleResolver> = Arc::downgrade(&container);
    let revisions = ModuleRevisions::new(ModuleRevision::new("org.example.alpha", "1.0.0"), weak);
    let module = Arc::new(Module::new(
        1,
        "file:/modules/alpha.jar",
        revisions,
        hooks.clone(),
        &LifecycleConfig::default().with_lock_timeout(timeout),
    ));
    Fixture {
        module,
        hooks,
        resolver,
    }
}

/// Drive a fixture module into `Uninstalled` the way a container would.
pub fn uninstall(module: &Module) {
    let guard = module.lock_transition(ModuleEvent::Uninstalled).unwrap();
    guard.set_state(ModuleState::Uninstalled);
    guard.mark_uninstalled();
}
