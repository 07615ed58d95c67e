use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

use modlife_core::lifecycle::{
    Module, ModuleEvent, ModuleHooks, ModuleRevision, StartOptions, StopOptions,
};

use crate::autostart::{AutostartSetting, AutostartStore};
use crate::events::ModuleEventRecord;

/// Synchronous listener, called on the thread that fires the event.
///
/// Listeners may call back into the module (e.g. start it from a lazy-activation
/// event).
pub trait ModuleListener: Send + Sync {
    fn module_event(&self, module: &Module, event: ModuleEvent);
}

impl<F> ModuleListener for F
where
    F: Fn(&Module, ModuleEvent) + Send + Sync,
{
    fn module_event(&self, module: &Module, event: ModuleEvent) {
        self(module, event)
    }
}

/// A module's entry points.
pub trait Activator: Send + Sync {
    fn start(&self, module: &Module) -> anyhow::Result<()>;
    fn stop(&self, module: &Module) -> anyhow::Result<()>;
}

/// The container's implementation of the core hooks, shared by all its modules.
///
/// Holds no reference to the modules themselves.
pub struct ContainerHooks {
    listeners: RwLock<Vec<Arc<dyn ModuleListener>>>,
    events: broadcast::Sender<ModuleEventRecord>,
    autostart: AutostartStore,
    activators: RwLock<HashMap<u64, Arc<dyn Activator>>>,
    // Audit log of cleaned-up revisions; grows until drained.
    released: Mutex<Vec<(u64, ModuleRevision)>>,
}

impl ContainerHooks {
    pub fn new(event_capacity: usize) -> Self {
        let (events, _rx) = broadcast::channel(event_capacity);
        Self {
            listeners: RwLock::new(Vec::new()),
            events,
            autostart: AutostartStore::new(),
            activators: RwLock::new(HashMap::new()),
            released: Mutex::new(Vec::new()),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn ModuleListener>) {
        self.listeners.write().push(listener);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModuleEventRecord> {
        self.events.subscribe()
    }

    pub fn set_activator(&self, module_id: u64, activator: Arc<dyn Activator>) {
        self.activators.write().insert(module_id, activator);
    }

    pub fn remove_activator(&self, module_id: u64) {
        self.activators.write().remove(&module_id);
    }

    pub fn autostart(&self) -> &AutostartStore {
        &self.autostart
    }

    /// Revisions handed to cleanup and not yet drained, oldest first.
    pub fn released_revisions(&self) -> Vec<(u64, ModuleRevision)> {
        self.released.lock().clone()
    }

    /// Remove and return the released revisions.
    pub fn drain_released_revisions(&self) -> Vec<(u64, ModuleRevision)> {
        std::mem::take(&mut *self.released.lock())
    }

    fn activator(&self, module_id: u64) -> Option<Arc<dyn Activator>> {
        self.activators.read().get(&module_id).cloned()
    }
}

impl ModuleHooks for ContainerHooks {
    fn fire_event(&self, module: &Module, event: ModuleEvent) {
        // Snapshot so listeners can register more listeners.
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener.module_event(module, event);
        }

        // No receivers is fine: the stream is optional.
        let _ = self.events.send(ModuleEventRecord {
            module_id: module.id(),
            event,
            state: module.state(),
        });
    }

    fn persist_start_options(&self, module: &Module, options: StartOptions) {
        self.autostart
            .set(module.id(), AutostartSetting::from_start_options(options));
    }

    fn persist_stop_options(&self, module: &Module, options: StopOptions) {
        self.autostart
            .set(module.id(), AutostartSetting::from_stop_options(options));
    }

    fn cleanup(&self, module: &Module, revision: &ModuleRevision) {
        debug!(
            module_id = module.id(),
            version = revision.version(),
            "releasing revision"
        );
        self.released.lock().push((module.id(), revision.clone()));
    }

    fn is_lazy_activate(&self, module: &Module) -> bool {
        let declares_lazy = module
            .current_revision()
            .is_some_and(|r| r.declares_lazy_activation());
        declares_lazy && self.autostart.get(module.id()) == Some(AutostartSetting::ActivationPolicy)
    }

    fn start_worker(&self, module: &Module, _options: StartOptions) -> anyhow::Result<()> {
        match self.activator(module.id()) {
            Some(activator) => activator.start(module),
            None => Ok(()),
        }
    }

    fn stop_worker(&self, module: &Module, _options: StopOptions) -> anyhow::Result<()> {
        match self.activator(module.id()) {
            Some(activator) => activator.stop(module),
            None => Ok(()),
        }
    }
}
