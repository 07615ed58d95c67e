use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info};

use modlife_core::error::{CoreError, Domain, ErrorKind, Payload, Result};
use modlife_core::lifecycle::{
    Module, ModuleEvent, ModuleResolver, ModuleRevision, ModuleRevisions, ModuleState,
    StopOptions,
};

use crate::autostart::AutostartSetting;
use crate::config::ContainerConfig;
use crate::error::{duplicate_location, log_core_error};
use crate::events::ModuleEventRecord;
use crate::hooks::{Activator, ContainerHooks, ModuleListener};

/// Registry of installed modules and the resolver they start through.
///
/// Always handled as `Arc<ModuleContainer>`; modules keep only a weak handle back.
pub struct ModuleContainer {
    me: Weak<ModuleContainer>,
    config: ContainerConfig,
    hooks: Arc<ContainerHooks>,
    modules: RwLock<BTreeMap<u64, Arc<Module>>>,
    next_id: AtomicU64,
}

impl ModuleContainer {
    pub fn new(config: ContainerConfig) -> Result<Arc<Self>> {
        config.validate()?;
        info!(
            lock_timeout_ms = config.lifecycle.lock_timeout.as_millis() as u64,
            event_capacity = config.event_capacity,
            resolve_on_install = config.resolve_on_install,
            "module container created"
        );
        Ok(Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config,
            hooks: Arc::new(ContainerHooks::new(config.event_capacity)),
            modules: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }))
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Install a module from `location` with its first revision.
    ///
    /// Locations are unique among installed modules.
    pub fn install(
        &self,
        location: impl Into<String>,
        revision: ModuleRevision,
    ) -> Result<Arc<Module>> {
        let location = location.into();
        let module = {
            let mut modules = self.modules.write();
            if modules.values().any(|m| m.location() == location) {
                return Err(duplicate_location(&location));
            }

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let resolver: Weak<dyn ModuleResolver> = self.me.clone();
            let module = Arc::new(Module::new(
                id,
                location,
                ModuleRevisions::new(revision, resolver),
                self.hooks.clone(),
                &self.config.lifecycle,
            ));
            modules.insert(id, module.clone());
            module
        };

        info!(module_id = module.id(), location = module.location(), "installed");
        module.fire_event(ModuleEvent::Installed);

        if self.config.resolve_on_install {
            if let Err(err) = self.resolve(&[&*module], true) {
                log_core_error(&err);
            }
        }
        Ok(module)
    }

    pub fn module(&self, id: u64) -> Option<Arc<Module>> {
        self.modules.read().get(&id).cloned()
    }

    pub fn module_by_location(&self, location: &str) -> Option<Arc<Module>> {
        self.modules
            .read()
            .values()
            .find(|m| m.location() == location)
            .cloned()
    }

    /// Installed modules in id order.
    pub fn modules(&self) -> Vec<Arc<Module>> {
        self.modules.read().values().cloned().collect()
    }

    /// Try to resolve every module still in `Installed`. Modules that cannot be
    /// resolved are left as they are.
    pub fn resolve_all(&self) -> Result<()> {
        self.resolve(&[], false)
    }

    /// Stop (if active) and remove `module`. No further transitions are possible.
    pub fn uninstall(&self, module: &Module) -> Result<()> {
        let guard = module.lock_transition(ModuleEvent::Uninstalled)?;
        module.check_valid()?;

        self.stop_for(module, "uninstall");

        let current = module.current_revision();
        guard.set_state(ModuleState::Uninstalled);
        guard.mark_uninstalled();
        if let Some(revision) = current {
            module.cleanup(&revision);
        }

        self.modules.write().remove(&module.id());
        self.hooks.autostart().forget(module.id());
        self.hooks.remove_activator(module.id());

        guard.release()?;
        info!(module_id = module.id(), "uninstalled");
        module.fire_event(ModuleEvent::Uninstalled);
        Ok(())
    }

    /// Stop (if active) and return `module` to `Installed`.
    pub fn unresolve(&self, module: &Module) -> Result<()> {
        let guard = module.lock_transition(ModuleEvent::Unresolved)?;
        module.check_valid()?;

        self.stop_for(module, "unresolve");

        if module.state().is_resolved() {
            guard.set_state(ModuleState::Installed);
        }

        guard.release()?;
        module.fire_event(ModuleEvent::Unresolved);
        Ok(())
    }

    /// Replace the current revision of `module`. The module is stopped first if it was
    /// active and is left in `Installed`; it is not restarted.
    pub fn update(&self, module: &Module, revision: ModuleRevision) -> Result<()> {
        let guard = module.lock_transition(ModuleEvent::Updated)?;
        module.check_valid()?;

        self.stop_for(module, "update");

        debug!(
            module_id = module.id(),
            version = revision.version(),
            "installing new revision"
        );
        if let Some(previous) = guard.push_revision(revision) {
            module.cleanup(&previous);
        }
        guard.set_state(ModuleState::Installed);

        guard.release()?;
        module.fire_event(ModuleEvent::Updated);
        Ok(())
    }

    /// Restart every module whose persisted setting is not `Stopped`, in id order.
    ///
    /// Returns the failures; the remaining modules are still attempted.
    pub fn start_autostart_modules(&self) -> Vec<(u64, CoreError)> {
        let mut failures = Vec::new();
        for (id, setting) in self.hooks.autostart().started_modules() {
            let (Some(module), Some(options)) = (self.module(id), setting.restart_options())
            else {
                continue;
            };
            if let Err(err) = module.start(options) {
                log_core_error(&err);
                failures.push((id, err));
            }
        }
        failures
    }

    pub fn autostart_setting(&self, module_id: u64) -> Option<AutostartSetting> {
        self.hooks.autostart().get(module_id)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ModuleEventRecord> {
        self.hooks.subscribe()
    }

    pub fn add_listener(&self, listener: Arc<dyn ModuleListener>) {
        self.hooks.add_listener(listener);
    }

    pub fn set_activator(&self, module_id: u64, activator: Arc<dyn Activator>) {
        self.hooks.set_activator(module_id, activator);
    }

    /// Revisions released through cleanup, oldest first.
    ///
    /// The record keeps every update and uninstall until
    /// [`drain_released_revisions`](Self::drain_released_revisions) empties it.
    pub fn released_revisions(&self) -> Vec<(u64, ModuleRevision)> {
        self.hooks.released_revisions()
    }

    pub fn drain_released_revisions(&self) -> Vec<(u64, ModuleRevision)> {
        self.hooks.drain_released_revisions()
    }

    // Nested stop under an initiating transition; a failure is logged, not returned.
    fn stop_for(&self, module: &Module, during: &'static str) {
        if !module.state().is_active() {
            return;
        }
        if let Err(err) = module.stop(StopOptions::TRANSIENT) {
            debug!(module_id = module.id(), during, "stop failed");
            log_core_error(&err);
        }
    }

    fn resolve_one(&self, module: &Module, available: &HashSet<String>) -> Result<()> {
        let revision = module
            .current_revision()
            .ok_or_else(|| CoreError::uninstalled(module.id()))?;

        let missing: Vec<&str> = revision
            .required_capabilities()
            .iter()
            .filter(|cap| {
                !available.contains(cap.as_str())
                    && !revision.provided_capabilities().contains(*cap)
            })
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            let missing = missing.join(", ");
            return Err(CoreError::warn()
                .domain(Domain::Resolver)
                .kind(ErrorKind::Resolve)
                .msgf(format_args!("module {} is missing {missing}", module.id()))
                .payload(Payload::Context {
                    key: "missing",
                    value: missing.into(),
                })
                .build());
        }

        let guard = module.lock_transition(ModuleEvent::Resolved)?;
        if module.state() != ModuleState::Installed {
            return Ok(());
        }
        guard.set_state(ModuleState::Resolved);
        guard.release()?;
        module.fire_event(ModuleEvent::Resolved);
        Ok(())
    }
}

impl ModuleResolver for ModuleContainer {
    fn resolve(&self, modules: &[&Module], triggers_only: bool) -> Result<()> {
        let registered = self.modules();
        let available: HashSet<String> = registered
            .iter()
            .filter_map(|m| m.current_revision())
            .flat_map(|r| r.provided_capabilities().to_vec())
            .collect();

        let mut candidates: Vec<&Module> = modules.to_vec();
        if !triggers_only {
            for module in &registered {
                if module.state() == ModuleState::Installed
                    && !candidates.iter().any(|c| c.id() == module.id())
                {
                    candidates.push(&**module);
                }
            }
        }

        let mut failure = None;
        for module in candidates {
            let is_trigger = modules.iter().any(|t| t.id() == module.id());
            match self.resolve_one(module, &available) {
                Ok(()) => {}
                Err(err) if is_trigger => {
                    failure.get_or_insert(err);
                }
                Err(err) => {
                    debug!(module_id = module.id(), error = %err, "left unresolved");
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ModuleContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContainer")
            .field("config", &self.config)
            .field("modules", &self.modules.read().len())
            .finish_non_exhaustive()
    }
}
