use crate::error::Result;

use super::{Module, ModuleEvent, ModuleRevision, StartOptions, StopOptions};

/// Container-level dependency resolution, invoked (never implemented) by the core.
///
/// Implementations move each module they resolve from `Installed` to `Resolved`
/// while holding that module's `Resolved` transition, and fire the `Resolved` event.
/// The call may arrive on a thread that already holds the module's `Started`
/// transition; the nesting table allows that.
pub trait ModuleResolver: Send + Sync {
    fn resolve(&self, modules: &[&Module], triggers_only: bool) -> Result<()>;
}

/// Injection points a concrete module type supplies to the controller.
///
/// One implementation may serve every module of a container; each hook is told which
/// module it runs for. Hooks run on the thread driving the transition; `fire_event`
/// and the workers may call back into the same module.
pub trait ModuleHooks: Send + Sync {
    /// Publish `event` for `module`. Delivery fan-out is up to the implementation.
    fn fire_event(&self, module: &Module, event: ModuleEvent);

    /// Record autostart intent for a non-transient start.
    fn persist_start_options(&self, module: &Module, options: StartOptions);

    /// Record autostart intent for a non-transient stop.
    fn persist_stop_options(&self, module: &Module, options: StopOptions);

    /// Release resources of a revision that is no longer needed.
    fn cleanup(&self, module: &Module, revision: &ModuleRevision);

    /// Whether starting without a lazy trigger should stop at `LazyStarting`.
    fn is_lazy_activate(&self, module: &Module) -> bool;

    /// Activation work, e.g. running the module's entry point.
    fn start_worker(&self, _module: &Module, _options: StartOptions) -> anyhow::Result<()> {
        Ok(())
    }

    /// Deactivation work.
    fn stop_worker(&self, _module: &Module, _options: StopOptions) -> anyhow::Result<()> {
        Ok(())
    }
}
