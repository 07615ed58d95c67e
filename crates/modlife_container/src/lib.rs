//! modlife_container
//!
//! Module container built on top of `modlife_core`.
//! Provides the registry, capability resolver, event fan-out and autostart
//! persistence, while keeping lifecycle semantics in `modlife_core`.

// Public modules
pub mod autostart;
pub mod config;
pub mod container;
pub mod error;
pub mod events;
pub mod hooks;

pub use autostart::{AutostartSetting, AutostartStore};
pub use config::ContainerConfig;
pub use container::ModuleContainer;
pub use events::ModuleEventRecord;
pub use hooks::{Activator, ContainerHooks, ModuleListener};

// Re-export core types that container users will commonly need
pub use modlife_core::error::{CoreError, Result};
pub use modlife_core::lifecycle::{
    Module, ModuleEvent, ModuleRevision, ModuleState, StartOptions, StopOptions,
};
