//! modlife_core::lifecycle
//!
//! Module lifecycle semantics with no container or delivery code.
//!
//! Key ideas:
//! - Seven states; `ACTIVE_SET` and `RESOLVED_SET` derived from them
//! - One transition lock per module, typed by the transition kinds it has open
//! - `start`/`stop` fire their final event after releasing the lock
//! - Collaborators (events, persistence, workers, resolution) are traits

mod event;
mod hooks;
mod lock;
mod module;
mod options;
mod revision;
mod state;

pub use event::{ModuleEvent, TransitionSet, ALL_EVENTS};
pub use hooks::{ModuleHooks, ModuleResolver};
pub use lock::{may_open, TransitionLock};
pub use module::{Module, TransitionGuard};
pub use options::{StartOptions, StopOptions};
pub use revision::{ModuleRevision, ModuleRevisions};
pub use state::{ModuleState, ACTIVE_SET, ALL_STATES, RESOLVED_SET};
