//! modlife_core: container-agnostic module lifecycle controller.
//!
//! Design goals:
//! - Per-module transition locking; no global lock.
//! - Explicit types; no macro wizardry.
//! - Small, stable public API surface.

pub mod error;

/// Lock timeout and related settings.
pub mod config;

/// Module state machine, transition lock and collaborator traits.
pub mod lifecycle;
