//! Module event records (delivery-agnostic).
//!
//! Published on the container's broadcast channel after synchronous listeners ran.

use modlife_core::lifecycle::{ModuleEvent, ModuleState};

/// One fired lifecycle event, with the module state observed when it was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleEventRecord {
    pub module_id: u64,
    pub event: ModuleEvent,
    pub state: ModuleState,
}
