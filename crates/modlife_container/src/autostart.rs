use std::collections::HashMap;

use parking_lot::Mutex;

use modlife_core::lifecycle::{StartOptions, StopOptions};

/// Persistent start intent of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutostartSetting {
    Stopped,
    Started,
    /// Started, honoring the declared activation policy.
    ActivationPolicy,
}

impl AutostartSetting {
    pub fn from_start_options(options: StartOptions) -> Self {
        if options.contains(StartOptions::ACTIVATION_POLICY) {
            AutostartSetting::ActivationPolicy
        } else {
            AutostartSetting::Started
        }
    }

    pub fn from_stop_options(_options: StopOptions) -> Self {
        AutostartSetting::Stopped
    }

    /// Options for restarting a module with this setting, or `None` if it stays put.
    pub fn restart_options(self) -> Option<StartOptions> {
        match self {
            AutostartSetting::Stopped => None,
            AutostartSetting::Started => Some(StartOptions::TRANSIENT),
            AutostartSetting::ActivationPolicy => {
                Some(StartOptions::TRANSIENT | StartOptions::ACTIVATION_POLICY)
            }
        }
    }
}

/// In-memory record of autostart settings keyed by module id.
#[derive(Debug, Default)]
pub struct AutostartStore {
    settings: Mutex<HashMap<u64, AutostartSetting>>,
}

impl AutostartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, module_id: u64, setting: AutostartSetting) {
        self.settings.lock().insert(module_id, setting);
    }

    pub fn get(&self, module_id: u64) -> Option<AutostartSetting> {
        self.settings.lock().get(&module_id).copied()
    }

    pub fn forget(&self, module_id: u64) {
        self.settings.lock().remove(&module_id);
    }

    /// Ids with a non-stopped setting, ascending.
    pub fn started_modules(&self) -> Vec<(u64, AutostartSetting)> {
        let mut started: Vec<_> = self
            .settings
            .lock()
            .iter()
            .filter(|(_, s)| **s != AutostartSetting::Stopped)
            .map(|(id, s)| (*id, *s))
            .collect();
        started.sort_by_key(|(id, _)| *id);
        started
    }
}
