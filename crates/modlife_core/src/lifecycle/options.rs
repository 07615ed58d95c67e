use std::ops::BitOr;

/// Flags accepted by `Module::start`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct StartOptions {
    bits: u8,
}

impl StartOptions {
    /// Do not modify the persistent autostart/activation-policy setting.
    pub const TRANSIENT: Self = Self { bits: 1 };
    /// Activate according to the module's declared activation policy.
    pub const ACTIVATION_POLICY: Self = Self { bits: 1 << 1 };
    /// Resume a pending lazy start. Only valid together with `TRANSIENT`.
    pub const LAZY_TRIGGER: Self = Self { bits: 1 << 2 };

    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    pub const fn contains(self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }

    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    pub const fn is_transient(self) -> bool {
        self.contains(Self::TRANSIENT)
    }

    pub const fn is_lazy_trigger(self) -> bool {
        self.contains(Self::LAZY_TRIGGER)
    }
}

impl BitOr for StartOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Flags accepted by `Module::stop`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct StopOptions {
    bits: u8,
}

impl StopOptions {
    /// Do not modify the persistent autostart setting.
    pub const TRANSIENT: Self = Self { bits: 1 };

    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    pub const fn contains(self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }

    pub const fn is_transient(self) -> bool {
        self.contains(Self::TRANSIENT)
    }
}

impl BitOr for StopOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            bits: self.bits | rhs.bits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_flags() {
        let opts = StartOptions::TRANSIENT | StartOptions::LAZY_TRIGGER;
        assert!(opts.is_transient());
        assert!(opts.is_lazy_trigger());
        assert!(!opts.contains(StartOptions::ACTIVATION_POLICY));
        assert!(StartOptions::empty().contains(StartOptions::empty()));
        assert!(!StopOptions::empty().is_transient());
    }
}
