#![forbid(unsafe_code)]

//! Identity types shared across the runtime.
//!
//! Slot identity is positional: a slot is addressed by its registration index
//! within its owning instance, and the registration sequence must be
//! reproduced identically on every activation. `SlotKind` records what kind
//! of registration occupied each position so mismatches can be reported with
//! the exact offending call.

use std::fmt;

/// Unique identifier for a mounted instance.
///
/// Allocated by the scheduler; never reused within one scheduler's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstanceId(pub u64);

impl InstanceId {
    /// Create an instance ID from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance {}", self.0)
    }
}

/// What kind of registration occupies a position in an instance's
/// registration trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SlotKind {
    /// A state cell (`Scope::cell` and variants).
    Cell,
    /// A reducer-backed cell (`Scope::reducer`).
    Reducer,
    /// A side effect (`Scope::effect`).
    Effect,
    /// A memoized derived value (`Scope::memo`).
    Memo,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cell => "cell",
            Self::Reducer => "reducer",
            Self::Effect => "effect",
            Self::Memo => "memo",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_round_trip() {
        let id = InstanceId::new(7);
        assert_eq!(id.raw(), 7);
        assert_eq!(id, InstanceId(7));
    }

    #[test]
    fn instance_id_display() {
        assert_eq!(InstanceId::new(3).to_string(), "instance 3");
    }

    #[test]
    fn slot_kind_display() {
        assert_eq!(SlotKind::Cell.to_string(), "cell");
        assert_eq!(SlotKind::Reducer.to_string(), "reducer");
        assert_eq!(SlotKind::Effect.to_string(), "effect");
        assert_eq!(SlotKind::Memo.to_string(), "memo");
    }
}
