#![forbid(unsafe_code)]

//! Error taxonomy for the heddle runtime.
//!
//! Every variant here is fatal for the activation or flush cycle that raised
//! it: the cycle aborts, the error propagates synchronously to the host, and
//! nothing is retried. Non-fatal anomalies travel through the diagnostics
//! channel instead (see [`crate::diagnostics`]).

use thiserror::Error;

use crate::id::{InstanceId, SlotKind};

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// A registration call's kind differs from the one recorded at the same
    /// position on the first activation. Slot identities can no longer be
    /// mapped safely, so the activation aborts.
    #[error(
        "registration order violated for {instance}: expected {expected} at position {position}, found {found}"
    )]
    RegistrationOrderViolation {
        instance: InstanceId,
        position: usize,
        expected: SlotKind,
        found: SlotKind,
    },

    /// An activation made fewer or more registration calls than the first
    /// activation of the same instance.
    #[error(
        "registration count mismatch for {instance}: first activation recorded {expected} calls, this activation made {found}"
    )]
    RegistrationCountMismatch {
        instance: InstanceId,
        expected: usize,
        found: usize,
    },

    /// A slot's value type changed between activations. This is the same
    /// failure class as an order violation, reported with the concrete types
    /// involved.
    #[error(
        "slot type changed for {instance} at position {position}: stored {stored}, requested {requested}"
    )]
    SlotTypeMismatch {
        instance: InstanceId,
        position: usize,
        stored: &'static str,
        requested: &'static str,
    },

    /// An instance was re-activated more times than the configured ceiling
    /// within one externally-triggered task. The pending queue is discarded
    /// and the scheduler returns to idle.
    #[error("activation loop exceeded ceiling {ceiling} for {instance}")]
    ActivationLoopExceeded { instance: InstanceId, ceiling: u32 },

    /// The scheduler was re-entered (activate, flush, or unmount called from
    /// inside a running activation or effect pass).
    #[error("re-entrant scheduler call while {instance} is activating")]
    ReentrantActivation { instance: InstanceId },

    /// Operation against an instance id that was never mounted or has been
    /// torn down.
    #[error("unknown {instance}")]
    UnknownInstance { instance: InstanceId },
}

impl RuntimeError {
    /// The instance the error concerns.
    #[must_use]
    pub fn instance(&self) -> InstanceId {
        match self {
            Self::RegistrationOrderViolation { instance, .. }
            | Self::RegistrationCountMismatch { instance, .. }
            | Self::SlotTypeMismatch { instance, .. }
            | Self::ActivationLoopExceeded { instance, .. }
            | Self::ReentrantActivation { instance }
            | Self::UnknownInstance { instance } => *instance,
        }
    }
}
