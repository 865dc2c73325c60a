#![forbid(unsafe_code)]

//! Instance records: the body closure plus positional slot arenas.
//!
//! All three arenas (cells, effects, memos) are append-only and positionally
//! stable: a slot is created lazily by the first activation and reused by
//! position on every later one. The registration-kind trace recorded on the
//! first activation is the reference every later activation is validated
//! against.

use heddle_core::error::Result;
use heddle_core::id::{InstanceId, SlotKind};

use crate::effect::EffectSlot;
use crate::memo::MemoSlot;
use crate::scope::Scope;
use crate::slot::CellSlot;

/// The instance body, re-run positionally on every activation.
pub(crate) type Body = Box<dyn FnMut(&mut Scope<'_>) -> Result<()>>;

pub(crate) struct Instance {
    pub(crate) id: InstanceId,
    /// Taken out while the body runs; `None` marks an activation in flight.
    pub(crate) body: Option<Body>,
    pub(crate) cells: Vec<CellSlot>,
    pub(crate) effects: Vec<EffectSlot>,
    pub(crate) memos: Vec<MemoSlot>,
    /// Registration kinds in call order, recorded on the first activation.
    pub(crate) trace: Vec<SlotKind>,
    /// Whether the first activation completed successfully.
    pub(crate) activated: bool,
    pub(crate) activations: u64,
}

impl Instance {
    pub(crate) fn new(id: InstanceId, body: Body) -> Self {
        Self {
            id,
            body: Some(body),
            cells: Vec::new(),
            effects: Vec::new(),
            memos: Vec::new(),
            trace: Vec::new(),
            activated: false,
            activations: 0,
        }
    }
}
