#![forbid(unsafe_code)]

//! Memoized derived-value slots.
//!
//! A memo recomputes synchronously during activation, only when its watch
//! list changed since the previous activation; otherwise the cached value is
//! returned in O(1).
//!
//! # Invariants
//!
//! 1. The compute function is called at most once per activation.
//! 2. Version increments by exactly 1 per recomputation.
//! 3. If no watched position changed, the cached value is returned untouched.

use std::any::Any;
use std::rc::Rc;

use heddle_core::watch::{Dep, Watch};

use crate::effect::{Revisit, normalize, revisit_watch};

pub(crate) struct MemoSlot {
    value: Rc<dyn Any>,
    watch: Option<Vec<Dep>>,
    version: u64,
    type_name: &'static str,
}

impl MemoSlot {
    /// First registration: the value was just computed.
    pub(crate) fn first(value: Rc<dyn Any>, watch: Watch, type_name: &'static str) -> Self {
        Self {
            value,
            watch: normalize(watch),
            version: 1,
            type_name,
        }
    }

    /// Re-registration on a later activation. When the returned decision
    /// says run, the caller recomputes and stores via [`replace`].
    ///
    /// [`replace`]: MemoSlot::replace
    pub(crate) fn revisit(&mut self, next: Watch) -> Revisit {
        revisit_watch(&mut self.watch, next)
    }

    pub(crate) fn replace(&mut self, value: Rc<dyn Any>) {
        self.value = value;
        self.version += 1;
    }

    /// Clone out the cached value as `T`. `None` on type confusion.
    pub(crate) fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.value.as_ref().downcast_ref::<T>().cloned()
    }

    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }
}
