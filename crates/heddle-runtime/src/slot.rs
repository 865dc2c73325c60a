#![forbid(unsafe_code)]

//! Cell slot storage: one positional state value per slot.
//!
//! # Invariants
//!
//! 1. The revision counter increments exactly once per mutation that changes
//!    the value; a write equal to the current value under the slot's
//!    equality rule is a no-op (no revision bump, no re-activation).
//! 2. The equality rule and value type are fixed at first registration and
//!    never change for the slot's lifetime.
//! 3. Slots are append-only within their instance and are destroyed together
//!    with it.

use std::any::Any;
use std::rc::Rc;

/// Type-erased equality over two values of the slot's concrete type.
/// A type confusion (which order validation rules out upstream) compares
/// as "different" rather than panicking.
pub(crate) type EqFn = Rc<dyn Fn(&dyn Any, &dyn Any) -> bool>;

/// Build the default equality rule for `T` from its `PartialEq`.
pub(crate) fn eq_by_value<T: PartialEq + 'static>() -> EqFn {
    Rc::new(|a: &dyn Any, b: &dyn Any| {
        match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    })
}

/// Wrap a caller-supplied equality function for `T`.
pub(crate) fn eq_by_rule<T: 'static>(eq: impl Fn(&T, &T) -> bool + 'static) -> EqFn {
    Rc::new(move |a: &dyn Any, b: &dyn Any| {
        match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
            (Some(a), Some(b)) => eq(a, b),
            _ => false,
        }
    })
}

pub(crate) struct CellSlot {
    value: Rc<dyn Any>,
    revision: u64,
    eq: EqFn,
    type_name: &'static str,
    /// Reducer function attached at first registration, for reducer-backed
    /// cells only. Stored type-erased: `Rc<dyn Fn(&S, A) -> S>`.
    reducer: Option<Rc<dyn Any>>,
}

impl CellSlot {
    pub(crate) fn new(value: Rc<dyn Any>, eq: EqFn, type_name: &'static str) -> Self {
        Self {
            value,
            revision: 0,
            eq,
            type_name,
            reducer: None,
        }
    }

    pub(crate) fn value_any(&self) -> &dyn Any {
        self.value.as_ref()
    }

    /// Clone out the value as `T`. `None` on type confusion.
    pub(crate) fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.value.as_ref().downcast_ref::<T>().cloned()
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Apply a computed next value. Returns whether the value changed;
    /// equal writes leave value and revision untouched.
    pub(crate) fn apply(&mut self, next: Rc<dyn Any>) -> bool {
        if (self.eq)(self.value.as_ref(), next.as_ref()) {
            return false;
        }
        self.value = next;
        self.revision += 1;
        true
    }

    pub(crate) fn attach_reducer(&mut self, reducer: Rc<dyn Any>) {
        self.reducer = Some(reducer);
    }

    pub(crate) fn reducer(&self) -> Option<&Rc<dyn Any>> {
        self.reducer.as_ref()
    }
}
