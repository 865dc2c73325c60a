#![forbid(unsafe_code)]

//! The activation scope: the context every registration call goes through.
//!
//! A [`Scope`] exists only as a `&mut` borrow inside a running activation,
//! so registering outside an activation is unrepresentable: the borrow
//! checker rejects it at compile time. What remains for runtime validation
//! is the positional contract: every activation of an instance must make
//! the same registration calls, of the same kinds, in the same order as the
//! first activation. Each call is checked against the recorded trace and a
//! mismatch aborts the activation through the body's `?`.
//!
//! # Invariants
//!
//! 1. Registration calls must be unconditional: never inside a branch or a
//!    loop whose iteration count can vary between activations.
//! 2. `initial` arguments are consumed on first registration only; later
//!    activations return the stored value untouched.
//! 3. Setters and dispatchers never mutate synchronously; they enqueue into
//!    the scheduler's batch queue, and the running activation keeps seeing
//!    the values that were current when it started.

use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use heddle_core::diagnostics::Diagnostic;
use heddle_core::error::{Result, RuntimeError};
use heddle_core::id::{InstanceId, SlotKind};
use heddle_core::watch::Watch;

use crate::effect::{EffectBody, EffectSlot, IntoCleanup};
use crate::instance::Instance;
use crate::memo::MemoSlot;
use crate::scheduler::{Mutation, MutationOp, Shared};
use crate::slot::{CellSlot, EqFn, eq_by_rule, eq_by_value};

/// Everything one activation produced besides slot mutations: the effect
/// bodies that must run after it, and buffered diagnostics.
pub(crate) struct ActivationOutput {
    pub(crate) pending_effects: Vec<(usize, EffectBody)>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl core::fmt::Debug for ActivationOutput {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActivationOutput")
            .field("pending_effects", &self.pending_effects.len())
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

/// Registration context for one activation of one instance.
pub struct Scope<'a> {
    inst: &'a mut Instance,
    shared: Weak<Shared>,
    first: bool,
    /// Overall registration position; indexes the kind trace.
    pos: usize,
    cell_cursor: usize,
    effect_cursor: usize,
    memo_cursor: usize,
    pending_effects: Vec<(usize, EffectBody)>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(inst: &'a mut Instance, shared: Weak<Shared>) -> Self {
        let first = !inst.activated;
        Self {
            inst,
            shared,
            first,
            pos: 0,
            cell_cursor: 0,
            effect_cursor: 0,
            memo_cursor: 0,
            pending_effects: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// The instance this activation belongs to.
    #[must_use]
    pub fn instance(&self) -> InstanceId {
        self.inst.id
    }

    /// Whether this is the instance's first activation.
    #[must_use]
    pub fn is_first_activation(&self) -> bool {
        self.first
    }

    /// Validate this call against the recorded trace and advance.
    fn enter(&mut self, kind: SlotKind) -> Result<usize> {
        let position = self.pos;
        if self.first {
            self.inst.trace.push(kind);
        } else {
            match self.inst.trace.get(position) {
                Some(&expected) if expected == kind => {}
                Some(&expected) => {
                    return Err(RuntimeError::RegistrationOrderViolation {
                        instance: self.inst.id,
                        position,
                        expected,
                        found: kind,
                    });
                }
                None => {
                    return Err(RuntimeError::RegistrationCountMismatch {
                        instance: self.inst.id,
                        expected: self.inst.trace.len(),
                        found: position + 1,
                    });
                }
            }
        }
        self.pos += 1;
        Ok(position)
    }

    fn cell_slot<T: Clone + 'static>(
        &mut self,
        kind: SlotKind,
        init: impl FnOnce() -> T,
        eq: impl FnOnce() -> EqFn,
    ) -> Result<(usize, T)> {
        let position = self.enter(kind)?;
        let index = self.cell_cursor;
        self.cell_cursor += 1;
        if index == self.inst.cells.len() {
            let value = init();
            self.inst
                .cells
                .push(CellSlot::new(Rc::new(value.clone()), eq(), type_name::<T>()));
            return Ok((index, value));
        }
        let slot = &self.inst.cells[index];
        match slot.get::<T>() {
            Some(value) => Ok((index, value)),
            None => Err(RuntimeError::SlotTypeMismatch {
                instance: self.inst.id,
                position,
                stored: slot.type_name(),
                requested: type_name::<T>(),
            }),
        }
    }

    fn setter<T>(&self, slot: usize) -> Setter<T> {
        Setter {
            shared: self.shared.clone(),
            instance: self.inst.id,
            slot,
            _marker: PhantomData,
        }
    }

    /// Register a state cell. Returns the current value and its setter.
    ///
    /// `initial` seeds the cell on the first activation and is ignored on
    /// every later one. Change detection uses `T`'s `PartialEq`.
    pub fn cell<T>(&mut self, initial: T) -> Result<(T, Setter<T>)>
    where
        T: Clone + PartialEq + 'static,
    {
        let (index, value) = self.cell_slot(SlotKind::Cell, move || initial, eq_by_value::<T>)?;
        Ok((value, self.setter(index)))
    }

    /// Register a state cell with a deferred initializer. `init` runs once,
    /// on first registration only; use it when building the initial value
    /// is expensive.
    pub fn cell_with<T>(&mut self, init: impl FnOnce() -> T) -> Result<(T, Setter<T>)>
    where
        T: Clone + PartialEq + 'static,
    {
        let (index, value) = self.cell_slot(SlotKind::Cell, init, eq_by_value::<T>)?;
        Ok((value, self.setter(index)))
    }

    /// Register a state cell with a custom equality rule, for composite
    /// types where structural equality is wrong or unavailable.
    pub fn cell_eq<T>(
        &mut self,
        initial: T,
        eq: impl Fn(&T, &T) -> bool + 'static,
    ) -> Result<(T, Setter<T>)>
    where
        T: Clone + 'static,
    {
        let (index, value) =
            self.cell_slot(SlotKind::Cell, move || initial, move || eq_by_rule(eq))?;
        Ok((value, self.setter(index)))
    }

    /// Register a reducer-backed cell. `dispatch(action)` is sugar for
    /// `update(|prev| reducer(prev, action))` against the same slot.
    ///
    /// `reducer` must be pure (no hidden state, no observable side
    /// effects); it is captured on the first activation and reused.
    pub fn reducer<S, A, R>(&mut self, reducer: R, initial: S) -> Result<(S, Dispatch<S, A>)>
    where
        S: Clone + PartialEq + 'static,
        A: 'static,
        R: Fn(&S, A) -> S + 'static,
    {
        let (index, value) =
            self.cell_slot(SlotKind::Reducer, move || initial, eq_by_value::<S>)?;
        let position = self.pos - 1;
        let slot = &mut self.inst.cells[index];
        let reducer_rc: Rc<dyn Fn(&S, A) -> S> = match slot.reducer() {
            Some(stored) => match stored.downcast_ref::<Rc<dyn Fn(&S, A) -> S>>() {
                Some(stored) => Rc::clone(stored),
                None => {
                    return Err(RuntimeError::SlotTypeMismatch {
                        instance: self.inst.id,
                        position,
                        stored: slot.type_name(),
                        requested: type_name::<Rc<dyn Fn(&S, A) -> S>>(),
                    });
                }
            },
            None => {
                let fresh: Rc<dyn Fn(&S, A) -> S> = Rc::new(reducer);
                slot.attach_reducer(Rc::new(Rc::clone(&fresh)));
                fresh
            }
        };
        Ok((
            value,
            Dispatch {
                setter: self.setter(index),
                reducer: reducer_rc,
            },
        ))
    }

    /// Register a side effect.
    ///
    /// The body is deferred: triggered bodies run strictly after this
    /// activation completes, in registration order, each preceded by its
    /// previous cleanup. The body returns `()`, a [`Cleanup`], or an
    /// `Option<Cleanup>`.
    ///
    /// [`Cleanup`]: crate::effect::Cleanup
    pub fn effect<B, C>(&mut self, watch: Watch, body: B) -> Result<()>
    where
        B: FnOnce() -> C + 'static,
        C: IntoCleanup,
    {
        self.enter(SlotKind::Effect)?;
        let index = self.effect_cursor;
        self.effect_cursor += 1;
        let run = if index == self.inst.effects.len() {
            self.inst.effects.push(EffectSlot::first(watch));
            true
        } else {
            let revisit = self.inst.effects[index].revisit(watch);
            if let Some((previous, current)) = revisit.arity_change {
                self.diagnostics.push(Diagnostic::WatchArityChanged {
                    instance: self.inst.id,
                    kind: SlotKind::Effect,
                    slot: index,
                    previous,
                    current,
                });
            }
            revisit.run
        };
        if run {
            self.pending_effects
                .push((index, Box::new(move || body().into_cleanup())));
        }
        Ok(())
    }

    /// Register a memoized derived value, recomputed synchronously when the
    /// watch list changed since the previous activation.
    pub fn memo<T>(&mut self, watch: Watch, compute: impl FnOnce() -> T) -> Result<T>
    where
        T: Clone + 'static,
    {
        let position = self.enter(SlotKind::Memo)?;
        let index = self.memo_cursor;
        self.memo_cursor += 1;
        if index == self.inst.memos.len() {
            let value = compute();
            self.inst
                .memos
                .push(MemoSlot::first(Rc::new(value.clone()), watch, type_name::<T>()));
            return Ok(value);
        }
        let revisit = self.inst.memos[index].revisit(watch);
        if let Some((previous, current)) = revisit.arity_change {
            self.diagnostics.push(Diagnostic::WatchArityChanged {
                instance: self.inst.id,
                kind: SlotKind::Memo,
                slot: index,
                previous,
                current,
            });
        }
        if revisit.run {
            let value = compute();
            self.inst.memos[index].replace(Rc::new(value.clone()));
            return Ok(value);
        }
        self.inst.memos[index]
            .get::<T>()
            .ok_or_else(|| RuntimeError::SlotTypeMismatch {
                instance: self.inst.id,
                position,
                stored: self.inst.memos[index].type_name(),
                requested: type_name::<T>(),
            })
    }

    /// Close out the activation: verify the call count matches the trace
    /// and hand the deferred work to the scheduler.
    pub(crate) fn finish(self) -> Result<ActivationOutput> {
        if !self.first && self.pos != self.inst.trace.len() {
            return Err(RuntimeError::RegistrationCountMismatch {
                instance: self.inst.id,
                expected: self.inst.trace.len(),
                found: self.pos,
            });
        }
        Ok(ActivationOutput {
            pending_effects: self.pending_effects,
            diagnostics: self.diagnostics,
        })
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("instance", &self.inst.id)
            .field("first", &self.first)
            .field("position", &self.pos)
            .finish()
    }
}

/// Handle for mutating one cell. Cheap to clone; usable from effect bodies,
/// cleanup thunks, and host event handlers.
///
/// A setter outliving its scheduler degrades to a no-op.
pub struct Setter<T> {
    shared: Weak<Shared>,
    instance: InstanceId,
    slot: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            instance: self.instance,
            slot: self.slot,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter")
            .field("instance", &self.instance)
            .field("slot", &self.slot)
            .finish()
    }
}

impl<T: 'static> Setter<T> {
    /// Queue a replacement value.
    pub fn set(&self, value: T) {
        self.push(MutationOp::Replace(Rc::new(value)));
    }

    /// Queue an updater. Within one batch, the updater observes the most
    /// recently queued value for this cell, not a value captured before the
    /// batch began: the difference between `set(seen + 1)` three times
    /// (net +1) and `update(|p| p + 1)` three times (net +3).
    pub fn update(&self, f: impl FnOnce(&T) -> T + 'static) {
        self.push(MutationOp::Update(Box::new(move |prev: &dyn Any| {
            prev.downcast_ref::<T>()
                .map(|prev| Rc::new(f(prev)) as Rc<dyn Any>)
        })));
    }

    fn push(&self, op: MutationOp) {
        let Some(shared) = self.shared.upgrade() else {
            tracing::trace!(
                instance = %self.instance,
                slot = self.slot,
                "mutation dropped: scheduler gone"
            );
            return;
        };
        shared.enqueue(Mutation {
            instance: self.instance,
            slot: self.slot,
            op,
        });
    }
}

/// Handle for dispatching actions against a reducer-backed cell.
pub struct Dispatch<S, A> {
    setter: Setter<S>,
    reducer: Rc<dyn Fn(&S, A) -> S>,
}

impl<S, A> Clone for Dispatch<S, A> {
    fn clone(&self) -> Self {
        Self {
            setter: self.setter.clone(),
            reducer: Rc::clone(&self.reducer),
        }
    }
}

impl<S, A> fmt::Debug for Dispatch<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch").field("setter", &self.setter).finish()
    }
}

impl<S: 'static, A: 'static> Dispatch<S, A> {
    /// Queue `update(|prev| reducer(prev, action))`.
    pub fn dispatch(&self, action: A) {
        let reducer = Rc::clone(&self.reducer);
        self.setter.update(move |prev| reducer(prev, action));
    }
}
