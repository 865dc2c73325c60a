#![forbid(unsafe_code)]

//! The batching scheduler: single-threaded, cooperative, no parallel
//! activation of any instance, ever.
//!
//! # State machine
//!
//! `Idle -> BatchOpen -> Flushing -> Idle`. A mutation arriving while idle
//! opens a batch and invokes the wake hook so an outer event loop can
//! schedule [`Scheduler::flush`]; further mutations in the same task append
//! to the open batch. N setter calls inside one synchronous task produce
//! exactly one flush, never N.
//!
//! On flush, pending mutations apply to their cells in recorded order (so
//! an updater observes the most recently queued value for its cell), then
//! every instance with at least one changed cell re-activates, then its
//! triggered effects run in ascending registration order. A mutation
//! enqueued while flushing (typically from an effect body) lands in a
//! fresh batch handled by the next pass of the same flush loop, so effects
//! never observe their own unapplied writes.
//!
//! # Failure Modes
//!
//! - **Unbounded re-activation**: an always-run effect that unconditionally
//!   mutates produces a new batch every pass. The per-task activation
//!   ceiling converts this into an error naming the instance instead of a
//!   hang.
//! - **Fatal abort**: order violations and the ceiling abort the task; the
//!   pending queue is discarded and the scheduler returns to idle, usable.
//! - **Late mutations**: a mutation whose instance was torn down before the
//!   flush is dropped with a diagnostic, not applied, not an error.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use web_time::Instant;

use heddle_core::config::SchedulerConfig;
use heddle_core::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use heddle_core::error::{Result, RuntimeError};
use heddle_core::id::InstanceId;

use crate::instance::Instance;
use crate::scope::Scope;

/// Where the scheduler is in its mutation-processing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No pending mutations.
    Idle,
    /// Mutations queued, flush not yet started.
    BatchOpen,
    /// A flush is applying batches and running activations/effects.
    Flushing,
}

/// One queued `(cell, new-value-or-updater)` pair. Consumed exactly once
/// when its batch flushes.
pub(crate) struct Mutation {
    pub(crate) instance: InstanceId,
    pub(crate) slot: usize,
    pub(crate) op: MutationOp,
}

pub(crate) enum MutationOp {
    Replace(Rc<dyn Any>),
    /// Returns `None` on type confusion; the scheduler drops the mutation
    /// with a diagnostic rather than applying garbage.
    Update(Box<dyn FnOnce(&dyn Any) -> Option<Rc<dyn Any>>>),
}

/// Queue state shared with setters through a weak reference.
pub(crate) struct Shared {
    queue: RefCell<Vec<Mutation>>,
    phase: Cell<Phase>,
    wake: RefCell<Option<Box<dyn FnMut()>>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            queue: RefCell::new(Vec::new()),
            phase: Cell::new(Phase::Idle),
            wake: RefCell::new(None),
        }
    }

    pub(crate) fn enqueue(&self, mutation: Mutation) {
        self.queue.borrow_mut().push(mutation);
        if self.phase.get() == Phase::Idle {
            self.phase.set(Phase::BatchOpen);
            // Take the hook out while it runs; a hook that itself enqueues
            // must not hit a re-entrant borrow.
            let hook = self.wake.borrow_mut().take();
            if let Some(mut hook) = hook {
                hook();
                let mut slot = self.wake.borrow_mut();
                if slot.is_none() {
                    *slot = Some(hook);
                }
            }
        }
    }
}

/// Counters accumulated over a scheduler's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Batches taken off the queue and applied.
    pub batches: u64,
    /// Activations run (first and re-activations alike).
    pub activations: u64,
    /// Mutations that changed a cell's value.
    pub mutations_applied: u64,
    /// Mutations whose computed value equalled the current one.
    pub mutations_coalesced: u64,
    /// Effect bodies run.
    pub effects_run: u64,
    /// Cleanup thunks run (before re-runs and on teardown).
    pub cleanups_run: u64,
}

/// The single-threaded reactive scheduler. Owns every mounted instance.
pub struct Scheduler {
    shared: Rc<Shared>,
    instances: RefCell<AHashMap<InstanceId, Instance>>,
    next_id: Cell<u64>,
    config: SchedulerConfig,
    sink: RefCell<Box<dyn DiagnosticSink>>,
    stats: RefCell<SchedulerStats>,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            shared: Rc::new(Shared::new()),
            instances: RefCell::new(AHashMap::new()),
            next_id: Cell::new(1),
            config,
            sink: RefCell::new(Box::new(TracingSink)),
            stats: RefCell::new(SchedulerStats::default()),
        }
    }

    /// Replace the diagnostics sink (default: forward to `tracing`).
    pub fn set_diagnostic_sink(&mut self, sink: impl DiagnosticSink + 'static) {
        *self.sink.borrow_mut() = Box::new(sink);
    }

    /// Install the wake hook, called whenever a mutation opens a batch
    /// while the scheduler is idle. The external event loop uses this to
    /// schedule a [`flush`](Scheduler::flush) after the current task.
    pub fn set_wake(&mut self, hook: impl FnMut() + 'static) {
        *self.shared.wake.borrow_mut() = Some(Box::new(hook));
    }

    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.shared.phase.get()
    }

    /// Whether mutations are queued awaiting a flush.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.shared.queue.borrow().is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        *self.stats.borrow()
    }

    #[must_use]
    pub fn is_mounted(&self, id: InstanceId) -> bool {
        self.instances.borrow().contains_key(&id)
    }

    /// Revision counters of every cell of `id`, in registration order.
    pub fn cell_revisions(&self, id: InstanceId) -> Result<Vec<u64>> {
        let instances = self.instances.borrow();
        let inst = instances
            .get(&id)
            .ok_or(RuntimeError::UnknownInstance { instance: id })?;
        Ok(inst.cells.iter().map(|cell| cell.revision()).collect())
    }

    /// How many activations `id` has completed since it was mounted.
    pub fn instance_activations(&self, id: InstanceId) -> Result<u64> {
        let instances = self.instances.borrow();
        let inst = instances
            .get(&id)
            .ok_or(RuntimeError::UnknownInstance { instance: id })?;
        Ok(inst.activations)
    }

    /// Mount an instance and run its first activation, the resulting effect
    /// pass, and any follow-on batches as one task.
    ///
    /// If that task fails, the instance is torn down (cleanups run) before
    /// the error propagates.
    pub fn mount<B>(&mut self, body: B) -> Result<InstanceId>
    where
        B: FnMut(&mut Scope<'_>) -> Result<()> + 'static,
    {
        let id = InstanceId::new(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.instances
            .borrow_mut()
            .insert(id, Instance::new(id, Box::new(body)));
        tracing::debug!(instance = %id, "mount");
        if let Err(err) = self.run_task(Some(id)) {
            let _ = self.teardown(id);
            return Err(err);
        }
        Ok(id)
    }

    /// Run one host-requested activation of `id` (plus its effect pass and
    /// follow-on batches) as one task.
    pub fn activate(&mut self, id: InstanceId) -> Result<()> {
        self.run_task(Some(id))
    }

    /// Apply every pending batch: the deferred-flush entry point the host
    /// calls after the wake hook fired.
    pub fn flush(&mut self) -> Result<()> {
        if !self.has_pending() {
            return Ok(());
        }
        self.run_task(None)
    }

    /// Tear down `id`: run every outstanding cleanup exactly once, in
    /// ascending registration order, then destroy the instance and all its
    /// slots.
    pub fn unmount(&mut self, id: InstanceId) -> Result<()> {
        tracing::debug!(instance = %id, "unmount");
        self.teardown(id)
    }

    // ── Internals ────────────────────────────────────────────────────

    /// One externally-triggered task: an optional seed activation, then
    /// batches until the queue runs dry or the ceiling trips.
    fn run_task(&mut self, seed: Option<InstanceId>) -> Result<()> {
        let started = Instant::now();
        let mut budget: AHashMap<InstanceId, u32> = AHashMap::new();
        let result = match seed {
            Some(id) => self
                .activate_once(id, &mut budget)
                .and_then(|()| self.drain(&mut budget)),
            None => self.drain(&mut budget),
        };
        match result {
            Ok(()) => {
                self.shared.phase.set(Phase::Idle);
                tracing::trace!(
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "task complete"
                );
                Ok(())
            }
            Err(err) => {
                // Discard the rest of the task; the scheduler stays usable.
                self.shared.queue.borrow_mut().clear();
                self.shared.phase.set(Phase::Idle);
                tracing::warn!(error = %err, "task aborted");
                Err(err)
            }
        }
    }

    fn drain(&mut self, budget: &mut AHashMap<InstanceId, u32>) -> Result<()> {
        loop {
            let batch = {
                let mut queue = self.shared.queue.borrow_mut();
                if queue.is_empty() {
                    break;
                }
                std::mem::take(&mut *queue)
            };
            self.shared.phase.set(Phase::Flushing);
            tracing::trace!(mutations = batch.len(), "flushing batch");
            self.stats.borrow_mut().batches += 1;
            let dirty = self.apply_batch(batch);
            for id in dirty {
                self.activate_once(id, budget)?;
            }
        }
        Ok(())
    }

    /// Apply one batch in recorded order. Returns the instances with at
    /// least one changed cell, in first-dirtied order.
    fn apply_batch(&self, batch: Vec<Mutation>) -> Vec<InstanceId> {
        let mut dirty: Vec<InstanceId> = Vec::new();
        let mut dropped: Vec<(InstanceId, usize)> = Vec::new();
        {
            let mut instances = self.instances.borrow_mut();
            for mutation in batch {
                let Some(inst) = instances.get_mut(&mutation.instance) else {
                    dropped.push((mutation.instance, mutation.slot));
                    continue;
                };
                let Some(cell) = inst.cells.get_mut(mutation.slot) else {
                    dropped.push((mutation.instance, mutation.slot));
                    continue;
                };
                let next = match mutation.op {
                    MutationOp::Replace(value) => Some(value),
                    MutationOp::Update(updater) => updater(cell.value_any()),
                };
                match next {
                    Some(next) => {
                        if cell.apply(next) {
                            self.stats.borrow_mut().mutations_applied += 1;
                            if !dirty.contains(&mutation.instance) {
                                dirty.push(mutation.instance);
                            }
                        } else {
                            self.stats.borrow_mut().mutations_coalesced += 1;
                        }
                    }
                    None => dropped.push((mutation.instance, mutation.slot)),
                }
            }
        }
        for (instance, slot) in dropped {
            self.report(Diagnostic::MutationDropped { instance, slot });
        }
        dirty
    }

    fn activate_once(
        &mut self,
        id: InstanceId,
        budget: &mut AHashMap<InstanceId, u32>,
    ) -> Result<()> {
        let ceiling = self.config.activation_ceiling;
        let passes = budget.entry(id).or_insert(0);
        *passes += 1;
        if *passes > ceiling {
            return Err(RuntimeError::ActivationLoopExceeded {
                instance: id,
                ceiling,
            });
        }
        self.shared.phase.set(Phase::Flushing);
        self.run_activation(id)
    }

    /// One activation of `id` followed by its triggered-effect pass.
    fn run_activation(&mut self, id: InstanceId) -> Result<()> {
        let output = {
            let mut instances = self.instances.borrow_mut();
            let inst = instances
                .get_mut(&id)
                .ok_or(RuntimeError::UnknownInstance { instance: id })?;
            let Some(mut body) = inst.body.take() else {
                return Err(RuntimeError::ReentrantActivation { instance: id });
            };
            if !inst.activated {
                // A failed first activation leaves partial arenas; rebuild.
                inst.trace.clear();
                inst.cells.clear();
                inst.effects.clear();
                inst.memos.clear();
            }
            let first = !inst.activated;
            tracing::trace!(instance = %id, first, "activation");
            let mut scope = Scope::new(inst, Rc::downgrade(&self.shared));
            let body_result = body(&mut scope);
            let finished = match body_result {
                Ok(()) => scope.finish(),
                Err(err) => Err(err),
            };
            inst.body = Some(body);
            let output = finished?;
            inst.activated = true;
            inst.activations += 1;
            output
        };
        self.stats.borrow_mut().activations += 1;
        for diagnostic in output.diagnostics {
            self.report(diagnostic);
        }
        self.run_effects(id, output.pending_effects);
        Ok(())
    }

    /// Run triggered effect bodies in ascending registration order, each
    /// preceded by its outstanding cleanup. The instance map is unborrowed
    /// while user code runs, so bodies may use setters freely.
    fn run_effects(
        &self,
        id: InstanceId,
        pending: Vec<(usize, crate::effect::EffectBody)>,
    ) {
        for (index, body) in pending {
            let cleanup = {
                let mut instances = self.instances.borrow_mut();
                instances
                    .get_mut(&id)
                    .and_then(|inst| inst.effects.get_mut(index))
                    .and_then(|slot| slot.take_cleanup())
            };
            if let Some(cleanup) = cleanup {
                cleanup.run();
                self.stats.borrow_mut().cleanups_run += 1;
            }
            let new_cleanup = body();
            self.stats.borrow_mut().effects_run += 1;
            if let Some(cleanup) = new_cleanup {
                let mut instances = self.instances.borrow_mut();
                if let Some(slot) = instances
                    .get_mut(&id)
                    .and_then(|inst| inst.effects.get_mut(index))
                {
                    slot.store_cleanup(cleanup);
                }
            }
        }
    }

    fn teardown(&mut self, id: InstanceId) -> Result<()> {
        let inst = self
            .instances
            .borrow_mut()
            .remove(&id)
            .ok_or(RuntimeError::UnknownInstance { instance: id })?;
        for mut slot in inst.effects {
            if let Some(cleanup) = slot.take_cleanup() {
                cleanup.run();
                self.stats.borrow_mut().cleanups_run += 1;
            }
        }
        Ok(())
    }

    fn report(&self, diagnostic: Diagnostic) {
        self.sink.borrow_mut().report(diagnostic);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("phase", &self.phase())
            .field("instances", &self.instances.borrow().len())
            .field("pending", &self.shared.queue.borrow().len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as StdCell;

    #[test]
    fn mount_runs_first_activation() {
        let mut sched = Scheduler::default();
        let id = sched
            .mount(|scope| {
                scope.cell(0i64)?;
                Ok(())
            })
            .unwrap();
        assert!(sched.is_mounted(id));
        assert_eq!(sched.stats().activations, 1);
        assert_eq!(sched.phase(), Phase::Idle);
    }

    #[test]
    fn mutations_open_a_batch_then_flush_applies() {
        let mut sched = Scheduler::default();
        let setter = Rc::new(RefCell::new(None));
        let out = Rc::new(StdCell::new(0i64));

        let setter_slot = Rc::clone(&setter);
        let out_slot = Rc::clone(&out);
        sched
            .mount(move |scope| {
                let (value, set) = scope.cell(0i64)?;
                *setter_slot.borrow_mut() = Some(set);
                out_slot.set(value);
                Ok(())
            })
            .unwrap();

        let set = setter.borrow().clone().unwrap();
        set.set(7);
        assert_eq!(sched.phase(), Phase::BatchOpen);
        assert_eq!(out.get(), 0, "mutation must not apply synchronously");

        sched.flush().unwrap();
        assert_eq!(sched.phase(), Phase::Idle);
        assert_eq!(out.get(), 7);
        assert_eq!(sched.stats().activations, 2);
    }

    #[test]
    fn equal_write_schedules_no_reactivation() {
        let mut sched = Scheduler::default();
        let setter = Rc::new(RefCell::new(None));

        let setter_slot = Rc::clone(&setter);
        let id = sched
            .mount(move |scope| {
                let (_, set) = scope.cell(5i64)?;
                *setter_slot.borrow_mut() = Some(set);
                Ok(())
            })
            .unwrap();

        let set = setter.borrow().clone().unwrap();
        set.set(5);
        sched.flush().unwrap();

        assert_eq!(sched.stats().activations, 1);
        assert_eq!(sched.stats().mutations_coalesced, 1);
        assert_eq!(sched.cell_revisions(id).unwrap(), vec![0]);
    }

    #[test]
    fn wake_hook_fires_once_per_batch() {
        let mut sched = Scheduler::default();
        let wakes = Rc::new(StdCell::new(0u32));
        let wakes_hook = Rc::clone(&wakes);
        sched.set_wake(move || wakes_hook.set(wakes_hook.get() + 1));

        let setter = Rc::new(RefCell::new(None));
        let setter_slot = Rc::clone(&setter);
        sched
            .mount(move |scope| {
                let (_, set) = scope.cell(0i64)?;
                *setter_slot.borrow_mut() = Some(set);
                Ok(())
            })
            .unwrap();

        let set = setter.borrow().clone().unwrap();
        set.set(1);
        set.set(2);
        set.set(3);
        assert_eq!(wakes.get(), 1, "one batch, one wake");

        sched.flush().unwrap();
        set.set(4);
        assert_eq!(wakes.get(), 2);
    }

    #[test]
    fn unmount_then_flush_drops_mutation_with_diagnostic() {
        use heddle_core::diagnostics::CollectingSink;

        let mut sched = Scheduler::default();
        let sink = CollectingSink::new();
        sched.set_diagnostic_sink(sink.clone());

        let setter = Rc::new(RefCell::new(None));
        let setter_slot = Rc::clone(&setter);
        let id = sched
            .mount(move |scope| {
                let (_, set) = scope.cell(0i64)?;
                *setter_slot.borrow_mut() = Some(set);
                Ok(())
            })
            .unwrap();

        let set = setter.borrow().clone().unwrap();
        set.set(1);
        sched.unmount(id).unwrap();
        sched.flush().unwrap();

        assert_eq!(
            sink.records(),
            vec![Diagnostic::MutationDropped {
                instance: id,
                slot: 0,
            }]
        );
    }

    #[test]
    fn unknown_instance_errors() {
        let mut sched = Scheduler::default();
        let ghost = InstanceId::new(99);
        assert_eq!(
            sched.activate(ghost).unwrap_err(),
            RuntimeError::UnknownInstance { instance: ghost }
        );
        assert_eq!(
            sched.unmount(ghost).unwrap_err(),
            RuntimeError::UnknownInstance { instance: ghost }
        );
    }
}
