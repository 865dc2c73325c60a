//! Property-based invariant tests for the batching scheduler.
//!
//! These must hold for **any** sequence of mutations queued within one
//! task:
//!
//! 1. The final cell value equals the left fold of the operations
//!    (replacements overwrite, updaters compose on the latest queued
//!    value).
//! 2. One task produces at most one re-activation of the instance, however
//!    many mutations were queued (batching).
//! 3. The revision counter equals the number of applications that actually
//!    changed the value, in queue order (equal writes coalesce).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;

use heddle_core::id::InstanceId;
use heddle_runtime::{Scheduler, Setter};

#[derive(Debug, Clone, Copy)]
enum Op {
    Set(i8),
    Add(i8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![any::<i8>().prop_map(Op::Set), any::<i8>().prop_map(Op::Add)]
}

/// Mount a single i64 cell and hand back its id, setter, and the value the
/// body saw on its most recent activation.
fn mounted_cell(sched: &mut Scheduler) -> (InstanceId, Setter<i64>, Rc<Cell<i64>>) {
    let seen = Rc::new(Cell::new(0i64));
    let setter: Rc<RefCell<Option<Setter<i64>>>> = Rc::new(RefCell::new(None));

    let seen_body = Rc::clone(&seen);
    let setter_slot = Rc::clone(&setter);
    let id = sched
        .mount(move |scope| {
            let (value, set) = scope.cell(0i64)?;
            seen_body.set(value);
            *setter_slot.borrow_mut() = Some(set);
            Ok(())
        })
        .expect("mount");

    let set = setter.borrow().clone().expect("setter stored");
    (id, set, seen)
}

/// The reference semantics: apply ops left to right, tracking how many
/// applications changed the value.
fn fold_ops(ops: &[Op]) -> (i64, u64) {
    let mut value = 0i64;
    let mut changes = 0u64;
    for op in ops {
        let next = match op {
            Op::Set(v) => i64::from(*v),
            Op::Add(d) => value + i64::from(*d),
        };
        if next != value {
            value = next;
            changes += 1;
        }
    }
    (value, changes)
}

proptest! {
    #[test]
    fn final_value_is_the_fold(ops in proptest::collection::vec(op_strategy(), 0..40)) {
        let mut sched = Scheduler::default();
        let (_, set, seen) = mounted_cell(&mut sched);

        for op in &ops {
            match *op {
                Op::Set(v) => set.set(i64::from(v)),
                Op::Add(d) => set.update(move |prev| prev + i64::from(d)),
            }
        }
        sched.flush().unwrap();

        let (expected, _) = fold_ops(&ops);
        prop_assert_eq!(seen.get(), expected);
    }

    #[test]
    fn one_task_reactivates_at_most_once(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let mut sched = Scheduler::default();
        let (_, set, _) = mounted_cell(&mut sched);

        for op in &ops {
            match *op {
                Op::Set(v) => set.set(i64::from(v)),
                Op::Add(d) => set.update(move |prev| prev + i64::from(d)),
            }
        }
        sched.flush().unwrap();

        // Mount's activation plus at most one for the whole batch.
        prop_assert!(sched.stats().activations <= 2);
        prop_assert_eq!(sched.stats().batches, 1);
    }

    #[test]
    fn revision_counts_changing_writes(ops in proptest::collection::vec(op_strategy(), 0..40)) {
        let mut sched = Scheduler::default();
        let (id, set, _) = mounted_cell(&mut sched);

        for op in &ops {
            match *op {
                Op::Set(v) => set.set(i64::from(v)),
                Op::Add(d) => set.update(move |prev| prev + i64::from(d)),
            }
        }
        sched.flush().unwrap();

        let (_, changes) = fold_ops(&ops);
        prop_assert_eq!(sched.cell_revisions(id).unwrap(), vec![changes]);
    }

    #[test]
    fn interleaved_tasks_converge(
        first in proptest::collection::vec(op_strategy(), 0..20),
        second in proptest::collection::vec(op_strategy(), 0..20),
    ) {
        let mut sched = Scheduler::default();
        let (_, set, seen) = mounted_cell(&mut sched);

        for op in &first {
            match *op {
                Op::Set(v) => set.set(i64::from(v)),
                Op::Add(d) => set.update(move |prev| prev + i64::from(d)),
            }
        }
        sched.flush().unwrap();
        for op in &second {
            match *op {
                Op::Set(v) => set.set(i64::from(v)),
                Op::Add(d) => set.update(move |prev| prev + i64::from(d)),
            }
        }
        sched.flush().unwrap();

        let mut all = first.clone();
        all.extend_from_slice(&second);
        let (expected, _) = fold_ops(&all);
        prop_assert_eq!(seen.get(), expected);
    }
}
