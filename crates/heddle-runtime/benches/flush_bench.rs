//! Benchmarks for the batching scheduler's flush path.
//!
//! Run with: cargo bench -p heddle-runtime --bench flush_bench

use std::cell::RefCell;
use std::hint::black_box;
use std::rc::Rc;

use criterion::{Criterion, criterion_group, criterion_main};
use heddle_core::watch;
use heddle_runtime::{Scheduler, Setter};

fn mounted_counter(sched: &mut Scheduler) -> Setter<i64> {
    let setter: Rc<RefCell<Option<Setter<i64>>>> = Rc::new(RefCell::new(None));
    let setter_slot = Rc::clone(&setter);
    sched
        .mount(move |scope| {
            let (count, set) = scope.cell(0i64)?;
            *setter_slot.borrow_mut() = Some(set);
            scope.effect(watch![count], || ())?;
            Ok(())
        })
        .expect("mount");
    let set = setter.borrow().clone().expect("setter stored");
    set
}

fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/flush");

    group.bench_function("single_mutation", |b| {
        let mut sched = Scheduler::default();
        let set = mounted_counter(&mut sched);
        let mut next = 0i64;
        b.iter(|| {
            next += 1;
            set.set(black_box(next));
            sched.flush().expect("flush");
        });
    });

    group.bench_function("batch_of_100_replacements", |b| {
        let mut sched = Scheduler::default();
        let set = mounted_counter(&mut sched);
        let mut base = 0i64;
        b.iter(|| {
            base += 100;
            for i in 0..100 {
                set.set(black_box(base + i));
            }
            sched.flush().expect("flush");
        });
    });

    group.bench_function("batch_of_100_updaters", |b| {
        let mut sched = Scheduler::default();
        let set = mounted_counter(&mut sched);
        b.iter(|| {
            for _ in 0..100 {
                set.update(|prev| black_box(prev + 1));
            }
            sched.flush().expect("flush");
        });
    });

    group.finish();
}

fn bench_activation(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/activation");

    group.bench_function("ten_cells_one_effect", |b| {
        let mut sched = Scheduler::default();
        let setter: Rc<RefCell<Option<Setter<i64>>>> = Rc::new(RefCell::new(None));
        let setter_slot = Rc::clone(&setter);
        let id = sched
            .mount(move |scope| {
                let (first, set) = scope.cell(0i64)?;
                *setter_slot.borrow_mut() = Some(set);
                for seed in 1..10i64 {
                    scope.cell(seed)?;
                }
                scope.effect(watch![first], || ())?;
                Ok(())
            })
            .expect("mount");
        b.iter(|| sched.activate(black_box(id)).expect("activate"));
    });

    group.finish();
}

criterion_group!(benches, bench_flush, bench_activation);
criterion_main!(benches);
