#![forbid(unsafe_code)]

//! Counter screen: a reducer-driven counter under simulated clicks.
//!
//! Demonstrates the two core guarantees around mutation timing: a burst of
//! dispatches in one task flushes once, and updaters compose on the latest
//! queued value instead of a stale capture.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use heddle_core::error::Result;
use heddle_core::watch;
use heddle_runtime::{Dispatch, Scheduler};

#[derive(Debug, Clone, Copy)]
enum CounterAction {
    Increment,
    Decrement,
    Reset,
}

fn counter_reducer(count: &i64, action: CounterAction) -> i64 {
    match action {
        CounterAction::Increment => count + 1,
        CounterAction::Decrement => count - 1,
        CounterAction::Reset => 0,
    }
}

pub fn run(clicks: u32) -> Result<()> {
    tracing::info!("── counter ──");

    let mut sched = Scheduler::default();
    let activations = Rc::new(Cell::new(0u32));
    let dispatch: Rc<RefCell<Option<Dispatch<i64, CounterAction>>>> =
        Rc::new(RefCell::new(None));

    let activations_body = Rc::clone(&activations);
    let dispatch_slot = Rc::clone(&dispatch);
    let id = sched.mount(move |scope| {
        activations_body.set(activations_body.get() + 1);
        let (count, d) = scope.reducer(counter_reducer, 0i64)?;
        *dispatch_slot.borrow_mut() = Some(d);
        scope.effect(watch![count], move || {
            tracing::info!(count, "count changed");
        })?;
        Ok(())
    })?;

    let d = dispatch.borrow().clone().expect("body stored the dispatcher");

    // One burst of clicks is one task: however many dispatches queue up,
    // the counter re-activates once.
    for _ in 0..clicks {
        d.dispatch(CounterAction::Increment);
    }
    d.dispatch(CounterAction::Decrement);
    sched.flush()?;
    tracing::info!(
        activations = activations.get(),
        "after one burst of {} clicks",
        clicks + 1
    );

    d.dispatch(CounterAction::Reset);
    sched.flush()?;

    sched.unmount(id)?;
    tracing::info!(stats = ?sched.stats(), "counter done");
    Ok(())
}
