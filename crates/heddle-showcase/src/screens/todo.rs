#![forbid(unsafe_code)]

//! Todo screen: a reducer-backed list with a memoized summary.
//!
//! The list state lives in one reducer cell; a memo derives the summary
//! line only when the list actually changed, and an effect logs it.

use std::cell::RefCell;
use std::rc::Rc;

use heddle_core::error::Result;
use heddle_core::watch;
use heddle_runtime::{Dispatch, Scheduler};

#[derive(Debug, Clone, PartialEq, Eq)]
struct TodoItem {
    id: u32,
    label: String,
    done: bool,
}

#[derive(Debug, Clone)]
enum TodoAction {
    Add(String),
    Toggle(u32),
    Remove(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct TodoList {
    next_id: u32,
    items: Vec<TodoItem>,
}

fn todo_reducer(list: &TodoList, action: TodoAction) -> TodoList {
    let mut next = list.clone();
    match action {
        TodoAction::Add(label) => {
            next.items.push(TodoItem {
                id: next.next_id,
                label,
                done: false,
            });
            next.next_id += 1;
        }
        TodoAction::Toggle(id) => {
            if let Some(item) = next.items.iter_mut().find(|item| item.id == id) {
                item.done = !item.done;
            }
        }
        TodoAction::Remove(id) => {
            next.items.retain(|item| item.id != id);
        }
    }
    next
}

fn summarize(list: &TodoList) -> String {
    let open = list.items.iter().filter(|item| !item.done).count();
    format!("{open} open of {} item(s)", list.items.len())
}

pub fn run() -> Result<()> {
    tracing::info!("── todo ──");

    let mut sched = Scheduler::default();
    let dispatch: Rc<RefCell<Option<Dispatch<TodoList, TodoAction>>>> =
        Rc::new(RefCell::new(None));

    let dispatch_slot = Rc::clone(&dispatch);
    let id = sched.mount(move |scope| {
        let (list, d) = scope.reducer(todo_reducer, TodoList::default())?;
        *dispatch_slot.borrow_mut() = Some(d);

        let summary = scope.memo(watch![list.clone()], || summarize(&list))?;
        scope.effect(watch![summary.clone()], move || {
            tracing::info!(%summary, "todo list");
        })?;
        Ok(())
    })?;

    let d = dispatch.borrow().clone().expect("body stored the dispatcher");

    // One task adds two items and finishes the first.
    d.dispatch(TodoAction::Add("study the scheduler".to_string()));
    d.dispatch(TodoAction::Add("write the demo".to_string()));
    d.dispatch(TodoAction::Toggle(0));
    sched.flush()?;

    d.dispatch(TodoAction::Remove(0));
    sched.flush()?;

    // Toggling a missing id leaves the list untouched: no re-activation.
    d.dispatch(TodoAction::Toggle(999));
    sched.flush()?;

    sched.unmount(id)?;
    tracing::info!(stats = ?sched.stats(), "todo done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reducer_add_toggle_remove() {
        let list = todo_reducer(&TodoList::default(), TodoAction::Add("a".to_string()));
        let list = todo_reducer(&list, TodoAction::Add("b".to_string()));
        assert_eq!(list.items.len(), 2);

        let list = todo_reducer(&list, TodoAction::Toggle(0));
        assert!(list.items[0].done);
        assert_eq!(summarize(&list), "1 open of 2 item(s)");

        let list = todo_reducer(&list, TodoAction::Remove(0));
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].id, 1);
    }

    #[test]
    fn toggling_a_missing_id_is_identity() {
        let list = todo_reducer(&TodoList::default(), TodoAction::Add("a".to_string()));
        let same = todo_reducer(&list, TodoAction::Toggle(42));
        assert_eq!(list, same);
    }

    #[test]
    fn screen_runs_end_to_end() {
        run().unwrap();
    }
}
