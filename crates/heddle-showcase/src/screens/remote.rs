#![forbid(unsafe_code)]

//! Remote panel screen: fetch-on-change with cleanup-driven cancellation.
//!
//! The effect "starts a request" by pushing it onto a host-side outbox and
//! returns a cleanup that cancels the request's token. Completions arrive
//! later as ordinary external tasks; a completion whose token was cancelled
//! (because a newer query superseded it, or the panel was torn down) is
//! discarded at delivery.

use std::cell::RefCell;
use std::rc::Rc;

use heddle_core::error::Result;
use heddle_core::watch;
use heddle_runtime::cancel::{CancelSource, CancelToken};
use heddle_runtime::{Cleanup, Scheduler, Setter};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum PanelState {
    #[default]
    Idle,
    Loading,
    Ready(String),
}

/// A request the simulated backend will answer later.
struct PendingRequest {
    query: String,
    token: CancelToken,
    deliver: Setter<PanelState>,
}

/// The simulated backend's answer for a query.
fn respond(query: &str) -> String {
    format!("{} result(s) for '{query}'", query.len())
}

pub fn run() -> Result<()> {
    tracing::info!("── remote ──");

    let mut sched = Scheduler::default();
    let outbox: Rc<RefCell<Vec<PendingRequest>>> = Rc::new(RefCell::new(Vec::new()));
    let set_query: Rc<RefCell<Option<Setter<String>>>> = Rc::new(RefCell::new(None));

    let outbox_body = Rc::clone(&outbox);
    let query_slot = Rc::clone(&set_query);
    let id = sched.mount(move |scope| {
        let (query, sq) = scope.cell(String::new())?;
        let (state, set_state) = scope.cell(PanelState::default())?;
        *query_slot.borrow_mut() = Some(sq);
        tracing::info!(?state, %query, "panel");

        let requests = Rc::clone(&outbox_body);
        scope.effect(watch![query.clone()], move || {
            if query.is_empty() {
                return None;
            }
            set_state.set(PanelState::Loading);
            let source = CancelSource::new();
            requests.borrow_mut().push(PendingRequest {
                query: query.clone(),
                token: source.token(),
                deliver: set_state.clone(),
            });
            tracing::info!(%query, token = source.token().id(), "request started");
            Some(Cleanup::new(move || source.cancel()))
        })?;
        Ok(())
    })?;

    let sq = set_query.borrow().clone().expect("body stored the setter");

    // A rapid double-type: the second query supersedes the first before
    // the backend answered.
    sq.set("hed".to_string());
    sched.flush()?;
    sq.set("heddle".to_string());
    sched.flush()?;

    // The backend answers both, oldest first. Each completion is its own
    // external task; the superseded one finds its token cancelled.
    let answered = std::mem::take(&mut *outbox.borrow_mut());
    for request in answered {
        if request.token.is_cancelled() {
            tracing::info!(query = %request.query, "completion discarded: superseded");
            continue;
        }
        request.deliver.set(PanelState::Ready(respond(&request.query)));
        sched.flush()?;
    }

    sched.unmount(id)?;
    tracing::info!(stats = ?sched.stats(), "remote done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superseded_request_never_delivers() {
        run().unwrap();
    }

    #[test]
    fn respond_names_the_query() {
        assert_eq!(respond("abc"), "3 result(s) for 'abc'");
    }
}
