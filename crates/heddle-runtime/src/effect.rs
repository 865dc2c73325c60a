#![forbid(unsafe_code)]

//! Effect slots: dependency-gated side effects with cleanup.
//!
//! An effect registered without a watch list runs after every activation.
//! An empty watch list runs the body after the first activation only. A
//! non-empty list re-runs the body when any position differs from the values
//! recorded on the previous activation. The watch list is re-recorded on
//! every activation regardless of whether the body runs.
//!
//! # Invariants
//!
//! 1. Triggered bodies run in ascending registration order, strictly after
//!    the activation that triggered them completes.
//! 2. A body's previous cleanup runs synchronously before its next body run,
//!    and exactly once more on teardown.
//! 3. A watch-list arity change is reported, never silently ignored, and the
//!    body runs conservatively for that activation.

use std::fmt;

use heddle_core::watch::{Dep, Watch, same_list};

/// The optional teardown thunk an effect body returns.
///
/// Cleanup is the sole cancellation mechanism for asynchronous work an
/// effect started; the runtime guarantees when the thunk runs, the thunk is
/// responsible for signalling whatever it owns (see [`crate::cancel`]).
pub struct Cleanup(Box<dyn FnOnce()>);

impl Cleanup {
    #[must_use]
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Box::new(f))
    }

    pub(crate) fn run(self) {
        (self.0)();
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup")
    }
}

/// What an effect body may return: nothing, a [`Cleanup`], or an
/// `Option<Cleanup>` decided at run time.
pub trait IntoCleanup {
    fn into_cleanup(self) -> Option<Cleanup>;
}

impl IntoCleanup for () {
    fn into_cleanup(self) -> Option<Cleanup> {
        None
    }
}

impl IntoCleanup for Cleanup {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(self)
    }
}

impl IntoCleanup for Option<Cleanup> {
    fn into_cleanup(self) -> Option<Cleanup> {
        self
    }
}

/// A deferred effect body, captured during activation and run after it.
pub(crate) type EffectBody = Box<dyn FnOnce() -> Option<Cleanup>>;

/// Outcome of re-recording a watch list against the previous activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Revisit {
    /// Whether the registration's body must run for this activation.
    pub(crate) run: bool,
    /// `(previous, current)` lengths when the declared list length changed.
    pub(crate) arity_change: Option<(usize, usize)>,
}

/// `None` means always-run; `Some(deps)` is the recorded list, with the
/// run-once mode normalized to an empty list.
pub(crate) fn normalize(watch: Watch) -> Option<Vec<Dep>> {
    match watch {
        Watch::Always => None,
        Watch::Once => Some(Vec::new()),
        Watch::List(deps) => Some(deps),
    }
}

/// Compare a recorded watch mode against this activation's declaration,
/// then record the new declaration. Shared by effect and memo slots.
pub(crate) fn revisit_watch(recorded: &mut Option<Vec<Dep>>, next: Watch) -> Revisit {
    let next = normalize(next);
    let revisit = match (&*recorded, &next) {
        (None, None) => Revisit {
            run: true,
            arity_change: None,
        },
        (Some(prev), Some(next)) => {
            if prev.len() != next.len() {
                Revisit {
                    run: true,
                    arity_change: Some((prev.len(), next.len())),
                }
            } else {
                Revisit {
                    run: !same_list(prev, next),
                    arity_change: None,
                }
            }
        }
        // Switching between always-run and a list is handled conservatively:
        // record the new mode and run.
        _ => Revisit {
            run: true,
            arity_change: None,
        },
    };
    *recorded = next;
    revisit
}

pub(crate) struct EffectSlot {
    watch: Option<Vec<Dep>>,
    cleanup: Option<Cleanup>,
}

impl EffectSlot {
    /// First registration. The body always runs after the first activation,
    /// whatever the watch mode.
    pub(crate) fn first(watch: Watch) -> Self {
        Self {
            watch: normalize(watch),
            cleanup: None,
        }
    }

    /// Re-registration on a later activation.
    pub(crate) fn revisit(&mut self, next: Watch) -> Revisit {
        revisit_watch(&mut self.watch, next)
    }

    pub(crate) fn take_cleanup(&mut self) -> Option<Cleanup> {
        self.cleanup.take()
    }

    pub(crate) fn store_cleanup(&mut self, cleanup: Cleanup) {
        self.cleanup = Some(cleanup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heddle_core::watch;

    #[test]
    fn always_mode_reruns_every_time() {
        let mut slot = EffectSlot::first(Watch::Always);
        for _ in 0..3 {
            let r = slot.revisit(Watch::Always);
            assert!(r.run);
            assert_eq!(r.arity_change, None);
        }
    }

    #[test]
    fn once_mode_never_reruns() {
        let mut slot = EffectSlot::first(Watch::Once);
        for _ in 0..3 {
            assert!(!slot.revisit(Watch::Once).run);
        }
    }

    #[test]
    fn list_mode_gates_on_value_change() {
        let mut slot = EffectSlot::first(watch![1i64]);
        assert!(!slot.revisit(watch![1i64]).run);
        assert!(slot.revisit(watch![2i64]).run);
        // Unchanged again after the new value was recorded.
        assert!(!slot.revisit(watch![2i64]).run);
    }

    #[test]
    fn arity_change_runs_conservatively_and_reports() {
        let mut slot = EffectSlot::first(watch![1i64]);
        let r = slot.revisit(watch![1i64, 2i64]);
        assert!(r.run);
        assert_eq!(r.arity_change, Some((1, 2)));
        // The widened list is now the recorded baseline.
        assert!(!slot.revisit(watch![1i64, 2i64]).run);
    }

    #[test]
    fn mode_switch_runs_conservatively() {
        let mut slot = EffectSlot::first(Watch::Always);
        assert!(slot.revisit(watch![1i64]).run);
        assert!(slot.revisit(Watch::Always).run);
    }

    #[test]
    fn cleanup_round_trip() {
        let mut slot = EffectSlot::first(Watch::Once);
        assert!(slot.take_cleanup().is_none());

        let ran = std::rc::Rc::new(std::cell::Cell::new(false));
        let flag = std::rc::Rc::clone(&ran);
        slot.store_cleanup(Cleanup::new(move || flag.set(true)));

        let cleanup = slot.take_cleanup().unwrap();
        assert!(slot.take_cleanup().is_none());
        cleanup.run();
        assert!(ran.get());
    }

    #[test]
    fn into_cleanup_conversions() {
        assert!(().into_cleanup().is_none());
        assert!(Cleanup::new(|| {}).into_cleanup().is_some());
        let none: Option<Cleanup> = None;
        assert!(none.into_cleanup().is_none());
    }
}
