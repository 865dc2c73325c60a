#![forbid(unsafe_code)]

//! Out-of-band diagnostics channel for non-fatal anomalies.
//!
//! Some usage errors are reportable but must never abort execution: a
//! watch-list whose length changed between activations is handled
//! conservatively (the effect re-runs), and a mutation that arrives for an
//! instance torn down before the flush is dropped as a no-op. Both still
//! deserve a record the host can observe.
//!
//! The scheduler owns a single [`DiagnosticSink`]. The default sink forwards
//! each record to `tracing` at WARN level; tests install a
//! [`CollectingSink`] and assert on the collected records.

use std::cell::RefCell;
use std::rc::Rc;

use crate::id::{InstanceId, SlotKind};

/// A reportable, non-fatal anomaly.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Diagnostic {
    /// An effect's or memo's watch list changed length between two
    /// activations. The registration is treated as always-run for the
    /// activation that reported this, never silently skipped.
    WatchArityChanged {
        instance: InstanceId,
        /// Which arena the registration lives in.
        kind: SlotKind,
        /// Registration index within that arena.
        slot: usize,
        previous: usize,
        current: usize,
    },
    /// A pending mutation targeted an instance that no longer exists.
    /// The mutation was discarded without being applied.
    MutationDropped { instance: InstanceId, slot: usize },
}

/// Receiver for [`Diagnostic`] records.
pub trait DiagnosticSink {
    /// Deliver one record. Called synchronously from the scheduler; must not
    /// call back into the scheduler.
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Default sink: forwards each record to `tracing` at WARN level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(?diagnostic, "runtime anomaly");
    }
}

/// A sink that stores every record, for inspection in tests.
///
/// Cloning shares the underlying store, so a test can keep one handle while
/// the scheduler owns the other.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    records: Rc<RefCell<Vec<Diagnostic>>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records reported so far.
    #[must_use]
    pub fn records(&self) -> Vec<Diagnostic> {
        self.records.borrow().clone()
    }

    /// Number of records reported so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.records.borrow_mut().push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_sink_shares_records_across_clones() {
        let sink = CollectingSink::new();
        let mut writer = sink.clone();
        assert!(sink.is_empty());

        writer.report(Diagnostic::MutationDropped {
            instance: InstanceId::new(1),
            slot: 0,
        });

        assert_eq!(sink.len(), 1);
        assert_eq!(
            sink.records(),
            vec![Diagnostic::MutationDropped {
                instance: InstanceId::new(1),
                slot: 0,
            }]
        );
    }

    #[test]
    fn tracing_sink_is_callable() {
        // No subscriber installed; the event is simply discarded.
        TracingSink.report(Diagnostic::WatchArityChanged {
            instance: InstanceId::new(2),
            kind: SlotKind::Effect,
            slot: 1,
            previous: 2,
            current: 3,
        });
    }
}
