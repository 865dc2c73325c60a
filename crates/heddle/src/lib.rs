#![forbid(unsafe_code)]

//! Heddle public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub use heddle_core::watch;

pub mod prelude {
    pub use heddle_core as core;
    pub use heddle_runtime as runtime;

    pub use heddle_core::config::SchedulerConfig;
    pub use heddle_core::diagnostics::{CollectingSink, Diagnostic, DiagnosticSink};
    pub use heddle_core::error::{Result, RuntimeError};
    pub use heddle_core::id::InstanceId;
    pub use heddle_core::watch::{Dep, Watch};
    pub use heddle_runtime::cancel::{CancelSource, CancelToken};
    pub use heddle_runtime::{
        Cleanup, Dispatch, IntoCleanup, Phase, Scheduler, SchedulerStats, Scope, Setter,
    };
}
