#![forbid(unsafe_code)]

//! Single-threaded reactive runtime: instance arenas, a batching scheduler,
//! and dependency-gated effect execution.
//!
//! An instance is a body closure that re-runs ("activates") whenever any of
//! its state cells change. Registration calls inside the body are
//! positional: the same calls, in the same order, on every activation.
//! Mutations never apply synchronously; they batch per task and flush
//! through [`Scheduler::flush`], after which changed instances re-activate
//! and their triggered effects run.
//!
//! ```
//! use heddle_core::watch;
//! use heddle_runtime::Scheduler;
//!
//! let mut sched = Scheduler::default();
//! let id = sched.mount(|scope| {
//!     let (count, set_count) = scope.cell(0i64)?;
//!     scope.effect(watch![count], move || {
//!         // runs after activations where `count` changed
//!     })?;
//!     let _ = set_count; // handed to whatever drives the instance
//!     let _ = count;
//!     Ok(())
//! })?;
//! sched.unmount(id)?;
//! # Ok::<(), heddle_core::error::RuntimeError>(())
//! ```

pub mod cancel;
pub mod effect;
pub mod scheduler;
pub mod scope;

mod instance;
mod memo;
mod slot;

pub use effect::{Cleanup, IntoCleanup};
pub use scheduler::{Phase, Scheduler, SchedulerStats};
pub use scope::{Dispatch, Scope, Setter};

// The core vocabulary most callers need alongside the scheduler.
pub use heddle_core::config::SchedulerConfig;
pub use heddle_core::error::{Result, RuntimeError};
pub use heddle_core::watch::{Dep, Watch};
