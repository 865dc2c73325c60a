#![forbid(unsafe_code)]

//! One module per demo screen.

pub mod counter;
pub mod remote;
pub mod todo;
