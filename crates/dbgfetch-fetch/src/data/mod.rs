//! Immutable data types for racing fetches.
//!
//! Configuration and progress types passed into and out of the coordinator.
//! None of them perform I/O.

pub mod options;
pub mod progress;

pub use options::{FetchOptions, Timeouts};
pub use progress::{Progress, ProgressSink};
