//! Race one artifact request across many HTTP servers.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable configuration and progress types
//! - [`core`] - Pure checks on status codes and sizes
//! - [`effects`] - The HTTP client abstraction and the racing coordinator
//!
//! # Key Features
//!
//! - **First Success Wins**: every server is asked at once; the first complete
//!   2xx body is returned and the other requests are dropped on the spot
//! - **Deterministic Ties**: results ready in the same poll go to the server
//!   listed first
//! - **Cooperative Cancellation**: the progress callback can stop the whole
//!   race by returning [`ControlFlow::Break`](std::ops::ControlFlow::Break)
//! - **Mechanism-Only**: no retries and no caching; one attempt per server

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use data::{FetchOptions, Progress, ProgressSink, Timeouts};
pub use effects::{BoxStream, Fetched, HttpClient, HttpResponse, RaceFetcher};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestClient;

pub use error::{FailureReason, FetchError, ServerFailure};
