//! I/O: the HTTP client abstraction and the racing coordinator.

mod http;
mod race;

pub use http::{BoxStream, HttpClient, HttpResponse};
pub use race::{Fetched, RaceFetcher};

#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
