//! Resolve a build-id to debug info, an executable or a source file.
//!
//! A [`Session`] asks every configured server for the artifact at once,
//! keeps the first complete answer and stores it in a local cache, so later
//! lookups for the same build-id never touch the network.
//!
//! ```no_run
//! use dbgfetch::{BuildId, Config, ProcessEnv, Session};
//! use std::sync::Arc;
//!
//! # async fn run() -> dbgfetch::Result<()> {
//! let config = Config::from_env(Arc::new(ProcessEnv))?;
//! let session = Session::begin(config)?;
//! let id: BuildId = "8f3a5c0e1d2b".parse()?;
//! let path = session.find_debuginfo(&id).await?;
//! println!("{}", path.display());
//! session.end();
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod buildid;
pub mod cache;
pub mod config;
mod error;
pub mod servers;
pub mod session;

pub use artifact::Artifact;
pub use buildid::BuildId;
pub use cache::{CacheEntry, CachePolicy, CacheStore, CleanReport, StaleLockPolicy, WriteHandle, WriteOutcome};
pub use config::{Config, Environment, ProcessEnv, ServerSource};
pub use error::{Error, Result};
pub use servers::ServerList;
pub use session::Session;

pub use dbgfetch_fetch::{FailureReason, FetchOptions, HttpClient, Progress, ProgressSink, ServerFailure, Timeouts};

#[cfg(feature = "reqwest")]
pub use dbgfetch_fetch::ReqwestClient;
