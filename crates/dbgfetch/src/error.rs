use std::io;
use std::path::PathBuf;
use std::time::Duration;

use dbgfetch_fetch::{FailureReason, FetchError, ServerFailure};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid build-id: {0}")]
    InvalidBuildId(String),

    #[error("invalid source filename {0:?}")]
    InvalidFilename(String),

    #[error("artifact not cached and no servers configured")]
    NoServersConfigured,

    #[error("cache path {} is not writable", .path.display())]
    CacheUnwritable {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("gave up after {waited:?} waiting for cache lock {}", .path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("all {} servers failed", .0.len())]
    AllServersFailed(Vec<ServerFailure>),

    #[error("cancelled by progress callback")]
    UserCancelled,

    #[error("HTTP client setup failed: {0}")]
    Client(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Collapse the error into a negative errno value.
    ///
    /// `AllServersFailed` becomes `-ENOENT` when every server answered 404,
    /// `-ETIMEDOUT` when every server timed out, and `-EIO` otherwise.
    pub fn code(&self) -> i32 {
        let errno = match self {
            Error::InvalidBuildId(_) | Error::InvalidFilename(_) | Error::Config(_) => libc::EINVAL,
            Error::NoServersConfigured => libc::ENOSYS,
            Error::CacheUnwritable { source, .. } => source.raw_os_error().unwrap_or(libc::EACCES),
            Error::LockTimeout { .. } => libc::EAGAIN,
            Error::AllServersFailed(failures) => {
                if !failures.is_empty() && failures.iter().all(|f| f.reason.is_not_found()) {
                    libc::ENOENT
                } else if !failures.is_empty() && failures.iter().all(|f| f.reason == FailureReason::Timeout) {
                    libc::ETIMEDOUT
                } else {
                    libc::EIO
                }
            }
            Error::UserCancelled => libc::ECANCELED,
            Error::Client(_) => libc::EIO,
        };
        -errno
    }

    /// Per-server failures, when every server failed.
    pub fn failures(&self) -> &[ServerFailure] {
        match self {
            Error::AllServersFailed(failures) => failures,
            _ => &[],
        }
    }
}

impl From<FetchError> for Error {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::NoServers => Error::NoServersConfigured,
            FetchError::AllServersFailed(failures) => Error::AllServersFailed(failures),
            FetchError::UserCancelled => Error::UserCancelled,
        }
    }
}

impl From<dbgfetch_fs::Error> for Error {
    fn from(e: dbgfetch_fs::Error) -> Self {
        let (path, source) = e.into_parts();
        Error::CacheUnwritable { path, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(reason: FailureReason) -> ServerFailure {
        ServerFailure {
            url: "http://example.com/buildid/ab/debuginfo".into(),
            reason,
        }
    }

    #[test]
    fn test_codes_are_negative() {
        let errors = [
            Error::InvalidBuildId("zz".into()),
            Error::NoServersConfigured,
            Error::LockTimeout {
                path:   PathBuf::from("/tmp/x.lock"),
                waited: Duration::from_secs(30),
            },
            Error::UserCancelled,
            Error::Client("tls".into()),
        ];
        for err in errors {
            assert!(err.code() < 0, "{err}");
        }
    }

    #[test]
    fn test_taxonomy_codes_are_distinct() {
        assert_eq!(Error::NoServersConfigured.code(), -libc::ENOSYS);
        assert_eq!(Error::UserCancelled.code(), -libc::ECANCELED);
        assert_eq!(Error::InvalidBuildId(String::new()).code(), -libc::EINVAL);
        assert_ne!(Error::NoServersConfigured.code(), Error::UserCancelled.code());
    }

    #[test]
    fn test_all_not_found_is_enoent() {
        let err = Error::AllServersFailed(vec![failure(FailureReason::Status(404)); 3]);
        assert_eq!(err.code(), -libc::ENOENT);
        assert_eq!(err.failures().len(), 3);
    }

    #[test]
    fn test_all_timeouts_is_etimedout() {
        let err = Error::AllServersFailed(vec![failure(FailureReason::Timeout); 2]);
        assert_eq!(err.code(), -libc::ETIMEDOUT);
    }

    #[test]
    fn test_mixed_failures_is_eio() {
        let err = Error::AllServersFailed(vec![
            failure(FailureReason::Status(404)),
            failure(FailureReason::Transport("connection refused".into())),
        ]);
        assert_eq!(err.code(), -libc::EIO);
    }

    #[test]
    fn test_cache_unwritable_keeps_os_errno() {
        let err = Error::CacheUnwritable {
            path:   PathBuf::from("/ro"),
            source: io::Error::from_raw_os_error(libc::EROFS),
        };
        assert_eq!(err.code(), -libc::EROFS);
    }

    #[test]
    fn test_from_fetch_error() {
        assert!(matches!(Error::from(FetchError::NoServers), Error::NoServersConfigured));
        assert!(matches!(Error::from(FetchError::UserCancelled), Error::UserCancelled));
    }
}
