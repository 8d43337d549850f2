use std::sync::Arc;
use std::time::Duration;

/// Per-server time limits.
///
/// Exceeding any of them fails that one server with
/// [`FailureReason::Timeout`](crate::FailureReason::Timeout); the other
/// servers keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Time allowed until response headers arrive.
    ///
    /// Default: 30s
    pub connect: Duration,

    /// Longest gap allowed between two body chunks.
    ///
    /// Default: 90s
    pub idle: Duration,

    /// Cap on the whole attempt, connect included.
    ///
    /// Default: None
    pub total: Option<Duration>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            idle:    Duration::from_secs(90),
            total:   None,
        }
    }
}

/// Configuration for a race.
///
/// # Examples
///
/// ```
/// use dbgfetch_fetch::{FetchOptions, Timeouts};
/// use std::time::Duration;
///
/// let options = FetchOptions::default()
///     .idle_timeout(Duration::from_secs(10))
///     .max_size(Some(64 * 1024 * 1024))
///     .header("User-Agent", "gdb/14");
/// assert_eq!(options.timeouts.idle, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub timeouts: Timeouts,

    /// Largest artifact accepted from any server, in bytes.
    ///
    /// Checked against Content-Length up front and against the streamed
    /// size as chunks arrive.
    ///
    /// Default: None
    pub max_size: Option<u64>,

    /// Custom HTTP headers sent with every request.
    ///
    /// Default: empty
    pub headers: Arc<[(String, String)]>,
}

impl FetchOptions {
    #[must_use]
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, connect: Duration) -> Self {
        self.timeouts.connect = connect;
        self
    }

    #[must_use]
    pub fn idle_timeout(mut self, idle: Duration) -> Self {
        self.timeouts.idle = idle;
        self
    }

    /// Set the header wait and the chunk gap to the same limit.
    ///
    /// This is the meaning of a single "transfer timeout" setting such as
    /// `DEBUGINFOD_TIMEOUT`: a server must start answering, and keep
    /// sending, within `limit`.
    #[must_use]
    pub fn transfer_timeout(mut self, limit: Duration) -> Self {
        self.timeouts.connect = limit;
        self.timeouts.idle = limit;
        self
    }

    #[must_use]
    pub fn total_timeout(mut self, total: Option<Duration>) -> Self {
        self.timeouts.total = total;
        self
    }

    #[must_use]
    pub fn max_size(mut self, max_size: Option<u64>) -> Self {
        self.max_size = max_size;
        self
    }

    /// Add a single custom HTTP header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers: Vec<_> = self.headers.iter().cloned().collect();
        headers.push((key.into(), value.into()));
        self.headers = Arc::from(headers);
        self
    }
}
