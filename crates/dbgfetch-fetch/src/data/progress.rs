use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

/// A snapshot of one server's transfer.
///
/// Within one server's attempt, `bytes_downloaded` never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Index of the server in the list passed to the race.
    pub server: usize,

    /// Body bytes received so far.
    pub bytes_downloaded: u64,

    /// Total expected bytes, if known from Content-Length.
    ///
    /// `None` means the server did not say, which is not the same as an
    /// empty artifact.
    pub total_bytes: Option<u64>,
}

impl Progress {
    /// Calculate the percentage of completion.
    ///
    /// Returns `None` if `total_bytes` is unknown.
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.bytes_downloaded as f64 / total as f64) * 100.0
            }
        })
    }
}

type Callback = dyn Fn(&Progress) -> ControlFlow<()> + Send + Sync;

/// Caller-supplied progress callback.
///
/// Invoked once when a server's response headers arrive and once per
/// received chunk. Returning [`ControlFlow::Break`] cancels the whole race.
///
/// # Examples
///
/// ```
/// use dbgfetch_fetch::{Progress, ProgressSink};
/// use std::ops::ControlFlow;
///
/// let sink = ProgressSink::new(|progress: &Progress| {
///     if progress.bytes_downloaded > 1 << 30 {
///         ControlFlow::Break(())
///     } else {
///         ControlFlow::Continue(())
///     }
/// });
/// let progress = Progress { server: 0, bytes_downloaded: 10, total_bytes: None };
/// assert!(sink.report(&progress).is_continue());
/// ```
#[derive(Clone)]
pub struct ProgressSink {
    callback: Arc<Callback>,
}

impl ProgressSink {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Progress) -> ControlFlow<()> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    pub fn report(&self, progress: &Progress) -> ControlFlow<()> {
        (self.callback)(progress)
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink")
            .field("callback", &"{ ... }")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_percentage() {
        let progress = Progress {
            server:           0,
            bytes_downloaded: 25,
            total_bytes:      Some(100),
        };
        assert_eq!(progress.percentage(), Some(25.0));
    }

    #[test]
    fn test_percentage_unknown_total() {
        let progress = Progress {
            server:           2,
            bytes_downloaded: 25,
            total_bytes:      None,
        };
        assert_eq!(progress.percentage(), None);
    }

    #[test]
    fn test_percentage_empty_artifact() {
        let progress = Progress {
            server:           0,
            bytes_downloaded: 0,
            total_bytes:      Some(0),
        };
        assert_eq!(progress.percentage(), Some(100.0));
    }

    #[test]
    fn test_sink_forwards_and_cancels() {
        let seen = Arc::new(AtomicU64::new(0));
        let counter = seen.clone();
        let sink = ProgressSink::new(move |p| {
            counter.store(p.bytes_downloaded, Ordering::SeqCst);
            if p.bytes_downloaded >= 100 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        let mut progress = Progress {
            server:           0,
            bytes_downloaded: 50,
            total_bytes:      None,
        };
        assert!(sink.report(&progress).is_continue());
        progress.bytes_downloaded = 100;
        assert!(sink.report(&progress).is_break());
        assert_eq!(seen.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_sink_debug() {
        let sink = ProgressSink::new(|_| ControlFlow::Continue(()));
        assert!(format!("{sink:?}").contains("ProgressSink"));
    }
}
