use std::sync::atomic::{AtomicBool, Ordering};

use bytes::{Bytes, BytesMut};
use futures_util::FutureExt;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::debug;

use crate::core::{exceeds_limit, is_success};
use crate::data::{FetchOptions, Progress, ProgressSink};
use crate::effects::http::HttpClient;
use crate::error::{FailureReason, FetchError, ServerFailure};

/// Upper bound on the buffer preallocated from an announced Content-Length.
const MAX_PREALLOCATION: u64 = 8 * 1024 * 1024;

/// The body that won a race and the server it came from.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Index of the winning server in the list passed to the race.
    pub server: usize,
    pub url:    String,
    pub body:   Bytes,
}

enum Attempt {
    Failed(FailureReason),
    Cancelled,
}

/// Asks every server at once and keeps the first complete success.
///
/// All per-server requests are futures owned by the call to
/// [`RaceFetcher::race`]; they are driven together and dropped before it
/// returns, so no request outlives the call and no progress callback fires
/// after it.
pub struct RaceFetcher<C: HttpClient> {
    client:  C,
    options: FetchOptions,
}

impl<C: HttpClient> RaceFetcher<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            options: FetchOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetch the same resource from every URL, one attempt each.
    ///
    /// # Errors
    ///
    /// - [`FetchError::NoServers`] when `urls` is empty
    /// - [`FetchError::UserCancelled`] when `sink` returns `Break`
    /// - [`FetchError::AllServersFailed`] with one entry per URL otherwise
    pub async fn race(&self, urls: &[String], sink: Option<&ProgressSink>) -> Result<Fetched, FetchError> {
        if urls.is_empty() {
            return Err(FetchError::NoServers);
        }

        let cancelled = AtomicBool::new(false);
        let mut pending: FuturesUnordered<_> = urls
            .iter()
            .enumerate()
            .map(|(server, url)| {
                let cancelled = &cancelled;
                async move { (server, self.attempt(server, url, sink, cancelled).await) }
            })
            .collect();

        let mut failures = Vec::new();

        while let Some(first) = pending.next().await {
            // Everything that finished in the same poll competes on list order.
            let mut ready = vec![first];
            while let Some(Some(next)) = pending.next().now_or_never() {
                ready.push(next);
            }

            let mut winner: Option<(usize, Bytes)> = None;
            for (server, outcome) in ready {
                match outcome {
                    Ok(body) => {
                        if winner.as_ref().is_none_or(|(best, _)| server < *best) {
                            winner = Some((server, body));
                        }
                    }
                    Err(Attempt::Cancelled) => {}
                    Err(Attempt::Failed(reason)) => {
                        debug!(server, url = %urls[server], %reason, "server failed");
                        failures.push(ServerFailure {
                            url: urls[server].clone(),
                            reason,
                        });
                    }
                }
            }

            if cancelled.load(Ordering::Acquire) {
                drop(pending);
                debug!("race cancelled by progress callback");
                return Err(FetchError::UserCancelled);
            }

            if let Some((server, body)) = winner {
                drop(pending);
                debug!(server, url = %urls[server], bytes = body.len(), "race won");
                return Ok(Fetched {
                    server,
                    url: urls[server].clone(),
                    body,
                });
            }
        }

        Err(FetchError::AllServersFailed(failures))
    }

    async fn attempt(
        &self,
        server: usize,
        url: &str,
        sink: Option<&ProgressSink>,
        cancelled: &AtomicBool,
    ) -> Result<Bytes, Attempt> {
        let transfer = self.transfer(server, url, sink, cancelled);
        match self.options.timeouts.total {
            Some(limit) => tokio::time::timeout(limit, transfer)
                .await
                .unwrap_or(Err(Attempt::Failed(FailureReason::Timeout))),
            None => transfer.await,
        }
    }

    async fn transfer(
        &self,
        server: usize,
        url: &str,
        sink: Option<&ProgressSink>,
        cancelled: &AtomicBool,
    ) -> Result<Bytes, Attempt> {
        let timeouts = self.options.timeouts;
        debug!(server, url, "requesting");

        let response = match tokio::time::timeout(timeouts.connect, self.client.get(url, &self.options.headers)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(Attempt::Failed(FailureReason::Transport(e.to_string()))),
            Err(_) => return Err(Attempt::Failed(FailureReason::Timeout)),
        };

        if !is_success(response.status) {
            return Err(Attempt::Failed(FailureReason::Status(response.status)));
        }

        let total_bytes = response.content_length;
        if total_bytes.is_some_and(|len| exceeds_limit(self.options.max_size, len)) {
            return Err(self.too_large());
        }

        let capacity = total_bytes.unwrap_or(0).min(MAX_PREALLOCATION) as usize;
        let mut body = BytesMut::with_capacity(capacity);
        let mut stream = response.body;

        report(sink, cancelled, Progress {
            server,
            bytes_downloaded: 0,
            total_bytes,
        })?;

        loop {
            let chunk = match tokio::time::timeout(timeouts.idle, stream.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => return Err(Attempt::Failed(FailureReason::Transport(e.to_string()))),
                Ok(None) => break,
                Err(_) => return Err(Attempt::Failed(FailureReason::Timeout)),
            };
            if chunk.is_empty() {
                continue;
            }

            body.extend_from_slice(&chunk);
            if exceeds_limit(self.options.max_size, body.len() as u64) {
                return Err(self.too_large());
            }

            report(sink, cancelled, Progress {
                server,
                bytes_downloaded: body.len() as u64,
                total_bytes,
            })?;
        }

        Ok(body.freeze())
    }

    fn too_large(&self) -> Attempt {
        Attempt::Failed(FailureReason::TooLarge {
            limit: self.options.max_size.unwrap_or_default(),
        })
    }
}

/// Forward `progress` unless the race has already been cancelled.
fn report(sink: Option<&ProgressSink>, cancelled: &AtomicBool, progress: Progress) -> Result<(), Attempt> {
    let Some(sink) = sink else {
        return Ok(());
    };
    if cancelled.load(Ordering::Acquire) {
        return Err(Attempt::Cancelled);
    }
    if sink.report(&progress).is_break() {
        cancelled.store(true, Ordering::Release);
        return Err(Attempt::Cancelled);
    }
    Ok(())
}
