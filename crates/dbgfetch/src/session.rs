use std::path::PathBuf;

use dbgfetch_fetch::{HttpClient, ProgressSink, RaceFetcher};
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::artifact::Artifact;
use crate::buildid::BuildId;
use crate::cache::{CacheStore, WriteOutcome};
use crate::config::{Config, ServerSource};
use crate::error::{Error, Result};
use crate::servers::ServerList;

#[cfg(feature = "reqwest")]
use dbgfetch_fetch::ReqwestClient;

/// A lookup context: server list, cache and progress sink.
///
/// Lookups borrow the session, so several may run at once; keys that differ
/// proceed in parallel and equal keys serialize on the cache lock.
pub struct Session<C: HttpClient> {
    source:   ServerSource,
    servers:  OnceCell<ServerList>,
    cache:    CacheStore,
    fetcher:  RaceFetcher<C>,
    progress: Option<ProgressSink>,
}

#[cfg(feature = "reqwest")]
impl Session<ReqwestClient> {
    /// Start a session that talks HTTP(S) through `reqwest`.
    ///
    /// # Errors
    ///
    /// [`Error::Client`] when the HTTP client cannot be built.
    pub fn begin(config: Config) -> Result<Self> {
        let client = ReqwestClient::with_timeouts(&config.fetch.timeouts).map_err(|e| Error::Client(e.to_string()))?;
        Ok(Self::with_client(config, client))
    }
}

impl<C: HttpClient> Session<C> {
    pub fn with_client(config: Config, client: C) -> Self {
        let cache = CacheStore::new(config.cache_dir, config.cache);

        if let (Some(interval), Some(max_unused)) = (cache.policy().clean_interval, cache.policy().max_unused_age) {
            if let Err(e) = cache.maybe_clean(interval, max_unused) {
                warn!(error = %e, "cache cleaning failed");
            }
        }

        debug!(cache = %cache.root().display(), servers = ?config.servers, "session started");
        Self {
            source: config.servers,
            servers: OnceCell::new(),
            cache,
            fetcher: RaceFetcher::new(client).with_options(config.fetch),
            progress: None,
        }
    }

    /// Install, replace or remove the progress sink used by later lookups.
    pub fn set_progress(&mut self, sink: Option<ProgressSink>) {
        self.progress = sink;
    }

    /// Forget the server list so the next lookup reads its source again.
    pub fn refresh_servers(&mut self) {
        self.servers = OnceCell::new();
    }

    /// The server list, read from its source on first use.
    pub fn servers(&self) -> &ServerList {
        self.servers.get_or_init(|| ServerList::resolve(&self.source.read()))
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub async fn find_debuginfo(&self, id: &BuildId) -> Result<PathBuf> {
        self.lookup(&Artifact::DebugInfo, id).await
    }

    pub async fn find_executable(&self, id: &BuildId) -> Result<PathBuf> {
        self.lookup(&Artifact::Executable, id).await
    }

    pub async fn find_source(&self, id: &BuildId, filename: &str) -> Result<PathBuf> {
        let artifact = Artifact::source(filename)?;
        self.lookup(&artifact, id).await
    }

    /// [`Session::find_debuginfo`] for a build-id in [`BuildId::normalize`] form.
    pub async fn find_debuginfo_raw(&self, raw: &[u8], len: isize) -> Result<PathBuf> {
        self.find_debuginfo(&BuildId::normalize(raw, len)?).await
    }

    pub async fn find_executable_raw(&self, raw: &[u8], len: isize) -> Result<PathBuf> {
        self.find_executable(&BuildId::normalize(raw, len)?).await
    }

    pub async fn find_source_raw(&self, raw: &[u8], len: isize, filename: &str) -> Result<PathBuf> {
        self.find_source(&BuildId::normalize(raw, len)?, filename).await
    }

    /// Resolve `artifact` for `id` to a complete local file.
    ///
    /// A cache hit returns without any network traffic. On a miss the
    /// artifact is raced across all servers and the winner is committed to
    /// the cache. Dropping the returned future cancels in-flight requests
    /// and releases the cache lock.
    ///
    /// # Errors
    ///
    /// - [`Error::NoServersConfigured`] on a miss with an empty server list
    /// - [`Error::AllServersFailed`] or [`Error::UserCancelled`] from the race
    /// - [`Error::CacheUnwritable`] or [`Error::LockTimeout`] from the cache
    pub async fn lookup(&self, artifact: &Artifact, id: &BuildId) -> Result<PathBuf> {
        if let Some(entry) = self.cache.check(artifact, id) {
            debug!(%id, %artifact, path = %entry.path.display(), "cache hit");
            return Ok(entry.path);
        }

        let servers = self.servers();
        if servers.is_empty() {
            return Err(Error::NoServersConfigured);
        }
        debug!(%id, %artifact, servers = servers.len(), "cache miss");

        let handle = match self.cache.begin_write(artifact, id).await? {
            WriteOutcome::Cached(entry) => return Ok(entry.path),
            WriteOutcome::Write(handle) => handle,
        };

        let urls = servers.artifact_urls(id, artifact);
        match self.fetcher.race(&urls, self.progress.as_ref()).await {
            Ok(fetched) => {
                let entry = self.cache.commit(handle, fetched.body).await?;
                info!(%id, %artifact, url = %fetched.url, bytes = entry.size, "fetched");
                Ok(entry.path)
            }
            Err(e) => {
                self.cache.abort(handle);
                Err(e.into())
            }
        }
    }

    /// Close the session.
    pub fn end(self) {
        debug!(cache = %self.cache.root().display(), "session ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use bytes::Bytes;
    use dbgfetch_fetch::{BoxStream, HttpResponse};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[derive(Debug)]
    struct Refused;

    impl std::fmt::Display for Refused {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("connection refused")
        }
    }

    impl std::error::Error for Refused {}

    /// Answers every URL with the same body.
    #[derive(Default)]
    struct Echo {
        requests: AtomicUsize,
    }

    impl HttpClient for Echo {
        type Error = Refused;

        async fn get(&self, url: &str, _headers: &[(String, String)]) -> std::result::Result<HttpResponse<Refused>, Refused> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let body = Bytes::from(url.to_string());
            let stream: BoxStream<'static, std::result::Result<Bytes, Refused>> =
                Box::pin(futures_util::stream::iter([Ok(body)]));
            Ok(HttpResponse {
                status: 200,
                content_length: None,
                body: stream,
            })
        }
    }

    fn id() -> BuildId {
        "abcdef".parse().unwrap()
    }

    #[tokio::test]
    async fn test_source_lookup_writes_escaped_entry() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path()).servers(ServerSource::Fixed("http://srv".into()));
        let client = Arc::new(Echo::default());
        let session = Session::with_client(config, client.clone());

        let path = session.find_source(&id(), "/usr/src/a b.c").await.unwrap();
        assert_eq!(path, dir.path().join("abcdef").join("source-#usr#src#a b.c"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "http://srv/buildid/abcdef/source/usr/src/a%20b.c"
        );
        assert_eq!(client.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_filename_makes_no_request() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path()).servers(ServerSource::Fixed("http://srv".into()));
        let client = Arc::new(Echo::default());
        let session = Session::with_client(config, client.clone());

        let result = session.find_source(&id(), "").await;
        assert!(matches!(result, Err(Error::InvalidFilename(_))));
        assert_eq!(client.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_raw_lookup_rejects_bad_id() {
        let dir = tempdir().unwrap();
        let session = Session::with_client(Config::new(dir.path()), Echo::default());
        let result = session.find_executable_raw(b"xyz", 0).await;
        assert!(matches!(result, Err(Error::InvalidBuildId(_))));
    }

    #[test]
    fn test_servers_snapshot_is_lazy() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path()).servers(ServerSource::Fixed("http://a http://b".into()));
        let session = Session::with_client(config, Echo::default());
        assert!(session.servers.get().is_none());
        assert_eq!(session.servers().len(), 2);
        assert!(session.servers.get().is_some());
    }
}
