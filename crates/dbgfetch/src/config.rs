//! Session configuration and process environment access.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use dbgfetch_fetch::FetchOptions;

use crate::cache::CachePolicy;
use crate::error::{Error, Result};

pub const URLS_VAR: &str = "DEBUGINFOD_URLS";
pub const CACHE_PATH_VAR: &str = "DEBUGINFOD_CACHE_PATH";
pub const TIMEOUT_VAR: &str = "DEBUGINFOD_TIMEOUT";
pub const MAXTIME_VAR: &str = "DEBUGINFOD_MAXTIME";
pub const MAXSIZE_VAR: &str = "DEBUGINFOD_MAXSIZE";

const CACHE_DIR_NAME: &str = "debuginfod_client";

/// Read access to environment variables.
pub trait Environment: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Where the server list comes from.
#[derive(Clone)]
pub enum ServerSource {
    /// A literal whitespace-separated list.
    Fixed(String),
    /// A variable, read again whenever the session refreshes its servers.
    Variable {
        name: String,
        env:  Arc<dyn Environment>,
    },
}

impl ServerSource {
    /// The current raw list; an unset variable reads as empty.
    pub fn read(&self) -> String {
        match self {
            ServerSource::Fixed(list) => list.clone(),
            ServerSource::Variable { name, env } => env.var(name).unwrap_or_default(),
        }
    }
}

impl Default for ServerSource {
    fn default() -> Self {
        ServerSource::Fixed(String::new())
    }
}

impl fmt::Debug for ServerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerSource::Fixed(list) => f.debug_tuple("Fixed").field(list).finish(),
            ServerSource::Variable { name, .. } => f.debug_struct("Variable").field("name", name).finish_non_exhaustive(),
        }
    }
}

/// Everything a [`Session`](crate::Session) needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub servers:   ServerSource,
    pub cache_dir: PathBuf,
    pub cache:     CachePolicy,
    pub fetch:     FetchOptions,
}

impl Config {
    /// A config with no servers and default policies.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            servers:   ServerSource::default(),
            cache_dir: cache_dir.into(),
            cache:     CachePolicy::default(),
            fetch:     FetchOptions::default(),
        }
    }

    #[must_use]
    pub fn servers(mut self, servers: ServerSource) -> Self {
        self.servers = servers;
        self
    }

    #[must_use]
    pub fn cache_policy(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn fetch_options(mut self, fetch: FetchOptions) -> Self {
        self.fetch = fetch;
        self
    }

    /// Build a config from `DEBUGINFOD_*` variables.
    ///
    /// The server list stays bound to `DEBUGINFOD_URLS` so a session can
    /// re-read it. Unset numeric variables keep their defaults.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when a numeric variable does not parse, or when no
    /// cache directory can be determined.
    pub fn from_env(env: Arc<dyn Environment>) -> Result<Self> {
        let cache_dir = match non_empty(env.var(CACHE_PATH_VAR)) {
            Some(path) => PathBuf::from(path),
            None => default_cache_dir(env.as_ref())?,
        };

        let mut fetch = FetchOptions::default();
        if let Some(secs) = parse_var::<u64>(env.as_ref(), TIMEOUT_VAR)? {
            fetch = fetch.transfer_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var::<u64>(env.as_ref(), MAXTIME_VAR)? {
            fetch = fetch.total_timeout((secs > 0).then(|| Duration::from_secs(secs)));
        }
        if let Some(bytes) = parse_var::<u64>(env.as_ref(), MAXSIZE_VAR)? {
            fetch = fetch.max_size((bytes > 0).then_some(bytes));
        }

        Ok(Self::new(cache_dir)
            .servers(ServerSource::Variable {
                name: URLS_VAR.to_string(),
                env,
            })
            .fetch_options(fetch))
    }
}

/// `$XDG_CACHE_HOME/debuginfod_client`, else `~/.cache/debuginfod_client`.
pub fn default_cache_dir(env: &dyn Environment) -> Result<PathBuf> {
    if let Some(xdg) = non_empty(env.var("XDG_CACHE_HOME")) {
        return Ok(PathBuf::from(xdg).join(CACHE_DIR_NAME));
    }
    let home = non_empty(env.var("HOME"))
        .map(PathBuf::from)
        .or_else(home::home_dir)
        .ok_or_else(|| Error::Config("cannot determine home directory for the cache".into()))?;
    Ok(home.join(".cache").join(CACHE_DIR_NAME))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(env: &dyn Environment, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(raw) = non_empty(env.var(name)) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e| Error::Config(format!("{name}={raw:?}: {e}")))
}
