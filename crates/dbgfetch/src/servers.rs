//! Server list parsing.

use tracing::warn;
use url::Url;

use crate::artifact::Artifact;
use crate::buildid::BuildId;

/// Ordered, de-duplicated server base URLs.
///
/// Order matters: when two servers finish in the same instant, the one
/// listed first wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerList {
    urls: Vec<String>,
}

impl ServerList {
    /// Parse a whitespace-separated list of base URLs.
    ///
    /// Tokens that are not absolute URLs are skipped with a warning; an
    /// empty or all-invalid list yields an empty `ServerList`. Trailing `/`
    /// is dropped and repeated URLs keep their first position.
    ///
    /// ```
    /// use dbgfetch::ServerList;
    ///
    /// let list = ServerList::resolve("https://a.example/ http://b.example:8002 https://a.example");
    /// assert_eq!(list.iter().collect::<Vec<_>>(), ["https://a.example", "http://b.example:8002"]);
    /// ```
    pub fn resolve(raw: &str) -> Self {
        let mut urls: Vec<String> = Vec::new();

        for token in raw.split_whitespace() {
            let parsed = match Url::parse(token) {
                Ok(url) if !url.cannot_be_a_base() => url,
                Ok(_) => {
                    warn!(server = token, "ignoring server URL that cannot be a base");
                    continue;
                }
                Err(e) => {
                    warn!(server = token, error = %e, "ignoring malformed server URL");
                    continue;
                }
            };

            let normalized = parsed.as_str().trim_end_matches('/').to_string();
            if !urls.contains(&normalized) {
                urls.push(normalized);
            }
        }

        Self { urls }
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    /// One request URL per server, in server order.
    pub fn artifact_urls(&self, id: &BuildId, artifact: &Artifact) -> Vec<String> {
        self.urls.iter().map(|base| artifact.url(base, id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(ServerList::resolve("").is_empty());
        assert!(ServerList::resolve("   \n\t ").is_empty());
    }

    #[test]
    fn test_malformed_tokens_are_skipped() {
        let list = ServerList::resolve("not-a-url http://ok.example mailto:x@y");
        assert_eq!(list.len(), 1);
        assert_eq!(list.iter().next(), Some("http://ok.example"));
    }

    #[test]
    fn test_order_is_kept() {
        let list = ServerList::resolve("http://b.example\nhttp://a.example");
        assert_eq!(list.iter().collect::<Vec<_>>(), ["http://b.example", "http://a.example"]);
    }

    #[test]
    fn test_duplicates_after_normalization() {
        let list = ServerList::resolve("http://a.example/ http://A.example http://a.example");
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_path_prefix_is_kept() {
        let list = ServerList::resolve("https://mirror.example/debuginfod/");
        let id: BuildId = "ab".parse().unwrap();
        assert_eq!(
            list.artifact_urls(&id, &Artifact::DebugInfo),
            ["https://mirror.example/debuginfod/buildid/ab/debuginfo"]
        );
    }
}
