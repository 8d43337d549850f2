use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::Stream;

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Status line, announced length and body of one GET.
pub struct HttpResponse<E> {
    pub status:         u16,
    /// Content-Length, when the server sent one.
    pub content_length: Option<u64>,
    pub body:           BoxStream<'static, Result<Bytes, E>>,
}

/// Asynchronous HTTP client abstraction.
///
/// This trait provides the minimal interface the coordinator needs.
/// Implementations follow redirects themselves and must not turn non-2xx
/// statuses into errors: the status is reported in [`HttpResponse`] and the
/// coordinator decides. Dropping the returned future or body stream must
/// abandon the connection.
///
/// # Implementations
///
/// - [`ReqwestClient`]: Production implementation using `reqwest`
/// - Mock implementations for testing
pub trait HttpClient: Send + Sync {
    /// Error type for HTTP operations.
    type Error: std::error::Error + Send + 'static;

    /// Send a GET and return once the response headers are in.
    ///
    /// # Errors
    ///
    /// Returns an error for DNS, connection or protocol failures.
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<HttpResponse<Self::Error>, Self::Error>> + Send;
}

impl<C: HttpClient> HttpClient for Arc<C> {
    type Error = C::Error;

    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<HttpResponse<Self::Error>, Self::Error>> + Send {
        (**self).get(url, headers)
    }
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;
    use crate::Timeouts;

    /// Production HTTP client implementation using reqwest.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        /// Create a new ReqwestClient with default timeouts.
        pub fn new() -> Result<Self, reqwest::Error> {
            Self::with_timeouts(&Timeouts::default())
        }

        /// Create a client whose connection setup is bounded by `timeouts.connect`.
        ///
        /// Idle and total limits are enforced by the coordinator, not here.
        pub fn with_timeouts(timeouts: &Timeouts) -> Result<Self, reqwest::Error> {
            let client = reqwest::Client::builder()
                .connect_timeout(timeouts.connect)
                .user_agent(concat!("dbgfetch/", env!("CARGO_PKG_VERSION")))
                .build()?;
            Ok(Self { client })
        }
    }

    impl HttpClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn get(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> Result<HttpResponse<Self::Error>, Self::Error> {
            let mut request = self.client.get(url);

            for (key, value) in headers {
                request = request.header(key.as_str(), value.as_str());
            }

            let response = request.send().await?;
            let status = response.status().as_u16();
            let content_length = response.content_length();

            Ok(HttpResponse {
                status,
                content_length,
                body: Box::pin(response.bytes_stream()),
            })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
