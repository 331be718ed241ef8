//! Remote cover image retrieval.

use bytes::{Bytes, BytesMut};
use futures::{FutureExt, future::BoxFuture};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Upper bound on a single remote image download.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_FILENAME: &str = "image.jpg";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to `{url}` failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("`{url}` answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("`{url}` is larger than {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

pub trait ImageFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>>;
}

/// `reqwest` fetcher. The timeout covers connect, headers and body, and no
/// more than `max_bytes` of body is ever buffered.
#[derive(Clone, Debug)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new(max_bytes: usize) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self { client, max_bytes })
    }

    async fn download(&self, url: &str) -> Result<Bytes, FetchError> {
        let request_failed = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        };

        let mut response = self.client.get(url).send().await.map_err(request_failed)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(too_large());
        }

        // Content-Length may be absent or wrong; count what actually arrives.
        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(request_failed)? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        self.download(url).boxed()
    }
}

/// Last path segment of `url`, or `image.jpg` when there is none.
pub fn filename_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    /// Answer a single GET with `status` and `body`, returning the URL to hit.
    async fn serve_once(status: &'static str, body: Vec<u8>, declare_length: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;

            let head = if declare_length {
                format!("HTTP/1.1 {}\r\nContent-Length: {}\r\n\r\n", status, body.len())
            } else {
                format!("HTTP/1.1 {}\r\nConnection: close\r\n\r\n", status)
            };
            // the client may hang up early once it has seen enough
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}/covers/dune.jpg", addr)
    }

    #[test]
    fn filename_is_last_path_segment() {
        assert_eq!(filename_from_url("http://example.com/cover.jpg"), "cover.jpg");
        assert_eq!(
            filename_from_url("https://cdn.example.com/a/b/dune.png?size=large#top"),
            "dune.png"
        );
    }

    #[test]
    fn filename_falls_back_when_path_is_empty() {
        assert_eq!(filename_from_url("http://example.com"), "image.jpg");
        assert_eq!(filename_from_url("http://example.com/covers/"), "image.jpg");
        assert_eq!(filename_from_url("not a url"), "image.jpg");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_request_error() {
        let fetcher = HttpImageFetcher::new(1024).unwrap();
        let err = fetcher
            .fetch("http://127.0.0.1:1/cover.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }

    #[tokio::test]
    async fn body_within_limit_is_returned() {
        let url = serve_once("200 OK", b"jpeg-bytes".to_vec(), true).await;
        let fetcher = HttpImageFetcher::new(1024).unwrap();

        let data = fetcher.fetch(&url).await.unwrap();
        assert_eq!(&data[..], b"jpeg-bytes");
    }

    #[tokio::test]
    async fn declared_length_over_limit_is_refused() {
        let url = serve_once("200 OK", vec![0u8; 64], true).await;
        let fetcher = HttpImageFetcher::new(16).unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 16, .. }));
    }

    #[tokio::test]
    async fn undeclared_body_is_cut_off_at_limit() {
        let url = serve_once("200 OK", vec![0u8; 64], false).await;
        let fetcher = HttpImageFetcher::new(16).unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 16, .. }));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let url = serve_once("404 Not Found", Vec::new(), true).await;
        let fetcher = HttpImageFetcher::new(1024).unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }
}
