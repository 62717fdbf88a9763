use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{Result, TestLensError};

use super::{ObjectStore, StoredObject};

const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
const METADATA_PREFIXES: [&str; 2] = ["x-goog-meta-", "x-amz-meta-"];

/// Object store read over plain HTTP: `GET {base}/{bucket}/{path}`.
///
/// Works against GCS/S3 style endpoints that expose user metadata as
/// `x-goog-meta-*` or `x-amz-meta-*` response headers.
pub struct HttpObjectStore {
    client: Client,
    base_url: Url,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpObjectStore {
    /// # Errors
    ///
    /// Returns `TestLensError::Config` if the client cannot be built or
    /// `base_url` cannot hold path segments.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("testlens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TestLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| TestLensError::Config(format!("Invalid storage base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TestLensError::Config(format!(
                "Invalid storage base URL: {base_url}"
            )));
        }

        Ok(Self {
            client,
            base_url,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    fn object_url(&self, bucket: &str, path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                TestLensError::Config(format!("Invalid storage base URL: {}", self.base_url))
            })?
            .pop_if_empty()
            .push(bucket)
            .extend(path.split('/'));
        Ok(url)
    }
}

fn user_metadata(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let key = METADATA_PREFIXES
                .iter()
                .find_map(|prefix| name.as_str().strip_prefix(prefix))?;
            let value = value.to_str().ok()?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn read_file(&self, bucket: &str, path: &str) -> Result<StoredObject> {
        let url = self.object_url(bucket, path)?;
        debug!("GET {url}");

        let mut retry_count = 0;
        loop {
            let response = match self.client.get(url.clone()).send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    if retry_count >= self.max_retries {
                        return Err(e.into());
                    }
                    warn!(
                        "Network error ({e}), retrying in {:?} ({}/{})...",
                        self.retry_delay,
                        retry_count + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == StatusCode::NOT_FOUND {
                return Err(TestLensError::NotFound {
                    bucket: bucket.to_string(),
                    path: path.to_string(),
                });
            }

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if retry_count >= self.max_retries {
                    return Err(TestLensError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: self.max_retries,
                    });
                }

                warn!(
                    "Storage API error (status {status}). Waiting {:?} before retry {}/{}...",
                    self.retry_delay,
                    retry_count + 1,
                    self.max_retries
                );

                tokio::time::sleep(self.retry_delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(TestLensError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                });
            }

            let metadata = user_metadata(response.headers());
            let data = response.bytes().await?.to_vec();

            return Ok(StoredObject { data, metadata });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn store(server: &mockito::ServerGuard) -> HttpObjectStore {
        HttpObjectStore::new(&server.url())
            .unwrap()
            .with_retries(2, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn reads_body_and_metadata_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/archive/test_analytics/repo_rollups/42.arrow")
            .with_status(200)
            .with_header("x-goog-meta-version", "1")
            .with_header("x-amz-meta-writer", "rollup-job")
            .with_header("content-type", "application/octet-stream")
            .with_body("payload")
            .create_async()
            .await;

        let object = assert_ok!(
            store(&server)
                .read_file("archive", "test_analytics/repo_rollups/42.arrow")
                .await
        );

        mock.assert_async().await;
        assert_eq!(object.data, b"payload");
        assert_eq!(object.metadata.get("version").map(String::as_str), Some("1"));
        assert_eq!(
            object.metadata.get("writer").map(String::as_str),
            Some("rollup-job")
        );
        assert_eq!(object.metadata.len(), 2);
    }

    #[tokio::test]
    async fn not_found_is_distinguishable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/archive/test_results/rollups/1/main/7")
            .with_status(404)
            .create_async()
            .await;

        let error = assert_err!(
            store(&server)
                .read_file("archive", "test_results/rollups/1/main/7")
                .await
        );
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn retries_server_errors_then_gives_up() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/archive/key")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let error = assert_err!(store(&server).read_file("archive", "key").await);

        mock.assert_async().await;
        assert!(matches!(
            error,
            TestLensError::ApiErrorAfterRetries {
                status: 503,
                retries: 2
            }
        ));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/archive/key")
            .with_status(403)
            .with_body("access denied")
            .expect(1)
            .create_async()
            .await;

        let error = assert_err!(store(&server).read_file("archive", "key").await);

        mock.assert_async().await;
        match error {
            TestLensError::ApiError { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "access denied");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn base_path_is_preserved() {
        let store = HttpObjectStore::new("https://storage.example.com/objects/").unwrap();
        let url = store.object_url("archive", "test_results/rollups/1/main/7").unwrap();

        assert_eq!(
            url.as_str(),
            "https://storage.example.com/objects/archive/test_results/rollups/1/main/7"
        );
    }

    #[test]
    fn object_url_without_trailing_slash() {
        let store = HttpObjectStore::new("https://storage.example.com/objects").unwrap();
        let url = store.object_url("archive", "test_analytics/repo_rollups/42.arrow").unwrap();

        assert_eq!(
            url.as_str(),
            "https://storage.example.com/objects/archive/test_analytics/repo_rollups/42.arrow"
        );
    }

    #[test]
    fn rejects_base_urls_without_a_path() {
        let result = HttpObjectStore::new("mailto:storage@example.com");
        assert!(matches!(result, Err(TestLensError::Config(_))));
    }
}
