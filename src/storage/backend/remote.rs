//! Remote object store backend
//!
//! Talks plain HTTP to a path-style object store:
//!
//! ```text
//! PUT    {endpoint}/{bucket}/a9/99/a9993e36...   store
//! GET    {endpoint}/{bucket}/a9/99/a9993e36...   fetch
//! HEAD   {endpoint}/{bucket}/a9/99/a9993e36...   exists + Content-Length
//! DELETE {endpoint}/{bucket}/a9/99/a9993e36...   remove
//! ```
//!
//! The bucket is the pool's namespace key. Requests carry the configured
//! credentials as HTTP basic auth. The blocking client owns its own
//! connection pool and is shared by every worker thread; it is created on
//! first use so it is always built on a worker thread.

use super::BlobBackend;
use crate::error::{PoolError, Result};
use crate::infrastructure::config::{BackendConnection, Credentials, Provider};
use crate::storage::StorageKey;
use bytes::Bytes;
use once_cell::sync::OnceCell;
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_LENGTH;
use reqwest::StatusCode;
use std::fmt;
use std::io::Read;
use std::time::Duration;
use tracing::debug;

pub struct RemoteBackend {
    endpoint: String,
    bucket: String,
    credentials: Credentials,
    timeout: Duration,
    client: OnceCell<Client>,
}

impl fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("credentials", &self.credentials)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RemoteBackend {
    pub fn new(connection: &BackendConnection, bucket: &str) -> Result<Self> {
        connection.validate_profile()?;

        let endpoint = connection
            .endpoint
            .as_deref()
            .ok_or_else(|| PoolError::configuration("remote provider requires an endpoint"))?
            .trim_end_matches('/')
            .to_string();
        let credentials = connection
            .credentials
            .clone()
            .ok_or_else(|| PoolError::configuration("remote provider requires credentials"))?;

        Ok(Self {
            endpoint,
            bucket: bucket.to_string(),
            credentials,
            timeout: Duration::from_secs(connection.request_timeout_seconds),
            client: OnceCell::new(),
        })
    }

    /// Full URL of an entry
    pub fn object_url(&self, key: &StorageKey) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key.object_name())
    }

    fn client(&self) -> Result<&Client> {
        self.client.get_or_try_init(|| {
            Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| PoolError::configuration(format!("cannot build HTTP client: {}", e)))
        })
    }

    fn send(
        &self,
        key: &StorageKey,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<Response> {
        request
            .basic_auth(
                &self.credentials.access_key_id,
                Some(&self.credentials.secret_access_key),
            )
            .send()
            .map_err(|e| transport_error(key, e))
    }
}

fn transport_error(key: &StorageKey, e: reqwest::Error) -> PoolError {
    PoolError::backend_unavailable(format!("request failed: {}", e), Some(key.to_string()))
}

/// Map a non-success status to the pool's error taxonomy
fn status_error(key: &StorageKey, status: StatusCode) -> PoolError {
    if status == StatusCode::NOT_FOUND {
        PoolError::not_found(key.to_string())
    } else if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        PoolError::backend_unavailable(format!("object store returned {}", status), Some(key.to_string()))
    } else {
        PoolError::BackendRejected {
            status: status.as_u16(),
            key: key.to_string(),
        }
    }
}

impl BlobBackend for RemoteBackend {
    fn provider(&self) -> Provider {
        Provider::Remote
    }

    fn put(&self, key: &StorageKey, content: &mut dyn Read) -> Result<u64> {
        // Content is already bounded by the pool's size gate
        let mut body = Vec::new();
        content.read_to_end(&mut body)?;
        let written = body.len() as u64;

        let client = self.client()?;
        let response = self.send(key, client.put(self.object_url(key)).body(body))?;
        if !response.status().is_success() {
            return Err(status_error(key, response.status()));
        }

        debug!(key = %key, bytes = written, "Uploaded object");
        Ok(written)
    }

    fn get(&self, key: &StorageKey) -> Result<Bytes> {
        let client = self.client()?;
        let response = self.send(key, client.get(self.object_url(key)))?;
        if !response.status().is_success() {
            return Err(status_error(key, response.status()));
        }
        response.bytes().map_err(|e| transport_error(key, e))
    }

    fn exists(&self, key: &StorageKey) -> Result<Option<u64>> {
        let client = self.client()?;
        let response = self.send(key, client.head(self.object_url(key)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let size = response
                    .headers()
                    .get(CONTENT_LENGTH)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .ok_or_else(|| {
                        PoolError::backend_unavailable(
                            "object store omitted Content-Length",
                            Some(key.to_string()),
                        )
                    })?;
                Ok(Some(size))
            }
            status => Err(status_error(key, status)),
        }
    }

    fn delete(&self, key: &StorageKey) -> Result<()> {
        let client = self.client()?;
        let response = self.send(key, client.delete(self.object_url(key)))?;
        if !response.status().is_success() {
            return Err(status_error(key, response.status()));
        }
        Ok(())
    }
}
