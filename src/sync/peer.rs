//! Remote peer registries, read-only from this node's perspective.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::registry::Binding;

/// A peer validator's paginated binding listing.
///
/// `page_number` is 1-based and indexes into the ordering of bindings with
/// `registration_time > since_timestamp`, ascending, `worker` tie-break.
#[async_trait]
pub trait PeerRegistry: Send + Sync {
    /// Stable identifier for logging and watermark bookkeeping.
    fn label(&self) -> &str;

    async fn list_bindings(
        &self,
        since_timestamp: i64,
        page_size: u32,
        page_number: u32,
    ) -> Result<Vec<Binding>, RemoteError>;
}

/// HTTP implementation speaking the `/bindings` endpoint every validator
/// exposes. Each call is bounded by the client timeout; a slow or dead peer
/// costs one sync pass, not the process.
pub struct HttpPeerRegistry {
    base_url: String,
    client: reqwest::Client,
}

impl HttpPeerRegistry {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        url::Url::parse(base_url)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl PeerRegistry for HttpPeerRegistry {
    fn label(&self) -> &str {
        &self.base_url
    }

    async fn list_bindings(
        &self,
        since_timestamp: i64,
        page_size: u32,
        page_number: u32,
    ) -> Result<Vec<Binding>, RemoteError> {
        let url = format!("{}/bindings", self.base_url);
        let bindings = self
            .client
            .get(&url)
            .query(&[
                ("since_timestamp", since_timestamp.to_string()),
                ("page_size", page_size.to_string()),
                ("page_number", page_number.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(bindings)
    }
}
