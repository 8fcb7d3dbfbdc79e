//! Prometheus HTTP API adapter.
//!
//! Issues the five label-matched aggregation queries the pool's stratum
//! bridge exporter supports, keyed by `(wallet, worker)`, and joins the
//! results into one [`MinerMetrics`] snapshot per worker. Only query
//! strings and response parsing live here; the query language itself is the
//! backend's business.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::RemoteError;
use crate::telemetry::{MinerKey, MinerMetrics, TelemetrySource};

pub struct PrometheusClient {
    endpoint: String,
    /// Metric-name prefix of the exporter, e.g. `pool` for
    /// `pool_valid_share_counter`.
    namespace: String,
    client: reqwest::Client,
    /// When set, samples for other wallets are dropped: a validator attests
    /// for one pool, and only that pool's payout wallet is trusted.
    pool_wallet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    data: QueryData,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<QuerySample>,
}

#[derive(Debug, Deserialize)]
struct QuerySample {
    metric: HashMap<String, String>,
    /// Prometheus instant vectors carry `[timestamp, "value"]`.
    value: (f64, String),
}

impl PrometheusClient {
    pub fn new(
        endpoint: &str,
        namespace: &str,
        timeout: Duration,
        pool_wallet: Option<String>,
    ) -> Result<Self, RemoteError> {
        url::Url::parse(endpoint)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            namespace: namespace.to_string(),
            client,
            pool_wallet,
        })
    }

    async fn fetch_metric(&self, query: &str) -> Result<HashMap<MinerKey, f64>, RemoteError> {
        let url = format!("{}/api/v1/query", self.endpoint);
        let response: QueryResponse = self
            .client
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut result = HashMap::new();
        for sample in response.data.result {
            let (Some(wallet), Some(worker)) =
                (sample.metric.get("wallet"), sample.metric.get("worker"))
            else {
                continue;
            };
            let value: f64 = sample.value.1.parse().map_err(|_| {
                RemoteError::BadResponse(format!("non-numeric sample value: {}", sample.value.1))
            })?;
            result.insert(
                MinerKey {
                    wallet: wallet.clone(),
                    worker: worker.clone(),
                },
                value,
            );
        }
        Ok(result)
    }

    fn valid_shares_query(&self, resolution: &str) -> String {
        format!(
            "sum(increase({}_valid_share_counter[{resolution}])) by (wallet, worker)",
            self.namespace
        )
    }

    fn invalid_shares_query(&self, resolution: &str) -> String {
        format!(
            "sum(increase({}_invalid_share_counter[{resolution}])) by (wallet, worker)",
            self.namespace
        )
    }

    fn difficulty_query(&self, resolution: &str) -> String {
        format!(
            "max(max_over_time({}_share_difficulty[{resolution}])) by (wallet, worker)",
            self.namespace
        )
    }

    fn hashrate_query(&self, resolution: &str) -> String {
        format!(
            "avg(avg_over_time({}_worker_hashrate[{resolution}])) by (wallet, worker)",
            self.namespace
        )
    }

    fn uptime_query(&self, resolution: &str) -> String {
        format!(
            "sum(increase({}_worker_uptime_seconds[{resolution}])) by (wallet, worker)",
            self.namespace
        )
    }
}

#[async_trait]
impl TelemetrySource for PrometheusClient {
    async fn fetch_window(
        &self,
        window: Duration,
    ) -> Result<HashMap<MinerKey, MinerMetrics>, RemoteError> {
        let resolution = format!("{}s", window.as_secs());

        let valid_query = self.valid_shares_query(&resolution);
        let invalid_query = self.invalid_shares_query(&resolution);
        let difficulty_query = self.difficulty_query(&resolution);
        let hashrate_query = self.hashrate_query(&resolution);
        let uptime_query = self.uptime_query(&resolution);

        let (valid, invalid, difficulty, hashrate, uptime) = tokio::try_join!(
            self.fetch_metric(&valid_query),
            self.fetch_metric(&invalid_query),
            self.fetch_metric(&difficulty_query),
            self.fetch_metric(&hashrate_query),
            self.fetch_metric(&uptime_query),
        )?;

        let mut result = HashMap::new();
        for (key, valid_shares) in valid {
            if let Some(pool_wallet) = &self.pool_wallet {
                if key.wallet != *pool_wallet {
                    continue;
                }
            }
            let metrics = MinerMetrics {
                uptime_seconds: uptime.get(&key).copied().unwrap_or(0.0),
                valid_shares: valid_shares.max(0.0) as u64,
                invalid_shares: invalid.get(&key).copied().unwrap_or(0.0).max(0.0) as u64,
                difficulty: difficulty.get(&key).copied().unwrap_or(0.0),
                hashrate: hashrate.get(&key).copied(),
            };
            if !metrics.is_well_formed() {
                warn!(
                    wallet = %key.wallet,
                    worker = %key.worker,
                    "dropping malformed telemetry sample"
                );
                continue;
            }
            result.insert(key, metrics);
        }
        Ok(result)
    }
}
