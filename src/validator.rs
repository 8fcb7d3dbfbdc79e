//! The rating cycle: join a point-in-time binding snapshot with a fresh
//! telemetry window, then score every bound hotkey.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::database::{BindingStore, StoreError};
use crate::error::RemoteError;
use crate::rating::RatingCalculator;
use crate::telemetry::{MinerMetrics, TelemetrySource};

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Validator {
    store: Arc<dyn BindingStore>,
    telemetry: Arc<dyn TelemetrySource>,
    calculator: RatingCalculator,
    window: Duration,
}

impl Validator {
    pub fn new(
        store: Arc<dyn BindingStore>,
        telemetry: Arc<dyn TelemetrySource>,
        calculator: RatingCalculator,
        window: Duration,
    ) -> Self {
        Self {
            store,
            telemetry,
            calculator,
            window,
        }
    }

    /// Group the window's telemetry by the hotkey owning each worker.
    ///
    /// Every bound hotkey appears in the result, with an empty metrics list
    /// when none of its workers reported; telemetry for workers nobody has
    /// bound is dropped. The result is ordered (and each hotkey's workers
    /// sorted) so downstream scoring is reproducible.
    pub async fn hotkey_metrics(
        &self,
    ) -> Result<BTreeMap<String, Vec<MinerMetrics>>, ValidatorError> {
        let snapshot = self.store.snapshot().await?;
        let telemetry = self.telemetry.fetch_window(self.window).await?;

        let mut grouped: BTreeMap<String, Vec<MinerMetrics>> = BTreeMap::new();
        for hotkey in snapshot.values() {
            grouped.entry(hotkey.clone()).or_default();
        }

        let mut samples: Vec<_> = telemetry.into_iter().collect();
        samples.sort_by(|(a, _), (b, _)| a.worker.cmp(&b.worker).then_with(|| a.wallet.cmp(&b.wallet)));

        let mut unbound = 0usize;
        for (key, metrics) in samples {
            match snapshot.get(&key.worker) {
                Some(hotkey) => grouped.entry(hotkey.clone()).or_default().push(metrics),
                None => unbound += 1,
            }
        }
        if unbound > 0 {
            debug!(unbound, "telemetry samples without a binding were dropped");
        }

        Ok(grouped)
    }

    /// One full rating cycle: one score in [0.0, 1.0] per bound hotkey.
    pub async fn compute_ratings(&self) -> Result<BTreeMap<String, f64>, ValidatorError> {
        let metrics = self.hotkey_metrics().await?;
        Ok(self.calculator.rate_all(&metrics))
    }
}
