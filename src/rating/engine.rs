//! Normalized reputation scoring.
//!
//! Per worker, effective work is `valid_shares * min(difficulty,
//! max_difficulty)` damped by two exponential penalties: one for submitting
//! shares faster than the pool-wide rate ceiling allows, one for anomalous
//! difficulty values. Per hotkey, work sums over its workers, is normalized
//! against the best hotkey of the cycle, and is dampened by average
//! fractional uptime raised to `uptime_alpha`. Scores land in [0.0, 1.0].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::telemetry::MinerMetrics;

/// Scoring parameters, read-only for the engine's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingConfig {
    /// Exponent applied to average fractional uptime.
    pub uptime_alpha: f64,
    /// Length of the telemetry window in seconds.
    pub window_seconds: f64,
    /// Difficulty ceiling; values above it are clamped and penalized.
    pub max_difficulty: f64,
    /// Share-rate ceiling used to derive the allowed shares per window.
    pub shares_per_minute: u64,
    /// Decimal places of the emitted scores.
    pub ndigits: u32,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            uptime_alpha: 2.0,
            window_seconds: 3600.0,
            max_difficulty: 16384.0,
            shares_per_minute: 20,
            ndigits: 8,
        }
    }
}

pub struct RatingCalculator {
    config: RatingConfig,
}

impl RatingCalculator {
    pub fn new(config: RatingConfig) -> Self {
        Self { config }
    }

    fn allowed_shares(&self) -> f64 {
        (self.config.window_seconds / 60.0) * self.config.shares_per_minute as f64
    }

    /// In (0, 1]: 1 at or below the allowed rate, exponentially damped above.
    fn share_penalty(&self, valid_shares: f64) -> f64 {
        let allowed = self.allowed_shares();
        if valid_shares > allowed {
            (-(valid_shares - allowed) / allowed).exp()
        } else {
            1.0
        }
    }

    /// In (0, 1]: 1 at or below `max_difficulty`, exponentially damped above.
    fn difficulty_penalty(&self, difficulty: f64) -> f64 {
        let max = self.config.max_difficulty;
        if difficulty > max {
            (-(difficulty - max) / max).exp()
        } else {
            1.0
        }
    }

    /// Penalty-adjusted work summed over one hotkey's workers.
    pub fn effective_work(&self, metrics: &[MinerMetrics]) -> f64 {
        metrics
            .iter()
            .map(|m| {
                let valid_shares = m.valid_shares as f64;
                valid_shares
                    * m.difficulty.min(self.config.max_difficulty)
                    * self.difficulty_penalty(m.difficulty)
                    * self.share_penalty(valid_shares)
            })
            .sum()
    }

    /// Worker uptime clamped to the window and expressed as a fraction.
    pub fn fractional_uptime(&self, uptime_seconds: f64) -> f64 {
        uptime_seconds.clamp(0.0, self.config.window_seconds) / self.config.window_seconds
    }

    /// Arithmetic mean of the workers' fractional uptimes; 0 with no workers.
    pub fn average_uptime(&self, metrics: &[MinerMetrics]) -> f64 {
        if metrics.is_empty() {
            return 0.0;
        }
        let sum: f64 = metrics
            .iter()
            .map(|m| self.fractional_uptime(m.uptime_seconds))
            .sum();
        sum / metrics.len() as f64
    }

    /// Score every hotkey in one pass.
    ///
    /// The input and output are ordered maps so the floating-point result is
    /// reproducible bit-for-bit for a fixed input.
    pub fn rate_all(&self, metrics: &BTreeMap<String, Vec<MinerMetrics>>) -> BTreeMap<String, f64> {
        let work: BTreeMap<&str, f64> = metrics
            .iter()
            .map(|(hotkey, ms)| (hotkey.as_str(), self.effective_work(ms)))
            .collect();

        // All works are non-negative; 0.0 only when every hotkey has zero
        // work, which the guard below turns into all-zero scores.
        let max_work = work.values().copied().fold(0.0_f64, f64::max);

        metrics
            .iter()
            .map(|(hotkey, ms)| {
                let norm_score = if max_work == 0.0 {
                    0.0
                } else {
                    work[hotkey.as_str()] / max_work
                };
                let avg_uptime = self.average_uptime(ms);
                let penalized = norm_score * avg_uptime.powf(self.config.uptime_alpha);
                let score = round_to(penalized.clamp(0.0, 1.0), self.config.ndigits);
                (hotkey.clone(), score)
            })
            .collect()
    }
}

fn round_to(value: f64, ndigits: u32) -> f64 {
    let factor = 10f64.powi(ndigits as i32);
    (value * factor).round() / factor
}
