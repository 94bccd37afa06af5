//! Points and the fuel gauge.
//!
//! Every point the user earns (activities, mission rewards, duplicate card
//! bonuses) goes through [`RewardLedger::award`]. Points accumulate in
//! `total_points` forever and in `fuel_level` until the overload threshold is
//! reached, at which point the gauge empties and an overload is recorded.
//! Fuel above the threshold is discarded rather than carried into the next
//! cycle, so one award triggers at most one overload.

use crate::UserProgress;
use chrono::{DateTime, Utc};

/// Fuel needed to trigger an overload
pub const OVERLOAD_THRESHOLD: u32 = 1000;

/// Result of a single award
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerEffect {
    pub new_total: u64,
    pub overload_triggered: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RewardLedger {
    threshold: u32,
}

impl RewardLedger {
    /// Ledger with a custom threshold; zero falls back to the default
    pub fn new(threshold: u32) -> Self {
        let threshold = if threshold == 0 {
            tracing::warn!("Overload threshold of 0 is invalid, using {}", OVERLOAD_THRESHOLD);
            OVERLOAD_THRESHOLD
        } else {
            threshold
        };
        Self { threshold }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Add points to the user's totals and fuel gauge
    pub fn award(&self, progress: &mut UserProgress, points: u32, now: DateTime<Utc>) -> LedgerEffect {
        progress.total_points = progress.total_points.saturating_add(points as u64);
        progress.fuel_level = progress.fuel_level.saturating_add(points);

        let overload_triggered = progress.fuel_level >= self.threshold;
        if overload_triggered {
            progress.total_overloads += 1;
            progress.weekly_overloads += 1;
            progress.last_overload_at = Some(now);
            tracing::info!(
                "Overload #{} triggered (fuel {} ≥ {}), gauge reset",
                progress.total_overloads,
                progress.fuel_level,
                self.threshold
            );
            progress.fuel_level = 0;
        }

        LedgerEffect {
            new_total: progress.total_points,
            overload_triggered,
        }
    }

    /// Gauge fill in `[0, 1]`
    pub fn fuel_fraction(&self, progress: &UserProgress) -> f64 {
        (progress.fuel_level as f64 / self.threshold as f64).min(1.0)
    }
}

impl Default for RewardLedger {
    fn default() -> Self {
        Self {
            threshold: OVERLOAD_THRESHOLD,
        }
    }
}
