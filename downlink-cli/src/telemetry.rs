//! Telemetry sampling and statistical aggregation over the transmitter's
//! cumulative RF channel outcome counters.

use crate::logging::{StatSummary, TelemetryEvent};
use chrono::Utc;
use downlink_core::transmitter::TransmitStats;
use std::time::Instant;

/// Accumulates periodic snapshots of `TransmitStats` and computes rollups.
/// Rates are derived from cumulative totals rather than per-event deltas,
/// since the transmitter already tracks them across the lifetime of a run.
pub struct LinkTelemetryAggregator {
    drop_rate_samples: Vec<f64>,
    corruption_rate_samples: Vec<f64>,
    duplicate_rate_samples: Vec<f64>,

    latest: TransmitStats,
    fade_activations: usize,

    last_sample_time: Instant,
    sample_interval_secs: f64,
}

impl LinkTelemetryAggregator {
    pub fn new(sample_interval_secs: f64) -> Self {
        Self {
            drop_rate_samples: Vec::new(),
            corruption_rate_samples: Vec::new(),
            duplicate_rate_samples: Vec::new(),
            latest: TransmitStats::default(),
            fade_activations: 0,
            last_sample_time: Instant::now(),
            sample_interval_secs,
        }
    }

    /// Replace the latest known cumulative transmit counters.
    pub fn observe_stats(&mut self, stats: TransmitStats) {
        self.latest = stats;
    }

    pub fn record_fade_activation(&mut self) {
        self.fade_activations += 1;
    }

    pub fn should_sample(&self) -> bool {
        self.last_sample_time.elapsed().as_secs_f64() >= self.sample_interval_secs
    }

    /// Emit a telemetry rollup and reset the sampling timer, recording the
    /// current rates as historical samples for the final statistics.
    pub fn sample(&mut self) -> Option<TelemetryEvent> {
        if !self.should_sample() {
            return None;
        }

        let drop_rate = self.drop_rate();
        let corruption_rate = self.corruption_rate();
        let duplicate_rate = self.duplicate_rate();

        self.drop_rate_samples.push(drop_rate);
        self.corruption_rate_samples.push(corruption_rate);
        self.duplicate_rate_samples.push(duplicate_rate);

        let event = TelemetryEvent {
            timestamp: Utc::now(),
            drop_rate,
            corruption_rate,
            duplicate_rate,
            fade_activations: self.fade_activations,
            datagrams_sent: self.latest.attempted as usize,
            datagrams_delivered: self.latest.delivered as usize,
        };

        self.last_sample_time = Instant::now();
        Some(event)
    }

    fn drop_rate(&self) -> f64 {
        if self.latest.attempted == 0 {
            0.0
        } else {
            (self.latest.attempted - self.latest.delivered) as f64 / self.latest.attempted as f64
        }
    }

    fn corruption_rate(&self) -> f64 {
        if self.latest.delivered == 0 {
            0.0
        } else {
            self.latest.corrupted as f64 / self.latest.delivered as f64
        }
    }

    fn duplicate_rate(&self) -> f64 {
        if self.latest.delivered == 0 {
            0.0
        } else {
            self.latest.duplicated as f64 / self.latest.delivered as f64
        }
    }

    pub fn compute_statistics(&self) -> (StatSummary, StatSummary) {
        (
            Self::summarize(&self.drop_rate_samples),
            Self::summarize(&self.corruption_rate_samples),
        )
    }

    fn summarize(samples: &[f64]) -> StatSummary {
        if samples.is_empty() {
            return StatSummary {
                mean: 0.0,
                stddev: 0.0,
                min: 0.0,
                max: 0.0,
                samples: 0,
            };
        }

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        let stddev = variance.sqrt();
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        StatSummary {
            mean,
            stddev,
            min,
            max,
            samples: samples.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_rate_reflects_latest_observed_stats() {
        let mut agg = LinkTelemetryAggregator::new(0.0);
        agg.observe_stats(TransmitStats {
            attempted: 4,
            delivered: 2,
            corrupted: 1,
            duplicated: 0,
        });

        assert_eq!(agg.drop_rate(), 0.5);
        assert_eq!(agg.corruption_rate(), 0.5);
    }

    #[test]
    fn sample_resets_timer_and_accumulates_history() {
        let mut agg = LinkTelemetryAggregator::new(0.0);
        agg.observe_stats(TransmitStats {
            attempted: 1,
            delivered: 1,
            corrupted: 0,
            duplicated: 0,
        });
        assert!(agg.sample().is_some());

        let (drop_summary, _) = agg.compute_statistics();
        assert_eq!(drop_summary.samples, 1);
    }

    #[test]
    fn no_samples_yields_zeroed_summary() {
        let agg = LinkTelemetryAggregator::new(1.0);
        let (drop_summary, corruption_summary) = agg.compute_statistics();
        assert_eq!(drop_summary.samples, 0);
        assert_eq!(corruption_summary.mean, 0.0);
    }
}
