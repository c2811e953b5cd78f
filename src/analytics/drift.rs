//! Concept drift detection with an adaptive sliding window (ADWIN).
//!
//! The window holds the most recent observations, compressed into an
//! exponential histogram: buckets of size 1, 2, 4, ... with at most
//! `max_buckets` buckets per size. On every update each bucket boundary is a
//! candidate cut into an older and a newer sub-window. A cut is significant
//! when the difference of the sub-window means exceeds
//!
//! ```text
//! m   = 1/(n0 - L + 1) + 1/(n1 - L + 1)          L = min_window_length
//! δ'  = ln(2 · ln(n) / δ)
//! ε   = sqrt(2 · m · σ² · δ') + (2/3) · δ' · m
//! ```
//!
//! where `σ²` is the window variance. Among significant cuts the one with the
//! largest `|μ0 - μ1| / ε` wins (ties go to the larger newer sub-window); the
//! older sub-window is discarded and the check repeats on what is left.
//! Memory is O(max_buckets · log n).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::config::DriftConfig;

/// Compressed run of consecutive observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Bucket {
    count: usize,
    total: f64,
    /// Sum of squared deviations from the bucket mean
    m2: f64,
}

impl Bucket {
    fn single(value: f64) -> Self {
        Self {
            count: 1,
            total: value,
            m2: 0.0,
        }
    }

    fn mean(&self) -> f64 {
        self.total / self.count as f64
    }

    /// Combine two buckets (parallel variance formula).
    fn merge(&self, other: &Bucket) -> Bucket {
        let n1 = self.count as f64;
        let n2 = other.count as f64;
        let diff = self.mean() - other.mean();
        Bucket {
            count: self.count + other.count,
            total: self.total + other.total,
            m2: self.m2 + other.m2 + n1 * n2 * diff * diff / (n1 + n2),
        }
    }
}

/// Candidate cut found by the window scan.
#[derive(Debug, Clone, Copy)]
struct Cut {
    older_len: usize,
    newer_len: usize,
    mean_diff: f64,
    score: f64,
}

/// Adaptive-windowing change detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptDriftDetector {
    delta: f64,
    min_window_length: usize,
    grace_period: usize,
    max_buckets: usize,
    /// Oldest bucket at the front
    buckets: VecDeque<Bucket>,
    width: usize,
    total: f64,
    m2: f64,
    observations: u64,
    detections: u64,
    drift_detected: bool,
}

impl ConceptDriftDetector {
    pub fn new(delta: f64) -> Self {
        Self::from_config(&DriftConfig {
            delta,
            ..DriftConfig::default()
        })
    }

    pub fn from_config(config: &DriftConfig) -> Self {
        Self {
            delta: config.delta,
            min_window_length: config.min_window_length.max(1),
            grace_period: config.grace_period,
            max_buckets: config.max_buckets.max(2),
            buckets: VecDeque::new(),
            width: 0,
            total: 0.0,
            m2: 0.0,
            observations: 0,
            detections: 0,
            drift_detected: false,
        }
    }

    /// Add one observation and test the window for a distribution change.
    ///
    /// Returns the same value as [`drift_detected`](Self::drift_detected)
    /// afterwards. Non-finite observations are ignored.
    pub fn update(&mut self, value: f64) -> bool {
        self.drift_detected = false;
        if !value.is_finite() {
            debug!(value, "Drift detector ignoring non-finite observation");
            return false;
        }

        self.observations += 1;
        self.insert(value);
        self.compress();

        if self.width > self.grace_period {
            while let Some(cut) = self.best_cut() {
                debug!(
                    older = cut.older_len,
                    newer = cut.newer_len,
                    mean_diff = cut.mean_diff,
                    score = cut.score,
                    "Drift cut"
                );
                self.drop_oldest(cut.older_len);
                self.drift_detected = true;
            }
        }

        if self.drift_detected {
            self.detections += 1;
        }
        self.drift_detected
    }

    /// True only if the most recent update found a drift.
    pub fn drift_detected(&self) -> bool {
        self.drift_detected
    }

    /// Empty the window and clear the drift flag.
    ///
    /// Lifetime counters (`observations`, `detections`) are kept.
    pub fn reset(&mut self) {
        self.buckets.clear();
        self.width = 0;
        self.total = 0.0;
        self.m2 = 0.0;
        self.drift_detected = false;
    }

    /// Observations currently in the window.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Mean of the current window (0 when empty).
    pub fn mean(&self) -> f64 {
        if self.width == 0 {
            0.0
        } else {
            self.total / self.width as f64
        }
    }

    /// Population variance of the current window (0 when empty).
    pub fn variance(&self) -> f64 {
        if self.width == 0 {
            0.0
        } else {
            self.m2 / self.width as f64
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn observations(&self) -> u64 {
        self.observations
    }

    pub fn detections(&self) -> u64 {
        self.detections
    }

    // ------------------------------------------------------------------------
    // Window maintenance
    // ------------------------------------------------------------------------

    fn insert(&mut self, value: f64) {
        if self.width > 0 {
            let n = self.width as f64;
            let diff = value - self.total / n;
            self.m2 += n * diff * diff / (n + 1.0);
        }
        self.width += 1;
        self.total += value;
        self.buckets.push_back(Bucket::single(value));
    }

    /// Merge the two oldest buckets of any size level that overflowed.
    ///
    /// Bucket sizes are non-increasing from oldest to newest, so buckets of
    /// one size are contiguous and the merged bucket keeps that order.
    fn compress(&mut self) {
        let mut size = 1;
        loop {
            let Some(first) = self.buckets.iter().position(|b| b.count == size) else {
                break;
            };
            let run = self
                .buckets
                .iter()
                .skip(first)
                .take_while(|b| b.count == size)
                .count();
            if run <= self.max_buckets {
                break;
            }
            let merged = self.buckets[first].merge(&self.buckets[first + 1]);
            self.buckets[first] = merged;
            self.buckets.remove(first + 1);
            size *= 2;
        }
    }

    /// Scan bucket boundaries for the strongest significant cut.
    fn best_cut(&self) -> Option<Cut> {
        if self.width < 2 * self.min_window_length || self.width < 2 {
            return None;
        }

        let n = self.width as f64;
        let variance = self.m2 / n;
        let delta_prime = (2.0 * n.ln() / self.delta).ln();
        if !delta_prime.is_finite() || delta_prime <= 0.0 {
            return None;
        }

        let mut older_len = 0usize;
        let mut older_total = 0.0;
        let mut best: Option<Cut> = None;

        for bucket in self.buckets.iter().take(self.buckets.len() - 1) {
            older_len += bucket.count;
            older_total += bucket.total;
            let newer_len = self.width - older_len;

            if older_len < self.min_window_length {
                continue;
            }
            if newer_len < self.min_window_length {
                break;
            }

            let older_mean = older_total / older_len as f64;
            let newer_mean = (self.total - older_total) / newer_len as f64;
            let mean_diff = (older_mean - newer_mean).abs();
            let bound = self.cut_bound(older_len, newer_len, variance, delta_prime);

            if mean_diff > bound {
                let score = mean_diff / bound;
                // strict: on equal score keep the earlier cut (larger newer side)
                if best.map_or(true, |b| score > b.score) {
                    best = Some(Cut {
                        older_len,
                        newer_len,
                        mean_diff,
                        score,
                    });
                }
            }
        }

        best
    }

    fn cut_bound(&self, older_len: usize, newer_len: usize, variance: f64, delta_prime: f64) -> f64 {
        let offset = self.min_window_length as f64 - 1.0;
        let m_recip =
            1.0 / (older_len as f64 - offset) + 1.0 / (newer_len as f64 - offset);
        (2.0 * m_recip * variance * delta_prime).sqrt() + 2.0 / 3.0 * delta_prime * m_recip
    }

    /// Remove the oldest `count` observations (always a whole number of buckets).
    fn drop_oldest(&mut self, count: usize) {
        let mut removed = 0;
        while removed < count {
            let Some(bucket) = self.buckets.pop_front() else {
                break;
            };
            removed += bucket.count;
        }
        self.recompute_totals();
    }

    fn recompute_totals(&mut self) {
        let folded = self
            .buckets
            .iter()
            .copied()
            .reduce(|acc, b| acc.merge(&b));
        match folded {
            Some(all) => {
                self.width = all.count;
                self.total = all.total;
                self.m2 = all.m2.max(0.0);
            }
            None => {
                self.width = 0;
                self.total = 0.0;
                self.m2 = 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Alternating ±noise around a level, deterministic.
    fn level(value: f64, noise: f64, i: usize) -> f64 {
        if i % 2 == 0 {
            value + noise
        } else {
            value - noise
        }
    }

    #[test]
    fn test_stationary_stream_never_drifts() {
        let mut detector = ConceptDriftDetector::new(0.002);
        for i in 0..2_000 {
            assert!(!detector.update(level(0.6, 0.01, i)), "false alarm at {i}");
        }
        assert_eq!(detector.width(), 2_000);
        assert_eq!(detector.detections(), 0);
        assert!((detector.mean() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_level_shift_detected_once() {
        let mut detector = ConceptDriftDetector::new(0.002);
        for i in 0..500 {
            detector.update(level(0.6, 0.01, i));
        }

        let mut fired_at = Vec::new();
        for i in 0..500 {
            if detector.update(level(0.2, 0.01, i)) {
                fired_at.push(i);
            }
        }

        assert_eq!(fired_at.len(), 1, "fired at {fired_at:?}");
        assert!(fired_at[0] < 100, "detected too late: {}", fired_at[0]);
        assert_eq!(detector.detections(), 1);
        // Older sub-window discarded: window is dominated by the new level
        assert!(detector.width() < 600);
        assert!((detector.mean() - 0.2).abs() < 0.05);
    }

    #[test]
    fn test_flag_is_only_set_for_detecting_update() {
        let mut detector = ConceptDriftDetector::new(0.002);
        for i in 0..300 {
            detector.update(level(0.6, 0.005, i));
        }
        let mut i = 0;
        while !detector.update(0.2) {
            i += 1;
            assert!(i < 200, "shift never detected");
        }
        assert!(detector.drift_detected());
        detector.update(0.2);
        assert!(!detector.drift_detected());
    }

    #[test]
    fn test_bucket_compression_bounds_memory() {
        let mut detector = ConceptDriftDetector::new(0.002);
        for i in 0..10_000 {
            detector.update(level(0.5, 0.02, i));
        }
        assert_eq!(detector.width(), 10_000);
        // at most max_buckets + 1 per power-of-two level
        assert!(detector.bucket_count() <= 6 * 15, "{}", detector.bucket_count());
    }

    #[test]
    fn test_window_statistics_match_direct_computation() {
        let mut detector = ConceptDriftDetector::new(0.002);
        let values: Vec<f64> = (0..137).map(|i| 0.4 + 0.001 * f64::from(i % 11)).collect();
        for v in &values {
            detector.update(*v);
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert!((detector.mean() - mean).abs() < 1e-12);
        assert!((detector.variance() - variance).abs() < 1e-12);
    }

    #[test]
    fn test_reset_clears_window() {
        let mut detector = ConceptDriftDetector::new(0.002);
        for i in 0..100 {
            detector.update(level(0.6, 0.01, i));
        }
        detector.reset();
        assert_eq!(detector.width(), 0);
        assert_eq!(detector.bucket_count(), 0);
        assert!(!detector.drift_detected());
        assert_eq!(detector.mean(), 0.0);
        assert_eq!(detector.variance(), 0.0);

        // Usable again after reset
        assert!(!detector.update(0.3));
        assert_eq!(detector.width(), 1);
    }

    #[test]
    fn test_equal_scores_prefer_larger_newer_window() {
        // Unit buckets only and no automatic cutting, so best_cut sees every boundary
        let mut detector = ConceptDriftDetector::from_config(&DriftConfig {
            delta: 0.002,
            min_window_length: 1,
            grace_period: 1_000,
            max_buckets: 1_000,
        });
        // Mirror-symmetric window: cuts after 50 and after 150 score the same
        for value in std::iter::repeat(0.0)
            .take(50)
            .chain(std::iter::repeat(1.0).take(100))
            .chain(std::iter::repeat(0.0).take(50))
        {
            assert!(!detector.update(value));
        }
        assert_eq!(detector.bucket_count(), 200);

        let cut = detector.best_cut().expect("significant cut");
        assert_eq!(cut.older_len, 50);
        assert_eq!(cut.newer_len, 150);

        let variance = detector.variance();
        let delta_prime = (2.0 * 200f64.ln() / 0.002).ln();
        let mirrored_score =
            (100.0 / 150.0) / detector.cut_bound(150, 50, variance, delta_prime);
        assert_eq!(cut.score, mirrored_score);
    }

    #[test]
    fn test_non_finite_input_ignored() {
        let mut detector = ConceptDriftDetector::new(0.002);
        assert!(!detector.update(f64::NAN));
        assert!(!detector.update(f64::INFINITY));
        assert_eq!(detector.width(), 0);
        assert_eq!(detector.observations(), 0);
    }
}
