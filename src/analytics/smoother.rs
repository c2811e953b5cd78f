//! Exponential smoothing of the health index.
//!
//! Keeps only the previous smoothed value, so each update is O(1) and no raw
//! history is retained.

/// EWMA trend with tick-over-tick derivative.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SignalSmoother {
    alpha: f64,
    smoothed: Option<f64>,
    samples: u64,
}

impl SignalSmoother {
    /// `alpha` is the weight of the newest sample, in (0, 1].
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            smoothed: None,
            samples: 0,
        }
    }

    /// Fold one raw sample into the trend and return `(smoothed, derivative)`.
    ///
    /// The first sample seeds the trend with derivative 0.
    pub fn update(&mut self, raw: f64) -> (f64, f64) {
        self.samples += 1;
        match self.smoothed {
            None => {
                self.smoothed = Some(raw);
                (raw, 0.0)
            }
            Some(prev) => {
                // alpha*raw + (1-alpha)*prev, written so a constant input is an exact fixed point
                let next = prev + self.alpha * (raw - prev);
                self.smoothed = Some(next);
                (next, next - prev)
            }
        }
    }

    /// Latest smoothed value, if any sample has been seen.
    pub fn current(&self) -> Option<f64> {
        self.smoothed
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_seeds_trend() {
        let mut s = SignalSmoother::new(0.15);
        assert_eq!(s.current(), None);
        assert_eq!(s.update(0.8), (0.8, 0.0));
        assert_eq!(s.current(), Some(0.8));
    }

    #[test]
    fn test_constant_input_is_fixed_point() {
        let mut s = SignalSmoother::new(0.15);
        for _ in 0..500 {
            let (smoothed, derivative) = s.update(0.6);
            assert_eq!(smoothed, 0.6);
            assert_eq!(derivative, 0.0);
        }
        assert_eq!(s.samples(), 500);
    }

    #[test]
    fn test_step_response() {
        let mut s = SignalSmoother::new(0.15);
        s.update(1.0);
        let (smoothed, derivative) = s.update(0.0);
        assert!((smoothed - 0.85).abs() < 1e-12);
        assert!((derivative + 0.15).abs() < 1e-12);

        let (smoothed, derivative) = s.update(0.0);
        assert!((smoothed - 0.7225).abs() < 1e-12);
        assert!((derivative + 0.1275).abs() < 1e-12);
    }

    #[test]
    fn test_matches_full_series_recurrence() {
        let raw: Vec<f64> = (0..50).map(|i| 0.5 + 0.01 * f64::from(i % 7)).collect();

        let mut series = vec![raw[0]];
        for v in &raw[1..] {
            let prev = *series.last().unwrap_or(&raw[0]);
            series.push(0.15 * v + 0.85 * prev);
        }

        let mut s = SignalSmoother::new(0.15);
        for (i, v) in raw.iter().enumerate() {
            let (smoothed, derivative) = s.update(*v);
            assert!((smoothed - series[i]).abs() < 1e-12);
            let expected_derivative = if i == 0 { 0.0 } else { series[i] - series[i - 1] };
            assert!((derivative - expected_derivative).abs() < 1e-12);
        }
    }
}
