//! A BBR-style bandwidth/min-RTT estimator driving pacing, congestion
//! window sizing, and payload-size adaptation.

use std::time::Duration;

/// Bandwidth/RTT estimator state.
pub struct Estimator {
    min_rtt: Duration,
    max_bandwidth: f64, // bytes/sec
}

impl Estimator {
    pub fn new() -> Self {
        Estimator {
            min_rtt: Duration::from_secs(3600),
            max_bandwidth: 0.0,
        }
    }

    /// Fold in one delivery sample. `interval` is the time over which
    /// `delivered_bytes` were acknowledged; `rtt_sample` is an observed
    /// round-trip time for the same window (zero if unavailable).
    pub fn update(&mut self, delivered_bytes: u64, interval: Duration, rtt_sample: Duration) {
        if !interval.is_zero() {
            let bw = delivered_bytes as f64 / interval.as_secs_f64();
            if bw > self.max_bandwidth {
                self.max_bandwidth = bw;
                tracing::trace!(max_bandwidth = bw, "congestion: new max bandwidth sample");
            }
        }
        if !rtt_sample.is_zero() && rtt_sample < self.min_rtt {
            self.min_rtt = rtt_sample;
            tracing::trace!(?rtt_sample, "congestion: new min rtt sample");
        }
    }

    /// Current pacing rate in bytes/sec; 0 until the first sample arrives.
    pub fn pacing_rate(&self) -> f64 {
        self.max_bandwidth
    }

    /// Bandwidth-delay product in packets of `payload_bytes`, floored at 1.
    pub fn congestion_window(&self, payload_bytes: usize) -> u64 {
        if self.max_bandwidth <= 0.0 || self.min_rtt >= Duration::from_secs(3600) || payload_bytes == 0 {
            return 1;
        }
        let bdp = self.max_bandwidth * self.min_rtt.as_secs_f64();
        ((bdp / payload_bytes as f64).ceil() as u64).max(1)
    }
}

impl Default for Estimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapt the current payload size toward `min`/`max` bounds based on
/// observed loss and corruption rates.
///
/// 1. Clamp `current` to `[min, max]`.
/// 2. If `loss_rate >= 2%` or any corruption, shrink by `max(1, current/8)`
///    down to `min`.
/// 3. Else if `loss_rate < 0.5%` and no corruption, grow by
///    `max(1, current/16)` up to `max`.
/// 4. Otherwise return the clamped `current` unchanged.
pub fn adjust_payload(current: i64, min: i64, max: i64, loss_rate: f64, corruption_rate: f64) -> i64 {
    let mut current = current.clamp(min, max);
    let reduce = loss_rate >= 0.02 || corruption_rate > 0.0;
    let increase = loss_rate < 0.005 && corruption_rate == 0.0;

    if reduce {
        let step_down = (current / 8).max(1);
        current = (current - step_down).max(min);
    } else if increase {
        let step_up = (current / 16).max(1);
        current = (current + step_up).min(max);
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacing_rate_zero_until_first_sample() {
        let e = Estimator::new();
        assert_eq!(e.pacing_rate(), 0.0);
        assert_eq!(e.congestion_window(1000), 1);
    }

    #[test]
    fn tracks_max_bandwidth_and_min_rtt() {
        let mut e = Estimator::new();
        e.update(1000, Duration::from_secs(1), Duration::from_millis(100));
        e.update(2000, Duration::from_secs(1), Duration::from_millis(50));
        e.update(500, Duration::from_secs(1), Duration::from_millis(200));
        assert_eq!(e.pacing_rate(), 2000.0);
        assert_eq!(e.min_rtt, Duration::from_millis(50));
        let cwnd = e.congestion_window(1000);
        // bdp = 2000 * 0.05 = 100 bytes -> ceil(100/1000) = 1
        assert_eq!(cwnd, 1);
    }

    #[test]
    fn adjust_payload_monotonicity() {
        let grown = adjust_payload(1000, 100, 2000, 0.0, 0.0);
        assert!(grown >= 1000);

        let shrunk = adjust_payload(1000, 100, 2000, 0.05, 0.0);
        assert!(shrunk <= 1000);

        // bounds never violated
        assert!((100..=2000).contains(&grown));
        assert!((100..=2000).contains(&shrunk));
    }

    #[test]
    fn adjust_payload_clamps_out_of_range_current() {
        assert_eq!(adjust_payload(50, 100, 2000, 0.0, 0.0), 100 + (100 / 16).max(1));
        assert_eq!(adjust_payload(5000, 100, 2000, 0.0, 0.0), 2000);
    }
}
