//! Per-peer throughput bookkeeping used to derive the WSJF priority, keyed
//! on a monotonic `Instant` rather than wall-clock time.

use std::time::{Duration, Instant};

/// Floor on the elapsed-time denominator. Avoids a division blowup for the
/// first byte of a session.
const MIN_DURATION: Duration = Duration::from_millis(100);

pub struct ConnectionSession {
    pub cid: String,
    start_time: Instant,
    total_bytes: u64,
    last_score: f64,
}

impl ConnectionSession {
    pub fn new(cid: String) -> Self {
        Self {
            cid,
            start_time: Instant::now(),
            total_bytes: 0,
            last_score: 0.0,
        }
    }

    pub fn last_score(&self) -> f64 {
        self.last_score
    }

    /// `score = 1 / (bits_per_second + 1)`, recorded as `last_score` for the
    /// periodic monitor to read.
    pub fn record_and_score(&mut self, bytes_read: usize) -> f64 {
        self.total_bytes += bytes_read as u64;

        let elapsed = self.start_time.elapsed().max(MIN_DURATION);
        let bits_per_second = (self.total_bytes as f64 * 8.0) / elapsed.as_secs_f64();
        let score = 1.0 / (bits_per_second + 1.0);
        self.last_score = score;
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_decreases_as_throughput_rises() {
        let mut session = ConnectionSession::new("X".to_string());
        let slow_score = session.record_and_score(1);

        let mut fast_session = ConnectionSession::new("Y".to_string());
        let fast_score = fast_session.record_and_score(10_000);

        assert!(fast_score < slow_score, "higher throughput must yield a lower (better) priority number");
    }

    #[test]
    fn score_is_nonnegative() {
        let mut session = ConnectionSession::new("Z".to_string());
        assert!(session.record_and_score(0) >= 0.0);
    }
}
