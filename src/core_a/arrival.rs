//! The polymorphic admission-scoring strategy.
//!
//! Rather than a trait object, the two strategies live as variants of one
//! `PMode` enum selected once at startup from [`crate::core_a::config::Config`]
//! and threaded by value through the connection handler. A closed,
//! two-member strategy set is exactly the case an enum-and-`match` fits
//! better than `dyn` dispatch, and it keeps both branches unit-testable in
//! the same process.

use std::time::Duration;

use crate::core_a::rewrite::find_header_terminator;

/// Selects which admission strategy a deployment runs; read once at startup
/// from `SLOTPROXY_P_MODE` (`strict_slide` | `avg_gap`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PModeKind {
    StrictSlide,
    AvgGap,
}

impl std::str::FromStr for PModeKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict_slide" => Ok(PModeKind::StrictSlide),
            "avg_gap" => Ok(PModeKind::AvgGap),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PModeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PModeKind::StrictSlide => write!(f, "strict_slide"),
            PModeKind::AvgGap => write!(f, "avg_gap"),
        }
    }
}

impl Default for PModeKind {
    fn default() -> Self {
        PModeKind::AvgGap
    }
}

/// What to do once the first chunk of a connection has arrived.
pub enum FirstReadOutcome {
    /// `avg_gap`'s fast path: the first chunk already contains the full
    /// header terminator, so `P = 0` and admission can happen without
    /// waiting on a second read.
    ImmediateAdmit { p: f64 },
    /// The strategy needs a second read before it can score this
    /// connection.
    NeedSecondRead,
}

/// Per-connection scoring state for one of the two admission strategies.
pub enum PMode {
    /// `p` is fixed at the first-to-second read gap and never updated
    /// again.
    StrictSlide,
    /// `p` starts at the first gap and becomes the running mean of every
    /// inter-read gap observed while still accumulating the header.
    AvgGap { sum_gap: f64, gap_cnt: u32 },
}

impl PMode {
    pub fn new(kind: PModeKind) -> Self {
        match kind {
            PModeKind::StrictSlide => PMode::StrictSlide,
            PModeKind::AvgGap => PMode::AvgGap { sum_gap: 0.0, gap_cnt: 0 },
        }
    }

    pub fn kind(&self) -> PModeKind {
        match self {
            PMode::StrictSlide => PModeKind::StrictSlide,
            PMode::AvgGap { .. } => PModeKind::AvgGap,
        }
    }

    /// Scores (or defers scoring) the connection from its first chunk.
    pub fn score_first(&self, first_chunk: &[u8]) -> FirstReadOutcome {
        match self {
            PMode::StrictSlide => FirstReadOutcome::NeedSecondRead,
            PMode::AvgGap { .. } => {
                if find_header_terminator(first_chunk).is_some() {
                    FirstReadOutcome::ImmediateAdmit { p: 0.0 }
                } else {
                    FirstReadOutcome::NeedSecondRead
                }
            }
        }
    }

    /// `p = t2 - t1` for both strategies: for `strict_slide` that's the
    /// final score; for `avg_gap` it seeds the running mean with the first
    /// observed gap.
    pub fn score_second(&mut self, gap: Duration) -> f64 {
        match self {
            PMode::StrictSlide => gap.as_secs_f64(),
            PMode::AvgGap { sum_gap, gap_cnt } => {
                *sum_gap += gap.as_secs_f64();
                *gap_cnt += 1;
                *sum_gap / f64::from(*gap_cnt)
            }
        }
    }

    /// Folds one more inter-read gap into the running mean. `strict_slide`
    /// never updates past admission, so this is always `None` for it.
    pub fn update(&mut self, gap: Duration) -> Option<f64> {
        match self {
            PMode::StrictSlide => None,
            PMode::AvgGap { sum_gap, gap_cnt } => {
                *sum_gap += gap.as_secs_f64();
                *gap_cnt += 1;
                Some(*sum_gap / f64::from(*gap_cnt))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_slide_never_fast_paths_and_never_updates() {
        let mode = PMode::new(PModeKind::StrictSlide);
        assert!(matches!(
            mode.score_first(b"GET / HTTP/1.1\r\n\r\n"),
            FirstReadOutcome::NeedSecondRead
        ));

        let mut mode = mode;
        let p = mode.score_second(Duration::from_millis(100));
        assert_eq!(p, 0.1);
        assert_eq!(mode.update(Duration::from_secs(5)), None);
    }

    #[test]
    fn avg_gap_fast_path_on_complete_first_read() {
        let mode = PMode::new(PModeKind::AvgGap);
        match mode.score_first(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n") {
            FirstReadOutcome::ImmediateAdmit { p } => assert_eq!(p, 0.0),
            FirstReadOutcome::NeedSecondRead => panic!("expected fast-path admit"),
        }
    }

    #[test]
    fn avg_gap_needs_second_read_when_header_incomplete() {
        let mode = PMode::new(PModeKind::AvgGap);
        assert!(matches!(
            mode.score_first(b"GET / HTTP/1.1\r\n"),
            FirstReadOutcome::NeedSecondRead
        ));
    }

    #[test]
    fn avg_gap_running_mean_includes_the_seeding_gap() {
        let mut mode = PMode::new(PModeKind::AvgGap);
        let p0 = mode.score_second(Duration::from_millis(100));
        assert_eq!(p0, 0.1);

        // second gap of 300ms: mean of [0.1, 0.3] == 0.2
        let p1 = mode.update(Duration::from_millis(300)).unwrap();
        assert!((p1 - 0.2).abs() < 1e-9);
    }

    #[test]
    fn p_mode_kind_round_trips_through_its_string_form() {
        use std::str::FromStr;
        assert_eq!(PModeKind::from_str("strict_slide"), Ok(PModeKind::StrictSlide));
        assert_eq!(PModeKind::from_str("avg_gap"), Ok(PModeKind::AvgGap));
        assert!(PModeKind::from_str("bogus").is_err());
    }
}
