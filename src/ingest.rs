//! Folding rate samples into the interval history.

use crate::history::{IntervalHistory, WindowTotals};
use crate::sample::RateSample;
use tracing::trace;

/// When a sample opens a new measurement interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoundaryRule {
    /// One interval per decision tick: a boundary is crossed once `min_rtt`
    /// has elapsed since the last decision.
    DecisionCadence,
    /// Fixed wall-clock tick of `2 * history_span / depth + 1` microseconds
    /// measured from the current interval's start.
    WallClock,
}

/// Timing context owned by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    /// Smallest RTT observed so far; `None` suspends interval boundaries.
    pub min_rtt_us: Option<u32>,
    /// Timestamp of the last emitted decision.
    pub last_decision_us: u64,
}

/// Result of ingesting one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ingested {
    /// The sample opened a new interval.
    pub opened: bool,
    /// Totals over the history window after the update.
    pub totals: WindowTotals,
}

/// Decides per sample whether to open a new interval or merge into the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateSampleIngester {
    rule: BoundaryRule,
    history_periods: u32,
}

impl RateSampleIngester {
    /// Create an ingester.
    #[must_use]
    pub const fn new(rule: BoundaryRule, history_periods: u32) -> Self {
        Self {
            rule,
            history_periods,
        }
    }

    /// Boundary rule in use.
    #[must_use]
    pub const fn rule(&self) -> BoundaryRule {
        self.rule
    }

    /// Wall-clock span covered by the windowed totals; `None` while RTT is unknown.
    #[must_use]
    pub fn history_span_us(&self, min_rtt_us: Option<u32>) -> Option<u64> {
        min_rtt_us.map(|rtt| u64::from(self.history_periods) * u64::from(rtt))
    }

    fn crosses_boundary(&self, history: &IntervalHistory, cadence: Cadence, now_us: u64) -> bool {
        let Some(min_rtt_us) = cadence.min_rtt_us else {
            return false;
        };
        match self.rule {
            BoundaryRule::DecisionCadence => {
                now_us.saturating_sub(cadence.last_decision_us) >= u64::from(min_rtt_us)
            }
            BoundaryRule::WallClock => {
                let span = u64::from(self.history_periods) * u64::from(min_rtt_us);
                // round up
                let length = 2 * span / history.depth() as u64 + 1;
                history.head().start_us().saturating_add(length) < now_us
            }
        }
    }

    /// Record `sample` taken at `now_us`.
    ///
    /// `sending_rate` is the current pacing rate in segments per second,
    /// snapshotted into a newly opened interval.
    pub fn ingest(
        &self,
        history: &mut IntervalHistory,
        sample: &RateSample,
        now_us: u64,
        cadence: Cadence,
        sending_rate: u64,
    ) -> Ingested {
        let opened = self.crosses_boundary(history, cadence, now_us);
        if opened {
            history.advance(now_us, sample, sending_rate);
            trace!(now_us, acked = sample.acked, lost = sample.lost, "opened interval");
        } else {
            history.merge(sample);
        }

        let totals = history.window_totals(now_us, self.history_span_us(cadence.min_rtt_us));
        Ingested { opened, totals }
    }
}
