//! Per-connection orchestration: ingest, refresh beliefs, decide.

use core::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{debug, instrument, trace};

use crate::beliefs::{BeliefEstimator, BeliefState, PathContext};
use crate::config::{ControllerConfig, Variant};
use crate::control::{ControlState, ControlStateMachine, TickInput};
use crate::error::{Error, Result};
use crate::history::{IntervalHistory, USEC_PER_SEC};
use crate::ingest::{BoundaryRule, Cadence, RateSampleIngester};
use crate::sample::{Decision, RateSample};
use crate::snapshot::ControllerSnapshot;

/// Diagnostic label of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionId(u32);

impl ConnectionId {
    /// Raw value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flow {}", self.0)
    }
}

/// Mints unique [`ConnectionId`]s. Share one instance across connections.
#[derive(Debug, Default)]
pub struct ConnectionIds {
    last: AtomicU32,
}

impl ConnectionIds {
    /// Counter starting at id 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicU32::new(0),
        }
    }

    /// Next unused id.
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1))
    }
}

/// Host-side counters tracked across ticks, never fed back into the law.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostics {
    /// Decision ticks emitted.
    pub ticks: u64,
    /// Time between the last two ticks.
    pub last_elapsed_us: u64,
    /// Segments the emitted pacing rates would have sent, summed over ticks.
    pub estimated_segs_sent: u64,
    /// Host's sent segments at the last tick.
    pub segs_sent: u64,
    /// Host's delivered segments at the last tick.
    pub segs_delivered: u64,
    /// Segments the host sent between the last two ticks.
    pub tick_segs_sent: u64,
    /// Segments the host delivered between the last two ticks.
    pub tick_segs_delivered: u64,
}

/// Rate-based congestion controller for one connection.
///
/// Feed every rate sample to [`Controller::on_sample`]; at most once per
/// minimum RTT it returns a [`Decision`] for the host to enforce. Calls for one
/// connection must be serialized by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controller {
    id: ConnectionId,
    variant: Variant,
    history: IntervalHistory,
    ingester: RateSampleIngester,
    estimator: BeliefEstimator,
    beliefs: BeliefState,
    control: ControlStateMachine,
    min_rtt_us: Option<u32>,
    last_decision_us: u64,
    last_decision: Option<Decision>,
    pacing_rate: u64,
    mss: u32,
    diagnostics: Diagnostics,
}

impl Controller {
    /// Bytes of per-connection state for a history of `depth` slots.
    #[must_use]
    pub const fn footprint(depth: usize) -> usize {
        size_of::<Self>() + IntervalHistory::footprint(depth) - size_of::<IntervalHistory>()
    }

    /// Allocate fresh state for a connection whose next sequence number is `snd_nxt`.
    pub fn new(config: ControllerConfig, ids: &ConnectionIds, snd_nxt: u32) -> Result<Self> {
        config.validate()?;
        let required = Self::footprint(config.history.depth);
        if let Some(budget) = config.state_budget {
            if required > budget {
                return Err(Error::StateTooLarge { required, budget });
            }
        }

        let rule = match config.variant {
            Variant::Ccmatic => BoundaryRule::DecisionCadence,
            Variant::SlowPaced | Variant::Aimd => BoundaryRule::WallClock,
        };
        let id = ids.next_id();
        debug!(%id, variant = ?config.variant, "congestion controller initialized");

        Ok(Self {
            id,
            variant: config.variant,
            history: IntervalHistory::new(config.history.depth),
            ingester: RateSampleIngester::new(rule, config.history.history_periods),
            estimator: BeliefEstimator::new(
                config.beliefs.clone(),
                config.alpha_segments,
                config.variant,
            ),
            beliefs: BeliefState::new(&config.beliefs),
            control: ControlStateMachine::new(&config, snd_nxt),
            min_rtt_us: None,
            last_decision_us: 0,
            last_decision: None,
            pacing_rate: 0,
            mss: 0,
            diagnostics: Diagnostics::default(),
        })
    }

    /// Process one rate sample taken at `now_us`.
    ///
    /// Returns `None` for rejected samples, while no RTT is known, and between
    /// decision ticks.
    #[instrument(level = "trace", skip(self, sample), fields(id = %self.id))]
    pub fn on_sample(&mut self, sample: &RateSample, now_us: u64) -> Option<Decision> {
        if !sample.is_valid() {
            trace!(
                delivered = sample.delivered,
                interval_us = sample.interval_us,
                "rejected stale rate sample"
            );
            return None;
        }

        if let Some(rtt) = sample.rtt_us {
            let rtt = rtt.max(1);
            self.min_rtt_us = Some(self.min_rtt_us.map_or(rtt, |min| min.min(rtt)));
        }
        self.mss = sample.mss;

        let cadence = Cadence {
            min_rtt_us: self.min_rtt_us,
            last_decision_us: self.last_decision_us,
        };
        let sending_rate = self.pacing_rate / u64::from(sample.mss);
        let ingested = self
            .ingester
            .ingest(&mut self.history, sample, now_us, cadence, sending_rate);

        let min_rtt_us = self.min_rtt_us?;
        if ingested.opened && self.variant.tracks_beliefs() {
            let path = PathContext {
                min_rtt_us,
                mss: sample.mss,
                delivered_total: sample.delivered_total,
            };
            self.estimator
                .refresh(&mut self.beliefs, &mut self.history, path);
        }

        self.control.observe(&ingested.totals, sample);

        if now_us.saturating_sub(self.last_decision_us) < u64::from(min_rtt_us) {
            return None;
        }
        self.record_tick(sample, now_us);
        self.last_decision_us = now_us;

        let decision = self.control.decide(&TickInput {
            beliefs: &self.beliefs,
            sample,
            totals: &ingested.totals,
            min_rtt_us,
            previous_rate: self.pacing_rate,
        });
        self.pacing_rate = decision.pacing_rate;
        self.last_decision = Some(decision);
        trace!(
            cwnd = decision.cwnd,
            pacing_rate = decision.pacing_rate,
            state = ?self.control.state(),
            in_flight = sample.in_flight,
            "decision"
        );
        Some(decision)
    }

    fn record_tick(&mut self, sample: &RateSample, now_us: u64) {
        let diag = &mut self.diagnostics;
        let segs_sent = sample.bytes_sent / u64::from(sample.mss);
        if self.last_decision_us > 0 {
            let elapsed = now_us.saturating_sub(self.last_decision_us);
            diag.last_elapsed_us = elapsed;
            diag.estimated_segs_sent = diag.estimated_segs_sent.saturating_add(
                self.pacing_rate.saturating_mul(elapsed) / USEC_PER_SEC / u64::from(sample.mss),
            );
            diag.tick_segs_sent = segs_sent.saturating_sub(diag.segs_sent);
            diag.tick_segs_delivered = sample.delivered_total.saturating_sub(diag.segs_delivered);
        }
        diag.segs_sent = segs_sent;
        diag.segs_delivered = sample.delivered_total;
        diag.ticks += 1;
    }

    /// Release the connection's state.
    pub fn release(self) {
        debug!(id = %self.id, ticks = self.diagnostics.ticks, "congestion controller released");
    }

    /// Diagnostic label.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Control law in use.
    #[must_use]
    pub const fn variant(&self) -> Variant {
        self.variant
    }

    /// How samples are grouped into intervals.
    #[must_use]
    pub const fn boundary_rule(&self) -> BoundaryRule {
        self.ingester.rule()
    }

    /// Current control state.
    #[must_use]
    pub const fn state(&self) -> ControlState {
        self.control.state()
    }

    /// Current beliefs.
    #[must_use]
    pub const fn beliefs(&self) -> &BeliefState {
        &self.beliefs
    }

    /// Smallest RTT observed so far.
    #[must_use]
    pub const fn min_rtt_us(&self) -> Option<u32> {
        self.min_rtt_us
    }

    /// Interval history.
    #[must_use]
    pub const fn history(&self) -> &IntervalHistory {
        &self.history
    }

    /// Last emitted decision.
    #[must_use]
    pub const fn last_decision(&self) -> Option<Decision> {
        self.last_decision
    }

    /// Diagnostics counters.
    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub(crate) const fn control(&self) -> &ControlStateMachine {
        &self.control
    }

    /// Read-only copy of the connection state for an observer.
    #[must_use]
    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot::capture(self, self.mss)
    }
}
