//! Two-state control law mapping beliefs to a pacing rate and window.

use crate::beliefs::BeliefState;
use crate::config::{ControllerConfig, Variant};
use crate::history::{USEC_PER_SEC, WindowTotals};
use crate::sample::{Decision, RateSample};
use tracing::debug;

/// Control state. `CongAvoid` is terminal for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlState {
    /// Probing on `min_c` until sustained loss is seen.
    #[default]
    SlowStart,
    /// Pacing on the causal `min_c_lambda` estimate.
    CongAvoid,
}

/// Inputs of one decision tick.
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    /// Current beliefs.
    pub beliefs: &'a BeliefState,
    /// Sample that triggered the tick.
    pub sample: &'a RateSample,
    /// Windowed totals after ingesting the sample.
    pub totals: &'a WindowTotals,
    /// Smallest RTT observed so far.
    pub min_rtt_us: u32,
    /// Pacing rate emitted by the previous tick, in bytes per second.
    pub previous_rate: u64,
}

/// State machine plus the loss bookkeeping of the AIMD law.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlStateMachine {
    state: ControlState,
    variant: Variant,
    alpha_segments: u32,
    min_cwnd: u32,
    drain_inflight_multiplier: u32,
    loss_threshold: u64,
    last_decrease_seq: u32,
    loss_happened: bool,
}

impl ControlStateMachine {
    /// Start in `SlowStart`. The connection is considered to have just reduced at `snd_nxt`.
    #[must_use]
    pub const fn new(config: &ControllerConfig, snd_nxt: u32) -> Self {
        Self {
            state: ControlState::SlowStart,
            variant: config.variant,
            alpha_segments: config.alpha_segments,
            min_cwnd: config.min_cwnd,
            drain_inflight_multiplier: config.drain_inflight_multiplier,
            loss_threshold: config.beliefs.loss_threshold,
            last_decrease_seq: snd_nxt,
            loss_happened: false,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ControlState {
        self.state
    }

    /// Sequence number of the last AIMD reduction.
    #[must_use]
    pub const fn last_decrease_seq(&self) -> u32 {
        self.last_decrease_seq
    }

    /// A loss event is pending for the next AIMD tick.
    #[must_use]
    pub const fn loss_happened(&self) -> bool {
        self.loss_happened
    }

    /// Minimum-progress rate in bytes per second.
    #[must_use]
    pub fn alpha_rate(&self, mss: u32, min_rtt_us: u32) -> u64 {
        (u64::from(self.alpha_segments) * u64::from(mss)).saturating_mul(USEC_PER_SEC)
            / u64::from(min_rtt_us.max(1))
    }

    /// Evaluate the windowed loss signal after every sample.
    pub fn observe(&mut self, totals: &WindowTotals, sample: &RateSample) {
        let loss_mode = totals.loss_mode(self.loss_threshold);
        if loss_mode && self.state == ControlState::SlowStart {
            debug!(
                acked = totals.acked,
                lost = totals.lost,
                "entering congestion avoidance"
            );
            self.state = ControlState::CongAvoid;
        }
        if loss_mode && seq_after(sample.last_end_seq, self.last_decrease_seq) {
            self.loss_happened = true;
        }
    }

    /// Produce the decision for a tick.
    pub fn decide(&mut self, input: &TickInput<'_>) -> Decision {
        match self.variant {
            Variant::Ccmatic | Variant::SlowPaced => self.decide_beliefs(input),
            Variant::Aimd => self.decide_aimd(input),
        }
    }

    fn decide_beliefs(&self, input: &TickInput<'_>) -> Decision {
        let beliefs = input.beliefs;
        let mss = u64::from(input.sample.mss);
        let alpha = u64::from(self.alpha_segments);
        let alpha_rate = self.alpha_rate(input.sample.mss, input.min_rtt_us);

        // rtprop + jitter = 2 * min_rtt
        let round_trip = 2 * u64::from(input.min_rtt_us);
        let mut cwnd = beliefs.max_c.saturating_mul(round_trip).saturating_mul(2) / USEC_PER_SEC;
        let mut rate = input.previous_rate;

        match self.state {
            ControlState::SlowStart => {
                rate = if beliefs.min_qdel_us > 0 {
                    beliefs.min_c.saturating_mul(mss) / 2
                } else {
                    beliefs.min_c.saturating_mul(mss).saturating_mul(2)
                };
            }
            ControlState::CongAvoid => {
                let drain_above = u64::from(self.drain_inflight_multiplier) * alpha;
                if u64::from(input.sample.in_flight) > drain_above {
                    match self.variant {
                        Variant::SlowPaced => rate = alpha_rate,
                        // a very low pacing rate stretches the time to the next
                        // packet long past the next rate increase; drain via cwnd
                        _ => cwnd = alpha,
                    }
                } else {
                    rate = beliefs
                        .min_c_lambda
                        .saturating_mul(mss)
                        .saturating_mul(2)
                        .saturating_add(alpha_rate);
                }
            }
        }

        Decision {
            cwnd: u32::try_from(cwnd.max(alpha)).unwrap_or(u32::MAX),
            pacing_rate: rate.max(alpha_rate),
        }
    }

    fn decide_aimd(&mut self, input: &TickInput<'_>) -> Decision {
        let cwnd = input.sample.cwnd;
        let target = if self.loss_happened {
            self.last_decrease_seq = input.sample.snd_nxt;
            cwnd.saturating_sub(1)
        } else {
            let grown = (u64::from(cwnd) + input.totals.acked) / 2 + 1;
            u32::try_from(grown).unwrap_or(u32::MAX)
        };

        let next = if cwnd > target {
            // never shrink while application-limited
            let next = if input.totals.app_limited { cwnd } else { target };
            next.max(self.min_cwnd)
        } else {
            cwnd.saturating_add(1)
        };
        self.loss_happened = false;

        let rate = (u64::from(next) * u64::from(input.sample.mss)).saturating_mul(USEC_PER_SEC)
            / u64::from(input.min_rtt_us.max(1));
        Decision {
            cwnd: next,
            pacing_rate: rate,
        }
    }
}

/// `a` comes after `b` in wrapping sequence space.
#[allow(clippy::cast_possible_wrap)]
fn seq_after(a: u32, b: u32) -> bool {
    (b.wrapping_sub(a) as i32) < 0
}
