//! Read-only view of a controller for external observers.

use core::fmt;

use crate::beliefs::BeliefState;
use crate::config::Variant;
use crate::control::ControlState;
use crate::controller::{ConnectionId, Controller, Diagnostics};
use crate::history::{Interval, IntervalHistory};
use crate::ingest::BoundaryRule;
use crate::sample::Decision;

/// One populated interval, with deltas to the interval opened after it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntervalSnapshot {
    /// Start of the period.
    pub start_us: u64,
    /// Length until the next interval opened; `None` for the current one.
    pub window_us: Option<u64>,
    /// Segments acknowledged.
    pub acked: u32,
    /// Segments lost.
    pub lost: u32,
    /// Any sample was application-limited.
    pub app_limited: bool,
    /// Smallest RTT seen.
    pub min_rtt_us: Option<u32>,
    /// Largest RTT seen.
    pub max_rtt_us: Option<u32>,
    /// Sample reference timestamp at creation.
    pub prior_timestamp_us: u64,
    /// Sample reference delivered counter at creation.
    pub prior_delivered: u64,
    /// Bytes sent at creation.
    pub bytes_sent: u64,
    /// Segments delivered at creation.
    pub delivered: u64,
    /// Pacing rate at creation, segments per second.
    pub sending_rate: u64,
    /// Segments sent until the next interval opened.
    pub sent_segments: Option<u64>,
    /// Folded into `min_c_lambda`.
    pub processed: bool,
}

/// Owned copy of a controller's state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerSnapshot {
    /// Connection label.
    pub id: ConnectionId,
    /// Control law.
    pub variant: Variant,
    /// Interval grouping in use.
    pub boundary_rule: BoundaryRule,
    /// Control state.
    pub state: ControlState,
    /// Smallest RTT observed.
    pub min_rtt_us: Option<u32>,
    /// Beliefs and timeout bookkeeping.
    pub beliefs: BeliefState,
    /// Last emitted decision.
    pub last_decision: Option<Decision>,
    /// Sequence number of the last AIMD reduction.
    pub last_decrease_seq: u32,
    /// AIMD loss event pending.
    pub loss_happened: bool,
    /// Host counters.
    pub diagnostics: Diagnostics,
    /// Valid intervals, newest first.
    pub intervals: Vec<IntervalSnapshot>,
}

impl ControllerSnapshot {
    pub(crate) fn capture(controller: &Controller, mss: u32) -> Self {
        let control = controller.control();
        Self {
            id: controller.id(),
            variant: controller.variant(),
            boundary_rule: controller.boundary_rule(),
            state: controller.state(),
            min_rtt_us: controller.min_rtt_us(),
            beliefs: *controller.beliefs(),
            last_decision: controller.last_decision(),
            last_decrease_seq: control.last_decrease_seq(),
            loss_happened: control.loss_happened(),
            diagnostics: *controller.diagnostics(),
            intervals: intervals(controller.history(), mss),
        }
    }
}

fn intervals(history: &IntervalHistory, mss: u32) -> Vec<IntervalSnapshot> {
    let mut out = Vec::with_capacity(history.depth());
    let mut successor: Option<&Interval> = None;
    for interval in history.iter().take_while(|interval| !interval.invalid()) {
        let window_us = successor.map(|next| next.start_us().saturating_sub(interval.start_us()));
        let sent_segments = successor.filter(|_| mss > 0).map(|next| {
            next.bytes_sent().saturating_sub(interval.bytes_sent()) / u64::from(mss)
        });
        out.push(IntervalSnapshot {
            start_us: interval.start_us(),
            window_us,
            acked: interval.acked(),
            lost: interval.lost(),
            app_limited: interval.app_limited(),
            min_rtt_us: interval.min_rtt_us(),
            max_rtt_us: interval.max_rtt_us(),
            prior_timestamp_us: interval.prior_timestamp_us,
            prior_delivered: interval.prior_delivered,
            bytes_sent: interval.bytes_sent(),
            delivered: interval.delivered(),
            sending_rate: interval.sending_rate,
            sent_segments,
            processed: interval.processed(),
        });
        successor = Some(interval);
    }
    out
}

impl fmt::Display for ControllerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} state={:?} min_c={} max_c={} min_qdel={}us min_c_lambda={} intervals={}",
            self.id,
            self.variant,
            self.state,
            self.beliefs.min_c,
            self.beliefs.max_c,
            self.beliefs.min_qdel_us,
            self.beliefs.min_c_lambda,
            self.intervals.len()
        )?;
        match self.min_rtt_us {
            Some(rtt) => write!(f, " min_rtt={rtt}us")?,
            None => write!(f, " min_rtt=unknown")?,
        }
        if let Some(decision) = self.last_decision {
            write!(
                f,
                " cwnd={} pacing={}Bps",
                decision.cwnd, decision.pacing_rate
            )?;
        }
        Ok(())
    }
}
