//! Capacity and queuing-delay beliefs derived from the interval history.
//!
//! All rates are in segments per second, delays in microseconds. Each pass
//! runs once per interval boundary and uses the head interval's start as "now".

use crate::config::{BeliefConfig, Variant};
use crate::history::{Interval, IntervalHistory, USEC_PER_SEC};
use tracing::debug;

/// Current beliefs about the bottleneck link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BeliefState {
    /// Lower bound on link capacity.
    pub min_c: u64,
    /// Upper bound on link capacity.
    pub max_c: u64,
    /// Queuing delay above the RTT floor plus jitter.
    pub min_qdel_us: u64,
    /// Causal estimate of the rate the path sustains without loss or queuing.
    pub min_c_lambda: u64,
    /// Previous `min_c_lambda`, the last probe that did not cause utilization.
    pub last_min_c_lambda: u64,
    /// When the last timeout correction ran.
    pub last_timeout_us: u64,
    /// `min_c` right after the last timeout correction.
    pub last_timeout_min_c: u64,
    /// `max_c` right after the last timeout correction.
    pub last_timeout_max_c: u64,
}

impl BeliefState {
    /// Beliefs before any measurement.
    #[must_use]
    pub const fn new(config: &BeliefConfig) -> Self {
        Self {
            min_c: config.init_min_c,
            max_c: config.init_max_c,
            min_qdel_us: 0,
            min_c_lambda: config.init_min_c,
            last_min_c_lambda: config.init_min_c,
            last_timeout_us: 0,
            last_timeout_min_c: config.init_min_c,
            last_timeout_max_c: config.init_max_c,
        }
    }

    /// `max_c >= min_c`. May transiently fail before a timeout correction.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.max_c >= self.min_c
    }
}

/// Path parameters a belief pass needs from the current sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathContext {
    /// Smallest RTT observed so far; also used as the jitter margin.
    pub min_rtt_us: u32,
    /// Maximum segment size in bytes.
    pub mss: u32,
    /// Segments delivered on the connection so far.
    pub delivered_total: u64,
}

/// Recomputes [`BeliefState`] from an [`IntervalHistory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeliefEstimator {
    config: BeliefConfig,
    alpha_segments: u32,
    variant: Variant,
}

impl BeliefEstimator {
    /// Create an estimator.
    #[must_use]
    pub const fn new(config: BeliefConfig, alpha_segments: u32, variant: Variant) -> Self {
        Self {
            config,
            alpha_segments,
            variant,
        }
    }

    /// Parameters in use.
    #[must_use]
    pub const fn config(&self) -> &BeliefConfig {
        &self.config
    }

    /// Run both passes after an interval boundary.
    pub fn refresh(
        &self,
        beliefs: &mut BeliefState,
        history: &mut IntervalHistory,
        path: PathContext,
    ) {
        // the send pass must see the timeout bookkeeping before the capacity pass rewrites it
        self.update_beliefs_send(beliefs, history, path);
        self.update_beliefs(beliefs, history, path.min_rtt_us);
    }

    /// A timeout correction is due at `now_us`.
    #[must_use]
    pub fn timed_out(&self, beliefs: &BeliefState, now_us: u64, min_rtt_us: u32) -> bool {
        now_us.saturating_sub(beliefs.last_timeout_us)
            > u64::from(self.config.timeout_periods) * u64::from(min_rtt_us)
    }

    /// Lowest `max_c` the estimator allows: the configured floor or the alpha rate.
    ///
    /// The alpha rate is taken in segments per second (`alpha_segments` per
    /// `min_rtt`), the unit of `max_c`, not in bytes per second.
    #[must_use]
    pub fn max_c_floor(&self, min_rtt_us: u32) -> u64 {
        let alpha_rate =
            u64::from(self.alpha_segments) * USEC_PER_SEC / u64::from(min_rtt_us.max(1));
        self.config.max_c_floor.max(alpha_rate)
    }

    /// Update `min_qdel`, `min_c` and `max_c`.
    pub fn update_beliefs(
        &self,
        beliefs: &mut BeliefState,
        history: &IntervalHistory,
        min_rtt_us: u32,
    ) {
        let rtprop = u64::from(min_rtt_us);
        let jitter = rtprop;
        let high_delay_us = rtprop + jitter;
        let threshold = self.config.loss_threshold;

        let head = history.head();
        let now = head.start_us;
        let timeout = self.timed_out(beliefs, now, min_rtt_us);

        beliefs.min_qdel_us = match head.min_rtt_us {
            Some(rtt) if !head.invalid && u64::from(rtt) > high_delay_us => {
                u64::from(rtt) - high_delay_us
            }
            _ => 0,
        };

        let mut new_min_c = self.config.init_min_c;
        let mut new_max_c = self.config.init_max_c;
        let mut cum_acked = 0u64;
        let mut cum_utilized = true;

        // the head has just started and holds too few samples
        for (age, interval) in history.iter().enumerate().skip(1) {
            if interval.invalid {
                break;
            }
            let window = now.saturating_sub(interval.start_us);
            let high_delay = interval
                .min_rtt_us
                .is_some_and(|rtt| u64::from(rtt) > high_delay_us);
            cum_utilized &= interval.loss_mode(threshold) || high_delay;
            cum_acked += u64::from(interval.acked);

            new_min_c = new_min_c.max(cum_acked.saturating_mul(USEC_PER_SEC) / (window + jitter));
            if cum_utilized && age > 1 {
                if let Some(span) = window.checked_sub(jitter).filter(|span| *span > 0) {
                    new_max_c = new_max_c.min(cum_acked.saturating_mul(USEC_PER_SEC) / span);
                }
            }
        }

        if timeout {
            self.timeout_correction(beliefs, new_min_c, new_max_c, now);
        } else {
            beliefs.min_c = beliefs.min_c.max(new_min_c);
            beliefs.max_c = beliefs.max_c.min(new_max_c);
        }
        beliefs.max_c = beliefs.max_c.max(self.max_c_floor(min_rtt_us));
    }

    fn timeout_correction(
        &self,
        beliefs: &mut BeliefState,
        new_min_c: u64,
        new_max_c: u64,
        now: u64,
    ) {
        let percent = self.config.significant_change_percent;
        let min_c_changed = new_min_c > beliefs.last_timeout_min_c;
        let max_c_changed = new_max_c < beliefs.last_timeout_max_c;
        let min_c_changed_significantly =
            new_min_c > percent.saturating_mul(beliefs.last_timeout_min_c) / 100;
        let max_c_changed_significantly =
            new_max_c.saturating_mul(percent) / 100 < beliefs.last_timeout_max_c;
        let invalid = new_max_c < new_min_c;
        let min_c_came_close = min_c_changed && invalid;
        let max_c_came_close = max_c_changed && invalid;
        let reset_min_c = !min_c_changed && (max_c_came_close || !max_c_changed_significantly);
        let reset_max_c = !max_c_changed && (min_c_came_close || !min_c_changed_significantly);

        beliefs.min_c = if reset_min_c {
            new_min_c
        } else {
            beliefs.min_c.max(new_min_c)
        };
        beliefs.max_c = if reset_max_c {
            self.config.max_c_relaxation.apply(beliefs.max_c).min(new_max_c)
        } else {
            beliefs.max_c.min(new_max_c)
        };

        debug!(
            now,
            reset_min_c,
            reset_max_c,
            min_c = beliefs.min_c,
            max_c = beliefs.max_c,
            "belief timeout correction"
        );
        beliefs.last_timeout_us = now;
        beliefs.last_timeout_min_c = beliefs.min_c;
        beliefs.last_timeout_max_c = beliefs.max_c;
    }

    /// Update `min_c_lambda` from intervals whose sends are confirmed delivered.
    pub fn update_beliefs_send(
        &self,
        beliefs: &mut BeliefState,
        history: &mut IntervalHistory,
        path: PathContext,
    ) {
        let rtprop = u64::from(path.min_rtt_us);
        let jitter = rtprop;
        let high_delay_us = rtprop + jitter;
        let threshold = self.config.loss_threshold;
        let mss = u64::from(path.mss.max(1));

        let head = *history.head();
        let now = head.start_us;
        let timeout = self.timed_out(beliefs, now, path.min_rtt_us);

        let mut cum_under_utilized = under_utilized(&head, threshold, high_delay_us);
        let mut new_min_c_lambda = self.config.init_min_c;

        // newest to oldest; each interval is paired with the one opened right after it
        for age in 1..history.depth() {
            let successor = *history.slot(age - 1);
            let interval = history.slot_mut(age);
            if interval.invalid {
                break;
            }
            cum_under_utilized &= under_utilized(interval, threshold, high_delay_us);

            if !self.confirmed(&successor, &head, path, mss) {
                continue;
            }
            if interval.processed {
                break;
            }
            interval.processed = true;
            if !cum_under_utilized {
                break;
            }

            let sent = successor.bytes_sent.saturating_sub(interval.bytes_sent);
            let length = successor.start_us.saturating_sub(interval.start_us);
            let lambda = sent.saturating_mul(USEC_PER_SEC) / mss / (length + jitter);
            new_min_c_lambda = new_min_c_lambda.max(lambda);
        }

        match self.variant {
            Variant::SlowPaced => {
                beliefs.min_c_lambda = beliefs.min_c_lambda.max(new_min_c_lambda);
            }
            Variant::Ccmatic | Variant::Aimd => {
                if new_min_c_lambda > beliefs.min_c_lambda {
                    beliefs.last_min_c_lambda = beliefs.min_c_lambda;
                    beliefs.min_c_lambda = new_min_c_lambda;
                } else if timeout {
                    // last_min_c_lambda is only ever demoted into, never raised here:
                    // new_min_c_lambda may itself have caused utilization
                    beliefs.min_c_lambda = if beliefs.min_c_lambda > beliefs.last_min_c_lambda {
                        beliefs.last_min_c_lambda.max(new_min_c_lambda)
                    } else {
                        self.config
                            .lambda_decay
                            .apply(beliefs.min_c_lambda)
                            .max(new_min_c_lambda)
                    };
                }
            }
        }
    }

    /// All bytes sent during the interval ending at `successor` are known delivered.
    fn confirmed(
        &self,
        successor: &Interval,
        head: &Interval,
        path: PathContext,
        mss: u64,
    ) -> bool {
        match self.variant {
            Variant::SlowPaced => successor.bytes_sent <= mss.saturating_mul(path.delivered_total),
            Variant::Ccmatic | Variant::Aimd => successor.delivered <= head.prior_delivered,
        }
    }
}

fn under_utilized(interval: &Interval, threshold: u64, high_delay_us: u64) -> bool {
    let high_delay = interval
        .max_rtt_us
        .is_some_and(|rtt| u64::from(rtt) > high_delay_us);
    !interval.loss_mode(threshold) && !high_delay
}
