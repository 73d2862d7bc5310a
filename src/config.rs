//! Tunables for the interval history, belief estimator, and control laws.

use crate::error::{Error, Result};

/// Integer ratio applied as `value * numer / denom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ratio {
    /// Numerator.
    pub numer: u64,
    /// Denominator, must be non-zero.
    pub denom: u64,
}

impl Ratio {
    /// Build a ratio.
    #[must_use]
    pub const fn new(numer: u64, denom: u64) -> Self {
        Self { numer, denom }
    }

    /// Scale `value` by this ratio, saturating on overflow.
    #[must_use]
    pub const fn apply(self, value: u64) -> u64 {
        value.saturating_mul(self.numer) / self.denom
    }
}

/// Control law driving the rate/window decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Variant {
    /// Full belief-tracking law: intervals follow the decision cadence,
    /// `min_c_lambda` decays on timeout, drains by shrinking the window.
    #[default]
    Ccmatic,
    /// Reduced belief-tracking law: wall-clock intervals, monotone
    /// `min_c_lambda`, drains by cutting the pacing rate.
    SlowPaced,
    /// Explicit additive-increase / multiplicative-decrease window law.
    Aimd,
}

impl Variant {
    /// Whether this law consumes capacity beliefs.
    #[must_use]
    pub const fn tracks_beliefs(self) -> bool {
        !matches!(self, Self::Aimd)
    }
}

/// Shape of the interval arena.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HistoryConfig {
    /// Number of interval slots; must be a power of two.
    pub depth: usize,
    /// Windowed totals cover `history_periods * min_rtt`.
    pub history_periods: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            depth: 16,
            history_periods: 8,
        }
    }
}

/// Belief estimator parameters. Rates are in segments per second.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BeliefConfig {
    /// Starting (and scan seed) value for `min_c` and `min_c_lambda`.
    pub init_min_c: u64,
    /// Starting (and scan seed) value for `max_c`; roughly 1.2 Gbps at 1448 MSS.
    pub init_max_c: u64,
    /// Absolute floor for `max_c`, before the alpha-rate floor is applied.
    pub max_c_floor: u64,
    /// Tolerable loss rate in 1/1024ths.
    pub loss_threshold: u64,
    /// Timeout correction runs once per `timeout_periods * min_rtt`.
    pub timeout_periods: u32,
    /// A bound has moved significantly when it changed by more than this percentage.
    pub significant_change_percent: u64,
    /// Growth allowance for `max_c` when it is reset at a timeout.
    pub max_c_relaxation: Ratio,
    /// Shrink factor for `min_c_lambda` at a timeout with no better evidence.
    pub lambda_decay: Ratio,
}

impl Default for BeliefConfig {
    fn default() -> Self {
        Self {
            init_min_c: 1,
            init_max_c: 100_000,
            max_c_floor: 1,
            loss_threshold: 64,
            timeout_periods: 12,
            significant_change_percent: 110,
            max_c_relaxation: Ratio::new(3, 2),
            lambda_decay: Ratio::new(2, 3),
        }
    }
}

/// Per-connection controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerConfig {
    /// Control law.
    pub variant: Variant,
    /// Interval arena shape.
    pub history: HistoryConfig,
    /// Belief estimator parameters.
    pub beliefs: BeliefConfig,
    /// Minimum-progress allowance in segments; also the window floor.
    pub alpha_segments: u32,
    /// Window floor for the AIMD law.
    pub min_cwnd: u32,
    /// In congestion avoidance, drain once in-flight exceeds this many alpha segments.
    pub drain_inflight_multiplier: u32,
    /// Optional upper bound on the per-connection state footprint in bytes.
    pub state_budget: Option<usize>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::ccmatic()
    }
}

impl ControllerConfig {
    /// Full belief-tracking law.
    #[must_use]
    pub fn ccmatic() -> Self {
        Self {
            variant: Variant::Ccmatic,
            history: HistoryConfig::default(),
            beliefs: BeliefConfig::default(),
            alpha_segments: 5,
            min_cwnd: 2,
            drain_inflight_multiplier: 2,
            state_budget: None,
        }
    }

    /// Reduced belief-tracking law.
    #[must_use]
    pub fn slow_paced() -> Self {
        Self {
            variant: Variant::SlowPaced,
            beliefs: BeliefConfig {
                init_min_c: 0,
                max_c_floor: 2,
                ..BeliefConfig::default()
            },
            // we are okay losing 10 alpha segments every probe
            drain_inflight_multiplier: 10,
            ..Self::ccmatic()
        }
    }

    /// Explicit AIMD law over a two-RTT history.
    #[must_use]
    pub fn aimd() -> Self {
        Self {
            variant: Variant::Aimd,
            history: HistoryConfig {
                depth: 16,
                history_periods: 2,
            },
            ..Self::ccmatic()
        }
    }

    /// Check construction-time invariants.
    pub fn validate(&self) -> Result<()> {
        let depth = self.history.depth;
        if !depth.is_power_of_two() {
            return Err(Error::HistoryDepthNotPowerOfTwo { depth });
        }
        if self.history.history_periods == 0 {
            return Err(Error::ZeroParameter {
                name: "history_periods",
            });
        }
        // the factor of 2 gives headroom so the windowed totals always have enough history
        let needed = usize::try_from(self.history.history_periods)
            .unwrap_or(usize::MAX)
            .saturating_mul(2);
        if depth < needed {
            return Err(Error::HistoryTooShallow {
                depth,
                history_periods: self.history.history_periods,
            });
        }
        let threshold = self.beliefs.loss_threshold;
        if threshold == 0 || threshold >= 1024 {
            return Err(Error::LossThresholdOutOfRange { threshold });
        }
        let non_zero = [
            ("alpha_segments", u64::from(self.alpha_segments)),
            ("min_cwnd", u64::from(self.min_cwnd)),
            ("timeout_periods", u64::from(self.beliefs.timeout_periods)),
            ("max_c_relaxation.denom", self.beliefs.max_c_relaxation.denom),
            ("lambda_decay.denom", self.beliefs.lambda_decay.denom),
        ];
        if let Some(&(name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(Error::ZeroParameter { name });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        ControllerConfig::ccmatic().validate().unwrap();
        ControllerConfig::slow_paced().validate().unwrap();
        ControllerConfig::aimd().validate().unwrap();
    }

    #[test]
    fn rejects_non_power_of_two_depth() {
        let mut config = ControllerConfig::default();
        config.history.depth = 12;
        assert_eq!(
            config.validate(),
            Err(Error::HistoryDepthNotPowerOfTwo { depth: 12 })
        );
        config.history.depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_shallow_history() {
        let mut config = ControllerConfig::default();
        config.history.depth = 8;
        assert_eq!(
            config.validate(),
            Err(Error::HistoryTooShallow {
                depth: 8,
                history_periods: 8
            })
        );
    }

    #[test]
    fn rejects_bad_loss_threshold_and_zeroes() {
        let mut config = ControllerConfig::default();
        config.beliefs.loss_threshold = 1024;
        assert!(matches!(
            config.validate(),
            Err(Error::LossThresholdOutOfRange { threshold: 1024 })
        ));

        let mut config = ControllerConfig::default();
        config.beliefs.lambda_decay = Ratio::new(2, 0);
        assert_eq!(
            config.validate(),
            Err(Error::ZeroParameter {
                name: "lambda_decay.denom"
            })
        );
    }

    #[test]
    fn ratio_applies_with_integer_math() {
        assert_eq!(Ratio::new(3, 2).apply(1001), 1501);
        assert_eq!(Ratio::new(2, 3).apply(10), 6);
        assert_eq!(Ratio::new(3, 2).apply(u64::MAX), u64::MAX / 2);
    }
}
