//! Fixed-depth circular history of per-period measurement summaries.

use crate::sample::RateSample;

pub(crate) const USEC_PER_SEC: u64 = 1_000_000;

/// Loss rate above `threshold / 1024`.
#[must_use]
pub(crate) fn loss_mode(acked: u64, lost: u64, threshold: u64) -> bool {
    lost.saturating_mul(1024) > acked.saturating_add(lost).saturating_mul(threshold)
}

/// Summary of one measurement period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub(crate) start_us: u64,
    pub(crate) acked: u32,
    pub(crate) lost: u32,
    pub(crate) app_limited: bool,
    pub(crate) min_rtt_us: Option<u32>,
    pub(crate) max_rtt_us: Option<u32>,

    // counters captured when the interval opened
    pub(crate) prior_timestamp_us: u64,
    pub(crate) prior_delivered: u64,
    pub(crate) bytes_sent: u64,
    pub(crate) delivered: u64,
    pub(crate) sending_rate: u64,

    pub(crate) processed: bool,
    pub(crate) invalid: bool,
}

impl Interval {
    const EMPTY: Self = Self {
        start_us: 0,
        acked: 0,
        lost: 0,
        app_limited: false,
        min_rtt_us: None,
        max_rtt_us: None,
        prior_timestamp_us: 0,
        prior_delivered: 0,
        bytes_sent: 0,
        delivered: 0,
        sending_rate: 0,
        processed: false,
        invalid: true,
    };

    fn open(now_us: u64, sample: &RateSample, sending_rate: u64) -> Self {
        Self {
            start_us: now_us,
            acked: sample.acked,
            lost: sample.lost,
            app_limited: sample.app_limited,
            min_rtt_us: sample.rtt_us,
            max_rtt_us: sample.rtt_us,
            prior_timestamp_us: sample.prior_timestamp_us,
            prior_delivered: sample.prior_delivered,
            bytes_sent: sample.bytes_sent,
            delivered: sample.delivered_total,
            sending_rate,
            processed: false,
            invalid: false,
        }
    }

    fn merge(&mut self, sample: &RateSample) {
        self.acked = self.acked.saturating_add(sample.acked);
        self.lost = self.lost.saturating_add(sample.lost);
        self.app_limited |= sample.app_limited;
        if let Some(rtt) = sample.rtt_us {
            self.min_rtt_us = Some(self.min_rtt_us.map_or(rtt, |min| min.min(rtt)));
            self.max_rtt_us = Some(self.max_rtt_us.map_or(rtt, |max| max.max(rtt)));
        }
    }

    /// Start of the period in microseconds.
    #[must_use]
    pub const fn start_us(&self) -> u64 {
        self.start_us
    }

    /// Segments acknowledged during the period.
    #[must_use]
    pub const fn acked(&self) -> u32 {
        self.acked
    }

    /// Segments lost during the period.
    #[must_use]
    pub const fn lost(&self) -> u32 {
        self.lost
    }

    /// Any sample in the period was application-limited.
    #[must_use]
    pub const fn app_limited(&self) -> bool {
        self.app_limited
    }

    /// Smallest RTT seen in the period.
    #[must_use]
    pub const fn min_rtt_us(&self) -> Option<u32> {
        self.min_rtt_us
    }

    /// Largest RTT seen in the period.
    #[must_use]
    pub const fn max_rtt_us(&self) -> Option<u32> {
        self.max_rtt_us
    }

    /// Bytes sent on the connection when the period opened.
    #[must_use]
    pub const fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Segments delivered on the connection when the period opened.
    #[must_use]
    pub const fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Already folded into `min_c_lambda`.
    #[must_use]
    pub const fn processed(&self) -> bool {
        self.processed
    }

    /// Slot never populated.
    #[must_use]
    pub const fn invalid(&self) -> bool {
        self.invalid
    }

    pub(crate) fn loss_mode(&self, threshold: u64) -> bool {
        loss_mode(u64::from(self.acked), u64::from(self.lost), threshold)
    }
}

/// Packet totals over the most recent history window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowTotals {
    /// Segments acknowledged.
    pub acked: u64,
    /// Segments lost.
    pub lost: u64,
    /// Any interval in the window was application-limited.
    pub app_limited: bool,
}

impl WindowTotals {
    /// Loss rate over the window exceeds `threshold / 1024`.
    #[must_use]
    pub fn loss_mode(&self, threshold: u64) -> bool {
        loss_mode(self.acked, self.lost, threshold)
    }
}

/// Circular arena of intervals addressed relative to the newest one.
///
/// Age 0 is the current interval; age `depth - 1` is the oldest slot, which the
/// next [`IntervalHistory::advance`] reuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalHistory {
    slots: Box<[Interval]>,
    head: usize,
    mask: usize,
}

impl IntervalHistory {
    /// Allocate `depth` invalid slots. `depth` must be a power of two; callers
    /// validate it through [`ControllerConfig::validate`](crate::ControllerConfig::validate).
    #[must_use]
    pub(crate) fn new(depth: usize) -> Self {
        debug_assert!(depth.is_power_of_two());
        Self {
            slots: vec![Interval::EMPTY; depth].into_boxed_slice(),
            head: 0,
            mask: depth - 1,
        }
    }

    /// Bytes held by a history of `depth` slots.
    #[must_use]
    pub const fn footprint(depth: usize) -> usize {
        size_of::<Self>() + depth * size_of::<Interval>()
    }

    /// Number of slots.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// The interval currently being merged into.
    #[must_use]
    pub fn head(&self) -> &Interval {
        self.slot(0)
    }

    /// Interval `age` periods older than the head.
    #[must_use]
    pub fn slot(&self, age: usize) -> &Interval {
        &self.slots[(self.head + age) & self.mask]
    }

    pub(crate) fn slot_mut(&mut self, age: usize) -> &mut Interval {
        &mut self.slots[(self.head + age) & self.mask]
    }

    /// All slots, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Interval> + '_ {
        (0..self.depth()).map(|age| self.slot(age))
    }

    /// Open a new current interval in the oldest slot.
    pub(crate) fn advance(&mut self, now_us: u64, sample: &RateSample, sending_rate: u64) {
        self.head = self.head.wrapping_sub(1) & self.mask;
        self.slots[self.head] = Interval::open(now_us, sample, sending_rate);
    }

    /// Fold a sample into the current interval.
    pub(crate) fn merge(&mut self, sample: &RateSample) {
        self.slot_mut(0).merge(sample);
    }

    /// Totals over intervals that started within `span_us` of `now_us`.
    ///
    /// The interval straddling the window edge is included. `None` means the
    /// span is unbounded.
    #[must_use]
    pub fn window_totals(&self, now_us: u64, span_us: Option<u64>) -> WindowTotals {
        let mut totals = WindowTotals::default();
        for interval in self.iter().take_while(|interval| !interval.invalid) {
            totals.acked += u64::from(interval.acked);
            totals.lost += u64::from(interval.lost);
            totals.app_limited |= interval.app_limited;
            if span_us.is_some_and(|span| interval.start_us.saturating_add(span) < now_us) {
                break;
            }
        }
        totals
    }
}
