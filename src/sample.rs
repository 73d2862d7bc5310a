//! Boundary types exchanged with the host transport.

/// One delivery-rate measurement handed over by the host transport.
///
/// Counters are cumulative for the connection; `acked`/`lost` are the deltas
/// covered by this sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RateSample {
    /// Segments delivered over the sampling interval. Negative marks a stale sample.
    pub delivered: i64,
    /// Sampling interval length in microseconds. Negative marks a stale sample.
    pub interval_us: i64,
    /// Segments acknowledged (cumulatively or selectively) by this sample.
    pub acked: u32,
    /// Segments declared lost by this sample.
    pub lost: u32,
    /// Round-trip estimate in microseconds, if the host has one.
    pub rtt_us: Option<u32>,
    /// Sender was application-limited while this sample was taken.
    pub app_limited: bool,
    /// Total bytes sent on the connection.
    pub bytes_sent: u64,
    /// Total segments delivered on the connection.
    pub delivered_total: u64,
    /// Delivered counter at the sample's reference point, one RTT ago.
    pub prior_delivered: u64,
    /// Timestamp of the sample's reference point in microseconds.
    pub prior_timestamp_us: u64,
    /// Segments in flight when the sample was taken.
    pub in_flight: u32,
    /// Maximum segment size in bytes.
    pub mss: u32,
    /// Congestion window the host currently enforces, in segments.
    pub cwnd: u32,
    /// Next sequence number the host will send.
    pub snd_nxt: u32,
    /// End sequence of the most recently acknowledged segment.
    pub last_end_seq: u32,
}

impl RateSample {
    /// Whether the sample can be ingested at all.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.delivered >= 0 && self.interval_us >= 0 && self.mss > 0
    }
}

/// Advisory output for the host transport to enforce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decision {
    /// Target congestion window in segments.
    pub cwnd: u32,
    /// Target pacing rate in bytes per second.
    pub pacing_rate: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_fields_and_zero_mss_are_invalid() {
        let ok = RateSample {
            mss: 1448,
            ..Default::default()
        };
        assert!(ok.is_valid());
        assert!(
            !RateSample {
                delivered: -1,
                ..ok.clone()
            }
            .is_valid()
        );
        assert!(
            !RateSample {
                interval_us: -1,
                ..ok.clone()
            }
            .is_valid()
        );
        assert!(!RateSample { mss: 0, ..ok }.is_valid());
    }
}
