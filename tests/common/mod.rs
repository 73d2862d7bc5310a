#![allow(dead_code)]

use std::collections::VecDeque;

use rocc::{Controller, Decision, RateSample};

#[derive(Default)]
pub struct Lcg(u64);

impl Lcg {
    pub fn next(&mut self) -> u64 {
        const A: u64 = 6364136223846793005;
        const C: u64 = 1442695040888963407;
        self.0 = self.0.wrapping_mul(A).wrapping_add(C);
        self.0
    }
}

#[derive(Clone, Copy)]
struct Mark {
    at_us: u64,
    delivered: u64,
    snd_nxt: u32,
}

/// Deterministic bottleneck feeding one rate sample per step.
///
/// Every step acknowledges `acked_per_step` segments and loses
/// `lost_per_step`. The sample's reference point and last acknowledged
/// sequence lag one RTT behind, as a real sender's would.
pub struct SimLink {
    pub now_us: u64,
    pub step_us: u64,
    pub rtt_us: u32,
    pub jitter_us: u32,
    pub mss: u32,
    pub acked_per_step: u32,
    pub lost_per_step: u32,
    pub in_flight: u32,
    pub app_limited: bool,
    pub cwnd: u32,
    rng: Lcg,
    delivered_total: u64,
    bytes_sent: u64,
    snd_nxt: u32,
    marks: VecDeque<Mark>,
}

impl SimLink {
    pub fn new(rtt_us: u32, acked_per_step: u32, lost_per_step: u32) -> Self {
        Self {
            now_us: 0,
            step_us: 1_000,
            rtt_us,
            jitter_us: 0,
            mss: 1_000,
            acked_per_step,
            lost_per_step,
            in_flight: 4,
            app_limited: false,
            cwnd: 10,
            rng: Lcg(7),
            delivered_total: 0,
            bytes_sent: 0,
            snd_nxt: 0,
            marks: VecDeque::new(),
        }
    }

    pub fn with_jitter(mut self, seed: u64, jitter_us: u32) -> Self {
        self.rng = Lcg(seed);
        self.jitter_us = jitter_us;
        self
    }

    pub fn next_sample(&mut self) -> RateSample {
        self.now_us += self.step_us;
        let segments = self.acked_per_step + self.lost_per_step;
        self.delivered_total += u64::from(self.acked_per_step);
        self.bytes_sent += u64::from(segments) * u64::from(self.mss);
        self.snd_nxt = self.snd_nxt.wrapping_add(segments * self.mss);
        self.marks.push_back(Mark {
            at_us: self.now_us,
            delivered: self.delivered_total,
            snd_nxt: self.snd_nxt,
        });
        while self
            .marks
            .get(1)
            .is_some_and(|mark| mark.at_us + u64::from(self.rtt_us) <= self.now_us)
        {
            self.marks.pop_front();
        }
        let prior = self.marks[0];

        let jitter = if self.jitter_us == 0 {
            0
        } else {
            (self.rng.next() % u64::from(self.jitter_us)) as u32
        };
        RateSample {
            delivered: i64::from(self.acked_per_step),
            interval_us: self.step_us as i64,
            acked: self.acked_per_step,
            lost: self.lost_per_step,
            rtt_us: Some(self.rtt_us + jitter),
            app_limited: self.app_limited,
            bytes_sent: self.bytes_sent,
            delivered_total: self.delivered_total,
            prior_delivered: prior.delivered,
            prior_timestamp_us: prior.at_us,
            in_flight: self.in_flight,
            mss: self.mss,
            cwnd: self.cwnd,
            snd_nxt: self.snd_nxt,
            last_end_seq: prior.snd_nxt,
        }
    }

    /// Feed `steps` samples, enforcing every decision on the link.
    pub fn drive(&mut self, cc: &mut Controller, steps: usize) -> Vec<Decision> {
        let mut decisions = Vec::new();
        for _ in 0..steps {
            let sample = self.next_sample();
            if let Some(decision) = cc.on_sample(&sample, self.now_us) {
                self.cwnd = decision.cwnd;
                decisions.push(decision);
            }
        }
        decisions
    }
}
