mod common;

use common::SimLink;
use rocc::{BeliefState, ConnectionIds, ControlState, Controller, ControllerConfig, RateSample};

const RTT: u32 = 10_000;

fn ccmatic() -> Controller {
    Controller::new(ControllerConfig::ccmatic(), &ConnectionIds::new(), 0).unwrap()
}

#[test]
fn clean_link_converges_min_c_and_keeps_ceiling() {
    let mut cc = ccmatic();
    let mut link = SimLink::new(RTT, 1, 0);
    let decisions = link.drive(&mut cc, 1_000);

    // one decision per RTT
    assert_eq!(decisions.len(), 100);

    let beliefs = cc.beliefs();
    assert!((900..=1_000).contains(&beliefs.min_c), "min_c = {}", beliefs.min_c);
    assert_eq!(beliefs.max_c, 100_000);
    assert_eq!(beliefs.min_qdel_us, 0);
    assert_eq!(cc.state(), ControlState::SlowStart);

    let last = decisions.last().unwrap();
    assert_eq!(last.pacing_rate, 2 * beliefs.min_c * 1_000);
    // 2 * max_c * (rtprop + jitter)
    assert_eq!(last.cwnd, 4_000);
}

#[test]
fn sustained_loss_tightens_max_c_and_enters_cong_avoid() {
    let mut cc = ccmatic();
    let mut link = SimLink::new(RTT, 1, 1);

    let first = loop {
        let sample = link.next_sample();
        if let Some(decision) = cc.on_sample(&sample, link.now_us) {
            break decision;
        }
    };
    assert_eq!(cc.state(), ControlState::CongAvoid);
    assert!(first.cwnd >= 5);

    let decisions = link.drive(&mut cc, 1_000);
    let beliefs = cc.beliefs();
    assert!((1_000..=1_100).contains(&beliefs.max_c), "max_c = {}", beliefs.max_c);
    assert!(beliefs.min_c <= beliefs.max_c);
    assert_eq!(cc.state(), ControlState::CongAvoid);

    let last = decisions.last().unwrap();
    assert_eq!(last.pacing_rate, 2 * beliefs.min_c_lambda * 1_000 + 500_000);
}

#[test]
fn backlog_in_cong_avoid_drains_through_cwnd() {
    let mut cc = ccmatic();
    let mut link = SimLink::new(RTT, 1, 1);
    link.in_flight = 20;

    let decisions = link.drive(&mut cc, 500);
    assert_eq!(cc.state(), ControlState::CongAvoid);
    assert!(decisions.iter().all(|decision| decision.cwnd == 5));
    assert!(decisions.iter().all(|decision| decision.pacing_rate >= 500_000));
}

#[test]
fn queuing_delay_throttles_slow_start() {
    let mut cc = ccmatic();
    let mut link = SimLink::new(RTT, 1, 0);
    link.drive(&mut cc, 200);

    link.rtt_us = 25_000;
    let decisions = link.drive(&mut cc, 100);

    let beliefs = cc.beliefs();
    assert_eq!(cc.min_rtt_us(), Some(RTT));
    assert_eq!(beliefs.min_qdel_us, 5_000);
    assert_eq!(cc.state(), ControlState::SlowStart);
    assert_eq!(decisions.last().unwrap().pacing_rate, beliefs.min_c * 1_000 / 2);
}

#[test]
fn missing_rtt_suspends_every_decision() {
    let config = ControllerConfig::ccmatic();
    let initial = BeliefState::new(&config.beliefs);
    let mut cc = Controller::new(config, &ConnectionIds::new(), 0).unwrap();
    let mut link = SimLink::new(RTT, 3, 1);

    for _ in 0..10_000 {
        let sample = RateSample {
            rtt_us: None,
            ..link.next_sample()
        };
        assert_eq!(cc.on_sample(&sample, link.now_us), None);
    }

    let snapshot = cc.snapshot();
    assert_eq!(snapshot.min_rtt_us, None);
    assert!(snapshot.intervals.is_empty());
    assert_eq!(snapshot.beliefs, initial);
    assert_eq!(snapshot.last_decision, None);
    assert_eq!(snapshot.diagnostics.ticks, 0);
}
