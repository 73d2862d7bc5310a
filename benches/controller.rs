//! Per-sample controller benchmarks
//!
//! Measures the cost of ingesting a rate sample, with and without a belief refresh.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rocc::{ConnectionIds, Controller, ControllerConfig, RateSample};

fn sample(now_us: u64) -> RateSample {
    let delivered_total = now_us / 1_000;
    RateSample {
        delivered: 1,
        interval_us: 1_000,
        acked: 1,
        lost: u32::from(now_us % 7_000 == 0),
        rtt_us: Some(10_000 + (now_us % 3_000) as u32),
        bytes_sent: delivered_total * 1_448,
        delivered_total,
        prior_delivered: delivered_total.saturating_sub(10),
        prior_timestamp_us: now_us.saturating_sub(10_000),
        in_flight: 8,
        mss: 1_448,
        cwnd: 10,
        ..RateSample::default()
    }
}

/// Benchmark steady-state sample ingestion per control law
fn bench_on_sample(c: &mut Criterion) {
    let mut group = c.benchmark_group("on_sample");
    group.throughput(Throughput::Elements(1));

    let configs = [
        ("ccmatic", ControllerConfig::ccmatic()),
        ("slow_paced", ControllerConfig::slow_paced()),
        ("aimd", ControllerConfig::aimd()),
    ];
    for (name, config) in configs {
        group.bench_with_input(BenchmarkId::from_parameter(name), &config, |b, config| {
            let ids = ConnectionIds::new();
            let mut cc = Controller::new(config.clone(), &ids, 0).unwrap();
            let mut now_us = 0;
            b.iter(|| {
                now_us += 1_000;
                black_box(cc.on_sample(black_box(&sample(now_us)), now_us));
            });
        });
    }

    group.finish();
}

/// Benchmark a full belief refresh over a populated history
fn bench_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("belief_refresh");

    for depth in [16usize, 64, 256] {
        let config = ControllerConfig {
            history: rocc::HistoryConfig {
                depth,
                history_periods: 8,
            },
            ..ControllerConfig::ccmatic()
        };
        group.bench_with_input(BenchmarkId::from_parameter(depth), &config, |b, config| {
            let ids = ConnectionIds::new();
            let mut cc = Controller::new(config.clone(), &ids, 0).unwrap();
            let mut now_us = 0;
            // warm the ring so every refresh scans the full depth
            for _ in 0..depth * 20 {
                now_us += 1_000;
                cc.on_sample(&sample(now_us), now_us);
            }
            b.iter(|| {
                // every sample lands on a decision tick
                now_us += 10_000;
                black_box(cc.on_sample(black_box(&sample(now_us)), now_us));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_on_sample, bench_refresh);
criterion_main!(benches);
