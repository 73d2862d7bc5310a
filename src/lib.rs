//! RoCC - rate-based congestion control driven by link-capacity beliefs
//!
//! This library turns the delivery-rate samples a transport already collects
//! into pacing-rate and congestion-window decisions. Each connection keeps a
//! short ring of measurement intervals, derives bounds on the bottleneck
//! capacity and queuing delay from it, and runs a two-state control law on
//! those bounds.
//!
//! # Quick Start
//!
//! ```rust
//! use rocc::{ConnectionIds, Controller, ControllerConfig, RateSample};
//!
//! let ids = ConnectionIds::new();
//! let mut cc = Controller::new(ControllerConfig::default(), &ids, 0)?;
//!
//! let sample = RateSample {
//!     acked: 1,
//!     rtt_us: Some(10_000),
//!     mss: 1448,
//!     ..RateSample::default()
//! };
//! if let Some(decision) = cc.on_sample(&sample, 10_000) {
//!     assert!(decision.cwnd >= 5);
//! }
//! # Ok::<(), rocc::Error>(())
//! ```
//!
//! # Features
//!
//! - **Three control laws** - belief-driven `Ccmatic`, `SlowPaced` and a plain AIMD baseline
//! - **Fixed per-connection footprint** - the interval ring is sized once at creation
//! - **Structured diagnostics** - `tracing` events plus [`ControllerSnapshot`]
//! - **Optional serde** - enable the `serde` feature to serialize configs and snapshots

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod beliefs;
pub mod config;
pub mod control;
pub mod controller;
pub mod error;
pub mod history;
pub mod ingest;
pub mod sample;
pub mod snapshot;

pub use beliefs::{BeliefEstimator, BeliefState, PathContext};
pub use config::{BeliefConfig, ControllerConfig, HistoryConfig, Ratio, Variant};
pub use control::{ControlState, ControlStateMachine, TickInput};
pub use controller::{ConnectionId, ConnectionIds, Controller, Diagnostics};
pub use error::{Error, Result};
pub use history::{Interval, IntervalHistory, WindowTotals};
pub use ingest::{BoundaryRule, Cadence, Ingested, RateSampleIngester};
pub use sample::{Decision, RateSample};
pub use snapshot::{ControllerSnapshot, IntervalSnapshot};

/// Algorithm name reported to hosts that register controllers by name
pub const NAME: &str = "rocc";
