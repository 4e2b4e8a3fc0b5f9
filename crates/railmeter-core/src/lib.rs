//! # railmeter-core
//!
//! **Average the power rails of a Jetson board over a monitoring window.**
//!
//! `railmeter-core` launches a diagnostics tool (`tegrastats` by default),
//! extracts the device-specific power-rail readings from every line it
//! prints, and reports per-rail and total average power in milliwatts.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use railmeter_core::{SessionConfig, StopToken, measure, render};
//!
//! let config = SessionConfig {
//!     duration: Duration::from_secs(10),
//!     ..SessionConfig::default()
//! };
//! let result = measure("agx-orin", config, StopToken::new())
//!     .expect("tegrastats should be installed");
//! print!("{}", render(&result));
//! ```
//!
//! ## Architecture
//!
//! Schema → Session (spawn, read lines) → Extractor → Accumulator → Report
//!
//! - [`schema`] declares which rails each device family reports and how the
//!   values are encoded in a line.
//! - [`extract`] turns one line into a [`PartialReading`]; it is pure.
//! - [`session`] owns the child process, the clock, and the
//!   [`RunningAccumulator`]; the child is always torn down.
//! - [`report`] holds [`SessionResult`] and renders the text report.

pub mod accumulator;
pub mod error;
pub mod extract;
pub mod offline;
pub mod report;
pub mod schema;
pub mod session;

pub use accumulator::{RailTotals, RunningAccumulator, summarize};
pub use error::{MonitorError, Result};
pub use extract::{MalformedSample, PartialReading, SampleReading, extract};
pub use offline::summarize_reader;
pub use report::{RailSummary, RenderOptions, SessionResult, StopReason, render, render_with};
pub use schema::{
    DeviceInfo, DeviceSchema, LineConvention, RailSpec, known_tags, registered_devices, resolve,
};
pub use session::{
    DEFAULT_COMMAND, DEFAULT_DURATION, DEFAULT_KILL_GRACE, Session, SessionConfig, StopToken,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve `device` and run one session.
///
/// The device tag is resolved before anything is launched, so an unknown
/// tag never starts the diagnostics tool.
pub fn measure(device: &str, config: SessionConfig, stop: StopToken) -> Result<SessionResult> {
    let schema = resolve(device)?;
    Session::new(&schema, config).with_stop_token(stop).run()
}
