//! Summarize a captured diagnostics log without launching anything.
//!
//! Useful for logs collected with `tegrastats --logfile` or piped through
//! `tee`, and for replaying output in tests.

use std::io::BufRead;
use std::time::Duration;

use crate::accumulator::{RunningAccumulator, summarize};
use crate::error::Result;
use crate::report::{SessionResult, StopReason};
use crate::schema::DeviceSchema;
use crate::session::ingest_line;

/// Fold every line of `reader` and summarize.
///
/// Elapsed time is zero, since a log carries no reliable wall-clock span.
pub fn summarize_reader<R: BufRead>(schema: &DeviceSchema, mut reader: R) -> Result<SessionResult> {
    let mut acc = RunningAccumulator::new(schema);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        ingest_line(schema, &mut acc, &String::from_utf8_lossy(&buf));
    }
    Ok(summarize(&acc, Duration::ZERO, StopReason::InputExhausted))
}
