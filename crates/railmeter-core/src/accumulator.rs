//! Running per-rail sums and counts for one session.
//!
//! Individual readings are folded in and dropped, so memory stays constant
//! however long a session runs.

use std::time::Duration;

use crate::extract::PartialReading;
use crate::report::{RailSummary, SessionResult, StopReason};
use crate::schema::DeviceSchema;

/// Sum and count for one rail.
///
/// `sum` is the exact sum of the `count` values folded in. A value that
/// would overflow it is dropped with a warning and not counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RailTotals {
    pub name: String,
    pub sum: u64,
    pub count: u64,
}

/// Accumulated state for one session, rails in schema order.
#[derive(Debug, Clone)]
pub struct RunningAccumulator {
    device: String,
    rails: Vec<RailTotals>,
    lines_read: u64,
    samples: u64,
    malformed: u64,
}

impl RunningAccumulator {
    pub fn new(schema: &DeviceSchema) -> Self {
        Self {
            device: schema.tag().to_string(),
            rails: schema
                .rails()
                .iter()
                .map(|r| RailTotals {
                    name: r.name().to_string(),
                    sum: 0,
                    count: 0,
                })
                .collect(),
            lines_read: 0,
            samples: 0,
            malformed: 0,
        }
    }

    /// Fold one line's reading. Every line read must be folded, including
    /// empty ones, so `lines_read` stays an upper bound on every rail count.
    pub fn fold(&mut self, reading: &PartialReading) {
        self.lines_read += 1;
        self.malformed += reading.malformed().len() as u64;
        if reading.is_empty() {
            return;
        }
        self.samples += 1;
        for (totals, value) in self.rails.iter_mut().zip(reading.values()) {
            let Some(mw) = *value else { continue };
            match totals.sum.checked_add(mw) {
                Some(sum) => {
                    totals.sum = sum;
                    totals.count += 1;
                }
                None => log::warn!(
                    "dropping {} reading of {mw} mW: running sum would overflow",
                    totals.name
                ),
            }
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn rails(&self) -> &[RailTotals] {
        &self.rails
    }

    /// Totals for a rail by name.
    pub fn rail(&self, name: &str) -> Option<&RailTotals> {
        self.rails.iter().find(|r| r.name == name)
    }

    /// Lines consumed, including blank and unmatched ones.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Lines that produced at least one rail value.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn malformed(&self) -> u64 {
        self.malformed
    }
}

/// Turn accumulated totals into a [`SessionResult`].
///
/// Rails that never produced a value report an average of zero with
/// `has_data == false`. The total is the sum of per-rail averages.
pub fn summarize(acc: &RunningAccumulator, elapsed: Duration, stop: StopReason) -> SessionResult {
    let rails: Vec<RailSummary> = acc
        .rails
        .iter()
        .map(|t| RailSummary {
            name: t.name.clone(),
            sum_mw: t.sum,
            count: t.count,
            average_mw: if t.count > 0 {
                t.sum as f64 / t.count as f64
            } else {
                0.0
            },
            has_data: t.count > 0,
        })
        .collect();
    let total_average_mw = rails.iter().map(|r| r.average_mw).sum();

    SessionResult {
        device: acc.device.clone(),
        rails,
        total_average_mw,
        sample_count: acc.samples,
        lines_read: acc.lines_read,
        malformed_count: acc.malformed,
        elapsed_ms: elapsed.as_millis() as u64,
        stop_reason: stop,
        empty: acc.samples == 0,
        stderr_tail: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;
    use crate::schema::resolve;

    const FULL: &str = "VDD_GPU_SOC 500mW/500mW VDD_CPU_CV 300mW/300mW \
                        VIN_SYS_5V0 200mW/200mW VDDQ_VDD2_1V8AO 100mW/100mW";
    const NO_VDDQ: &str = "VDD_GPU_SOC 700mW/600mW VDD_CPU_CV 300mW/300mW \
                           VIN_SYS_5V0 200mW/200mW";

    fn fold_lines(lines: &[&str]) -> RunningAccumulator {
        let schema = resolve("agx-orin").unwrap();
        let mut acc = RunningAccumulator::new(&schema);
        for line in lines {
            acc.fold(&extract(&schema, line));
        }
        acc
    }

    #[test]
    fn three_identical_lines() {
        let acc = fold_lines(&[FULL, FULL, FULL]);
        let result = summarize(&acc, Duration::from_secs(3), StopReason::WindowElapsed);
        let averages: Vec<f64> = result.rails.iter().map(|r| r.average_mw).collect();
        assert_eq!(averages, vec![500.0, 300.0, 200.0, 100.0]);
        assert!((result.total_average_mw - 1100.0).abs() < 1e-9);
        assert_eq!(result.sample_count, 3);
        assert!(!result.empty);
    }

    #[test]
    fn rails_are_counted_independently() {
        let acc = fold_lines(&[FULL, NO_VDDQ, FULL]);
        assert_eq!(acc.rail("VDD_GPU_SOC").unwrap().count, 3);
        assert_eq!(acc.rail("VDDQ_VDD2_1V8AO").unwrap().count, 2);

        let result = summarize(&acc, Duration::from_secs(3), StopReason::WindowElapsed);
        let vddq = result.rail("VDDQ_VDD2_1V8AO").unwrap();
        assert_eq!(vddq.count, 2);
        assert!((vddq.average_mw - 100.0).abs() < 1e-9);
        let gpu = result.rail("VDD_GPU_SOC").unwrap();
        assert!((gpu.average_mw - 1700.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn counts_never_exceed_lines_read() {
        let acc = fold_lines(&[FULL, "", "tegrastats banner", NO_VDDQ, "VDD_GPU_SOC xmW/1mW"]);
        assert_eq!(acc.lines_read(), 5);
        assert_eq!(acc.samples(), 2);
        assert_eq!(acc.malformed(), 1);
        for rail in acc.rails() {
            assert!(rail.count <= acc.lines_read());
        }
        assert_eq!(acc.rail("VDD_GPU_SOC").unwrap().sum, 1200);
    }

    #[test]
    fn overflowing_value_is_dropped_not_clamped() {
        let huge = format!("VDD_GPU_SOC {}mW/1mW VDD_CPU_CV 300mW/300mW", u64::MAX);
        let acc = fold_lines(&[FULL, &huge]);
        let gpu = acc.rail("VDD_GPU_SOC").unwrap();
        assert_eq!(gpu.sum, 500);
        assert_eq!(gpu.count, 1);
        let cpu = acc.rail("VDD_CPU_CV").unwrap();
        assert_eq!(cpu.sum, 600);
        assert_eq!(cpu.count, 2);
    }

    #[test]
    fn zero_samples_summarize_to_no_data() {
        let acc = fold_lines(&["", "nothing to see"]);
        let result = summarize(&acc, Duration::from_secs(10), StopReason::WindowElapsed);
        assert!(result.empty);
        assert_eq!(result.sample_count, 0);
        assert_eq!(result.lines_read, 2);
        assert_eq!(result.total_average_mw, 0.0);
        for rail in &result.rails {
            assert_eq!(rail.average_mw, 0.0);
            assert!(!rail.has_data);
        }
    }

    #[test]
    fn new_accumulator_matches_schema_order() {
        let schema = resolve("xavier").unwrap();
        let acc = RunningAccumulator::new(&schema);
        let names: Vec<&str> = acc.rails().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["GPU", "CPU", "SOC", "CV", "VDDRQ", "SYS5V"]);
        assert_eq!(acc.device(), "xavier");
        assert_eq!(acc.lines_read(), 0);
    }
}
