//! Line extraction: one line of diagnostics output in, one rail value per
//! schema rail out.
//!
//! Extraction never fails. A rail absent from the line is a miss; a rail whose
//! captured value is not a non-negative integer is a miss plus a
//! [`MalformedSample`] that the caller logs and counts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::schema::DeviceSchema;

/// A rail whose pattern matched but whose value did not parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedSample {
    pub rail: String,
    pub raw: String,
}

impl std::fmt::Display for MalformedSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rail {} has non-numeric value '{}'", self.rail, self.raw)
    }
}

/// Result of extracting one line against a schema.
///
/// `values` holds one slot per schema rail, in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialReading {
    values: Vec<Option<u64>>,
    malformed: Vec<MalformedSample>,
}

impl PartialReading {
    /// Reading with every rail missing.
    pub fn empty(rail_count: usize) -> Self {
        Self {
            values: vec![None; rail_count],
            malformed: Vec::new(),
        }
    }

    /// Per-rail milliwatt values in schema order.
    pub fn values(&self) -> &[Option<u64>] {
        &self.values
    }

    /// Value for a rail by position.
    pub fn value(&self, index: usize) -> Option<u64> {
        self.values.get(index).copied().flatten()
    }

    /// Value for a rail by name.
    pub fn get(&self, schema: &DeviceSchema, rail: &str) -> Option<u64> {
        schema.index_of(rail).and_then(|i| self.value(i))
    }

    pub fn malformed(&self) -> &[MalformedSample] {
        &self.malformed
    }

    /// Number of rails with a value on this line.
    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// True when no rail produced a value.
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// True when every schema rail produced a value.
    pub fn is_complete(&self) -> bool {
        !self.values.is_empty() && self.values.iter().all(Option::is_some)
    }

    /// Sum of the rail values present on this line.
    pub fn line_total(&self) -> u64 {
        self.values.iter().flatten().sum()
    }
}

/// A successful reading stamped with its offset from session start.
#[derive(Debug, Clone)]
pub struct SampleReading {
    /// Monotonic time since the session started.
    pub elapsed: Duration,
    pub reading: PartialReading,
}

impl SampleReading {
    /// One-line summary of the present rails, e.g.
    /// `VDD_GPU_SOC 500 mW, VDD_CPU_CV 300 mW`.
    pub fn describe(&self, schema: &DeviceSchema) -> String {
        schema
            .rails()
            .iter()
            .zip(self.reading.values())
            .filter_map(|(rail, v)| v.map(|mw| format!("{} {mw} mW", rail.name())))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Extract every schema rail from one line.
pub fn extract(schema: &DeviceSchema, line: &str) -> PartialReading {
    let mut reading = PartialReading::empty(schema.rail_count());
    let line = line.trim();
    if line.is_empty() {
        return reading;
    }

    for (slot, rail) in reading.values.iter_mut().zip(schema.rails()) {
        let Some(caps) = rail.pattern().captures(line) else {
            continue;
        };
        let Some(raw) = caps.get(1) else {
            continue;
        };
        match raw.as_str().parse::<u64>() {
            Ok(mw) => *slot = Some(mw),
            Err(_) => reading.malformed.push(MalformedSample {
                rail: rail.name().to_string(),
                raw: raw.as_str().to_string(),
            }),
        }
    }

    reading
}
