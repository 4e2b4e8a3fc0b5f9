//! Session results and the human-readable report.
//!
//! Rendering is deterministic: the same [`SessionResult`] always produces the
//! same text, byte for byte.

use std::fmt::Write;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Why a session stopped collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The monitoring window elapsed.
    WindowElapsed,
    /// The diagnostics tool closed its output (exited, died, or the read failed)
    /// before the window elapsed.
    StreamEnded,
    /// The caller raised the stop token.
    Cancelled,
    /// A captured log was read to the end.
    InputExhausted,
}

impl StopReason {
    /// True when collection stopped before the configured window elapsed.
    pub fn is_early(self) -> bool {
        matches!(self, Self::StreamEnded | Self::Cancelled)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WindowElapsed => write!(f, "window elapsed"),
            Self::StreamEnded => write!(f, "stream ended early"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::InputExhausted => write!(f, "input exhausted"),
        }
    }
}

/// Average and raw totals for one rail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RailSummary {
    pub name: String,
    pub sum_mw: u64,
    pub count: u64,
    /// `sum_mw / count`, or 0 when the rail never appeared.
    pub average_mw: f64,
    /// False when the rail never appeared in the tool's output.
    pub has_data: bool,
}

/// Final snapshot of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub device: String,
    pub rails: Vec<RailSummary>,
    /// Sum of per-rail averages.
    pub total_average_mw: f64,
    /// Lines that produced at least one rail value.
    pub sample_count: u64,
    pub lines_read: u64,
    pub malformed_count: u64,
    pub elapsed_ms: u64,
    pub stop_reason: StopReason,
    /// True when no line produced any rail value.
    pub empty: bool,
    /// Last lines the diagnostics tool wrote to stderr.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stderr_tail: Vec<String>,
}

impl SessionResult {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// Summary for a rail by name.
    pub fn rail(&self, name: &str) -> Option<&RailSummary> {
        self.rails.iter().find(|r| r.name == name)
    }

    /// Alternative aggregate: every raw rail sample summed, divided by elapsed
    /// seconds. This is a rate over the window, not the mean-of-means in
    /// [`total_average_mw`](Self::total_average_mw). `None` for zero elapsed time.
    pub fn summed_sample_rate_mw(&self) -> Option<f64> {
        if self.elapsed_ms == 0 {
            return None;
        }
        let raw_total: u64 = self.rails.iter().map(|r| r.sum_mw).sum();
        Some(raw_total as f64 / (self.elapsed_ms as f64 / 1000.0))
    }

    /// Pretty JSON encoding of the result.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Optional report sections.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Append the summed-sample-rate metric.
    pub summed_rate: bool,
}

/// Render the standard report.
pub fn render(result: &SessionResult) -> String {
    render_with(result, &RenderOptions::default())
}

/// Render the report with optional sections.
pub fn render_with(result: &SessionResult, options: &RenderOptions) -> String {
    let mut out = String::new();

    if result.stop_reason == StopReason::InputExhausted {
        let _ = writeln!(
            out,
            "Average Power Consumption over {} captured {} ({}):",
            result.lines_read,
            plural(result.lines_read, "line", "lines"),
            result.device
        );
    } else {
        let _ = writeln!(
            out,
            "Average Power Consumption over {:.2} seconds ({}):",
            result.elapsed_ms as f64 / 1000.0,
            result.device
        );
    }
    let _ = writeln!(
        out,
        "  Samples: {} of {} {}",
        result.sample_count,
        result.lines_read,
        plural(result.lines_read, "line", "lines")
    );

    for rail in &result.rails {
        if rail.has_data {
            let _ = writeln!(
                out,
                "  {}: {:.2} mW avg, {} mW total ({} {})",
                rail.name,
                rail.average_mw,
                rail.sum_mw,
                rail.count,
                plural(rail.count, "sample", "samples")
            );
        } else {
            let _ = writeln!(out, "  {}: {:.2} mW (no data)", rail.name, 0.0);
        }
    }
    let _ = writeln!(
        out,
        "Total Average Power Consumption: {:.2} mW",
        result.total_average_mw
    );
    if result.empty {
        out.push_str("No power data collected.\n");
    }
    if options.summed_rate {
        match result.summed_sample_rate_mw() {
            Some(rate) => {
                let _ = writeln!(
                    out,
                    "Summed Sample Rate: {rate:.2} mW (raw samples / elapsed seconds)"
                );
            }
            None => out.push_str("Summed Sample Rate: unavailable (no elapsed time)\n"),
        }
    }

    if result.malformed_count > 0 {
        let _ = writeln!(
            out,
            "  Skipped {} malformed rail {}",
            result.malformed_count,
            plural(result.malformed_count, "reading", "readings")
        );
    }
    match result.stop_reason {
        StopReason::StreamEnded => {
            out.push_str("  Note: diagnostics output ended before the window elapsed\n");
        }
        StopReason::Cancelled => out.push_str("  Note: session cancelled before the window elapsed\n"),
        StopReason::WindowElapsed | StopReason::InputExhausted => {}
    }

    out
}

fn plural(n: u64, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 { one } else { many }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rail(name: &str, sum: u64, count: u64) -> RailSummary {
        RailSummary {
            name: name.to_string(),
            sum_mw: sum,
            count,
            average_mw: if count > 0 {
                sum as f64 / count as f64
            } else {
                0.0
            },
            has_data: count > 0,
        }
    }

    fn sample_result() -> SessionResult {
        let rails = vec![
            rail("VDD_GPU_SOC", 1500, 3),
            rail("VDD_CPU_CV", 900, 3),
            rail("VIN_SYS_5V0", 600, 3),
            rail("VDDQ_VDD2_1V8AO", 200, 2),
        ];
        SessionResult {
            device: "agx-orin".to_string(),
            total_average_mw: rails.iter().map(|r| r.average_mw).sum(),
            rails,
            sample_count: 3,
            lines_read: 4,
            malformed_count: 0,
            elapsed_ms: 3000,
            stop_reason: StopReason::WindowElapsed,
            empty: false,
            stderr_tail: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    #[test]
    fn render_full_report() {
        let text = render(&sample_result());
        let expected = "\
Average Power Consumption over 3.00 seconds (agx-orin):
  Samples: 3 of 4 lines
  VDD_GPU_SOC: 500.00 mW avg, 1500 mW total (3 samples)
  VDD_CPU_CV: 300.00 mW avg, 900 mW total (3 samples)
  VIN_SYS_5V0: 200.00 mW avg, 600 mW total (3 samples)
  VDDQ_VDD2_1V8AO: 100.00 mW avg, 200 mW total (2 samples)
Total Average Power Consumption: 1100.00 mW
";
        assert_eq!(text, expected);
    }

    #[test]
    fn render_is_idempotent() {
        let result = sample_result();
        assert_eq!(render(&result), render(&result));
    }

    #[test]
    fn render_flags_rail_without_data() {
        let mut result = sample_result();
        result.rails[3] = rail("VDDQ_VDD2_1V8AO", 0, 0);
        let text = render(&result);
        assert!(text.contains("  VDDQ_VDD2_1V8AO: 0.00 mW (no data)\n"));
    }

    #[test]
    fn render_empty_result() {
        let mut result = sample_result();
        result.rails = vec![rail("VDD_IN", 0, 0)];
        result.total_average_mw = 0.0;
        result.sample_count = 0;
        result.empty = true;
        result.lines_read = 1;
        let text = render(&result);
        let expected = "\
Average Power Consumption over 3.00 seconds (agx-orin):
  Samples: 0 of 1 line
  VDD_IN: 0.00 mW (no data)
Total Average Power Consumption: 0.00 mW
No power data collected.
";
        assert_eq!(text, expected);
    }

    #[test]
    fn render_single_sample_is_singular() {
        let mut result = sample_result();
        result.rails = vec![rail("VDD_IN", 3987, 1)];
        result.total_average_mw = 3987.0;
        result.sample_count = 1;
        result.lines_read = 1;
        result.stop_reason = StopReason::InputExhausted;
        let text = render(&result);
        assert!(text.starts_with("Average Power Consumption over 1 captured line (agx-orin):\n"));
        assert!(text.contains("  VDD_IN: 3987.00 mW avg, 3987 mW total (1 sample)\n"));
    }

    #[test]
    fn render_notes_early_stop_and_malformed() {
        let mut result = sample_result();
        result.stop_reason = StopReason::StreamEnded;
        result.malformed_count = 2;
        let text = render(&result);
        assert!(text.contains("Skipped 2 malformed rail readings"));
        assert!(text.contains("ended before the window elapsed"));

        result.stop_reason = StopReason::Cancelled;
        result.malformed_count = 1;
        let text = render(&result);
        assert!(text.contains("Skipped 1 malformed rail reading\n"));
        assert!(text.contains("cancelled"));
    }

    #[test]
    fn render_offline_header() {
        let mut result = sample_result();
        result.stop_reason = StopReason::InputExhausted;
        result.elapsed_ms = 0;
        let text = render(&result);
        assert!(text.starts_with("Average Power Consumption over 4 captured lines (agx-orin):\n"));
    }

    // -----------------------------------------------------------------------
    // Summed sample rate
    // -----------------------------------------------------------------------

    #[test]
    fn summed_rate_is_separate_from_total() {
        let result = sample_result();
        // (1500 + 900 + 600 + 200) / 3 s
        let rate = result.summed_sample_rate_mw().unwrap();
        assert!((rate - 3200.0 / 3.0).abs() < 1e-9);
        assert!((result.total_average_mw - 1100.0).abs() < 1e-9);

        let text = render_with(&result, &RenderOptions { summed_rate: true });
        assert!(text.contains("Summed Sample Rate: 1066.67 mW"));
        assert!(!render(&result).contains("Summed Sample Rate"));
    }

    #[test]
    fn summed_rate_needs_elapsed_time() {
        let mut result = sample_result();
        result.elapsed_ms = 0;
        assert_eq!(result.summed_sample_rate_mw(), None);
        let text = render_with(&result, &RenderOptions { summed_rate: true });
        assert!(text.contains("Summed Sample Rate: unavailable"));
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    #[test]
    fn json_uses_snake_case_stop_reason() {
        let json = sample_result().to_json_pretty().unwrap();
        assert!(json.contains("\"stop_reason\": \"window_elapsed\""));
        assert!(!json.contains("stderr_tail"));
        let parsed: SessionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample_result());
    }

    #[test]
    fn stop_reason_early() {
        assert!(StopReason::StreamEnded.is_early());
        assert!(StopReason::Cancelled.is_early());
        assert!(!StopReason::WindowElapsed.is_early());
        assert!(!StopReason::InputExhausted.is_early());
    }
}
