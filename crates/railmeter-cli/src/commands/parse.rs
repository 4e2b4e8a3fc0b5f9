//! `railmeter parse` — summarize a captured log.

use std::fs::File;
use std::io::{self, BufReader};

use railmeter_core::{RenderOptions, summarize_reader};

use super::{EXIT_LAUNCH, duration_arg, print_result, resolve_device};

/// Run the parse command.
pub fn run(
    device: &str,
    file: Option<&str>,
    format: &str,
    summed_rate: bool,
    window: Option<&str>,
) {
    let schema = resolve_device(device);
    let window = window.map(|w| duration_arg("window", w));

    let outcome = match file {
        Some(path) => match File::open(path) {
            Ok(f) => summarize_reader(&schema, BufReader::new(f)),
            Err(e) => {
                eprintln!("Error opening {path}: {e}");
                std::process::exit(EXIT_LAUNCH);
            }
        },
        None => summarize_reader(&schema, io::stdin().lock()),
    };

    let mut result = match outcome {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error reading log: {e}");
            std::process::exit(EXIT_LAUNCH);
        }
    };

    // A log has no wall-clock span of its own.
    if let Some(w) = window {
        result.elapsed_ms = u64::try_from(w.as_millis()).unwrap_or(u64::MAX);
    } else if summed_rate {
        log::warn!("--summed-rate needs --window for a captured log; skipping it");
    }

    print_result(&result, format, &RenderOptions { summed_rate });
}
