//! Replay a captured tegrastats log and print the report.
//!
//! Reads the log from stdin and takes the device tag as the only argument.
//!
//! Run: `tegrastats --interval 500 | head -n 20 | cargo run --example replay -- agx-orin`

use railmeter_core::{RenderOptions, render_with, resolve, summarize_reader};

fn main() {
    let device = std::env::args().nth(1).unwrap_or_else(|| "agx-orin".to_string());
    let schema = match resolve(&device) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    let stdin = std::io::stdin();
    match summarize_reader(&schema, stdin.lock()) {
        Ok(result) => print!(
            "{}",
            render_with(&result, &RenderOptions { summed_rate: true })
        ),
        Err(e) => {
            eprintln!("Error reading log: {e}");
            std::process::exit(1);
        }
    }
}
