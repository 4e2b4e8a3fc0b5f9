pub mod devices;
pub mod measure;
pub mod parse;

use std::time::Duration;

use railmeter_core::{DeviceSchema, MonitorError, RenderOptions, SessionResult, render_with};

/// Exit status for launch failures.
pub const EXIT_LAUNCH: i32 = 1;
/// Exit status for unknown devices and invalid arguments.
pub const EXIT_USAGE: i32 = 2;

/// Initialize env_logger. `RUST_LOG` wins over `-v`.
pub fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

/// Resolve a device tag or exit with a message listing the known tags.
pub fn resolve_device(device: &str) -> DeviceSchema {
    match railmeter_core::resolve(device) {
        Ok(schema) => schema,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Run 'railmeter devices' to list supported devices.");
            std::process::exit(EXIT_USAGE);
        }
    }
}

/// Map a core error to the CLI exit status.
pub fn exit_code(err: &MonitorError) -> i32 {
    match err {
        MonitorError::ProcessLaunch { .. } | MonitorError::Io(_) => EXIT_LAUNCH,
        MonitorError::UnknownDevice { .. }
        | MonitorError::InvalidSchema(_)
        | MonitorError::InvalidConfig(_) => EXIT_USAGE,
    }
}

/// Parse a duration string like "5m", "30s", "1h", "100ms". Bare numbers are seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    let (numeric, multiplier) = if let Some(rest) = s.strip_suffix("ms") {
        (rest, 0.001)
    } else if let Some(rest) = s.strip_suffix('s') {
        (rest, 1.0)
    } else if let Some(rest) = s.strip_suffix('m') {
        (rest, 60.0)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, 3600.0)
    } else {
        (s, 1.0)
    };

    let value: f64 = numeric
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration '{s}'"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("invalid duration '{s}'"));
    }
    Duration::try_from_secs_f64(value * multiplier).map_err(|_| format!("duration '{s}' is too large"))
}

/// Parse a duration argument or exit with a usage error.
pub fn duration_arg(flag: &str, value: &str) -> Duration {
    parse_duration(value).unwrap_or_else(|e| {
        eprintln!("Error: --{flag}: {e}");
        std::process::exit(EXIT_USAGE);
    })
}

/// Print a result in the requested format.
pub fn print_result(result: &SessionResult, format: &str, options: &RenderOptions) {
    if format == "json" {
        match result.to_json_pretty() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error encoding report: {e}");
                std::process::exit(EXIT_LAUNCH);
            }
        }
    } else {
        print!("{}", render_with(result, options));
    }
}
