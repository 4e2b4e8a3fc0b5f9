//! `railmeter measure` — run the diagnostics tool for a window and report.

use railmeter_core::{RenderOptions, SampleReading, Session, SessionConfig, StopToken};

use super::{EXIT_LAUNCH, duration_arg, exit_code, print_result, resolve_device};

pub struct MeasureCommandConfig<'a> {
    pub device: &'a str,
    pub duration: &'a str,
    pub command: &'a str,
    pub kill_grace: &'a str,
    pub format: &'a str,
    pub live: bool,
    pub summed_rate: bool,
}

/// Run the measure command.
pub fn run(cfg: MeasureCommandConfig<'_>) {
    // Resolve before anything is launched.
    let schema = resolve_device(cfg.device);

    let config = SessionConfig {
        command: cfg.command.to_string(),
        duration: duration_arg("duration", cfg.duration),
        kill_grace: duration_arg("kill-grace", cfg.kill_grace),
    };

    // Ctrl+C ends the window early; the report still covers what was read.
    let stop = StopToken::new();
    let s = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || s.stop()) {
        log::warn!("could not install Ctrl+C handler: {e}");
    }

    let text = cfg.format != "json";
    if text {
        println!(
            "Monitoring {} via {} for {:.2}s (Ctrl+C to stop early)",
            schema.tag(),
            config.command,
            config.duration.as_secs_f64()
        );
    }

    let mut session = Session::new(&schema, config).with_stop_token(stop);
    if cfg.live {
        let schema_ref = &schema;
        session = session.on_sample(move |sample: &SampleReading| {
            // Keep stdout clean for JSON consumers.
            let line = format!(
                "[{:>7.2}s] Current Power: {}",
                sample.elapsed.as_secs_f64(),
                sample.describe(schema_ref)
            );
            if text {
                println!("{line}");
            } else {
                eprintln!("{line}");
            }
        });
    }

    let result = match session.run() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            let code = exit_code(&e);
            if code == EXIT_LAUNCH {
                eprintln!("Is tegrastats installed and are you running with sufficient privileges?");
            }
            std::process::exit(code);
        }
    };

    if text {
        println!();
    }
    print_result(
        &result,
        cfg.format,
        &RenderOptions {
            summed_rate: cfg.summed_rate,
        },
    );
}
