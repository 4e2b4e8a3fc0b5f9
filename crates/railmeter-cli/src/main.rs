//! CLI for railmeter — average Jetson power rails over a monitoring window.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "railmeter")]
#[command(about = "railmeter — average Jetson power rails reported by tegrastats")]
#[command(version = railmeter_core::VERSION)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the device families railmeter knows how to parse
    Devices,

    /// Run the diagnostics tool for a window and report average rail power
    Measure {
        /// Device family tag (see `railmeter devices`)
        device: String,

        /// Monitoring window (e.g. "10s", "2m", "500ms"; bare numbers are seconds)
        #[arg(long, default_value = "10s")]
        duration: String,

        /// Diagnostics executable, run without arguments
        #[arg(long, default_value = railmeter_core::DEFAULT_COMMAND)]
        command: String,

        /// Wait between SIGTERM and SIGKILL when stopping the tool
        #[arg(long, default_value = "500ms")]
        kill_grace: String,

        /// Report format
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Print every reading as it arrives
        #[arg(long)]
        live: bool,

        /// Also report raw samples summed and divided by elapsed seconds
        #[arg(long)]
        summed_rate: bool,
    },

    /// Summarize a captured tegrastats log instead of launching the tool
    Parse {
        /// Device family tag (see `railmeter devices`)
        device: String,

        /// Log file to read (default: stdin)
        file: Option<String>,

        /// Report format
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Also report raw samples summed per second (needs --window)
        #[arg(long)]
        summed_rate: bool,

        /// Wall-clock span the log covers, used for --summed-rate
        #[arg(long)]
        window: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    commands::init_logging(cli.verbose);

    match cli.command {
        Commands::Devices => commands::devices::run(),
        Commands::Measure {
            device,
            duration,
            command,
            kill_grace,
            format,
            live,
            summed_rate,
        } => commands::measure::run(commands::measure::MeasureCommandConfig {
            device: &device,
            duration: &duration,
            command: &command,
            kill_grace: &kill_grace,
            format: &format,
            live,
            summed_rate,
        }),
        Commands::Parse {
            device,
            file,
            format,
            summed_rate,
            window,
        } => commands::parse::run(
            &device,
            file.as_deref(),
            &format,
            summed_rate,
            window.as_deref(),
        ),
    }
}
