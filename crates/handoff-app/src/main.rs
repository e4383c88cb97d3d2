// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hand-off bridge — command-line harness.
//
// Entry point. Initialises logging, loads configuration, and plays the given
// OS deliveries through the intake pipeline the way a host app would: cold
// deliveries first, then channel registration and the initial poll, then warm
// deliveries.

mod harness;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use harness::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs);

    tracing::info!("handoff harness starting");

    let stdout = std::io::stdout();
    match harness::run(&cli, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "handoff harness failed");
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so stdout carries only the report. `RUST_LOG` wins over
/// `--log-level`.
fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
