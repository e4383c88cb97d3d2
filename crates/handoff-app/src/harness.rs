// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Harness session: command-line arguments and the ordered playback of
// deliveries, channel registration, and App calls.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use clap::Parser;
use handoff_core::{
    DeliveryEvent, HandoffConfig, METHOD_GET_INITIAL_FILE_PATH,
    METHOD_ON_NEW_FILE_INTENT, MethodCall, MethodResponse, Result,
};
use handoff_intake::{IntakeComponent, IntakeOutcome};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(name = "handoff", version, about = "Play OS file hand-offs through the intake pipeline")]
pub struct Cli {
    /// Directory holding `handoff.json`.
    #[arg(long, env = "HANDOFF_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Override the platform cache directory.
    #[arg(long, env = "HANDOFF_CACHE_ROOT")]
    pub cache_root: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON.
    #[arg(long)]
    pub json_logs: bool,

    /// Save the effective configuration to the config directory first.
    #[arg(long)]
    pub write_config: bool,

    /// Print the report as JSON lines.
    #[arg(long)]
    pub json: bool,

    /// Reference delivered before the App registers (repeatable).
    #[arg(long = "cold", value_name = "REF")]
    pub cold: Vec<String>,

    /// Reference delivered after the App registers (repeatable).
    #[arg(long = "warm", value_name = "REF")]
    pub warm: Vec<String>,

    /// Extra channel method to invoke once deliveries are done (repeatable).
    #[arg(long = "call", value_name = "METHOD")]
    pub call: Vec<String>,
}

impl Cli {
    /// `--config-dir`, else `<config dir>/handoff`, else the working directory.
    pub fn resolved_config_dir(&self) -> PathBuf {
        self.config_dir.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .map(|d| d.join("handoff"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }
}

/// One line of harness output.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Report {
    Delivery {
        reference: String,
        outcome: &'static str,
        path: Option<PathBuf>,
    },
    Push(MethodCall),
    Response {
        method: String,
        response: MethodResponse,
    },
}

impl Report {
    fn delivery(reference: &str, outcome: &IntakeOutcome) -> Self {
        let label = match outcome {
            IntakeOutcome::Buffered(_) => "buffered",
            IntakeOutcome::Pushed(_) => "pushed",
            IntakeOutcome::Unreadable => "unreadable",
            IntakeOutcome::Rejected { .. } => "rejected",
            IntakeOutcome::RelocationFailed => "relocation_failed",
        };
        Self::Delivery {
            reference: reference.to_owned(),
            outcome: label,
            path: outcome.staged().map(|s| s.path.clone()),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivery {
                reference,
                outcome,
                path,
            } => {
                write!(f, "delivery {reference}: {outcome}")?;
                if let Some(path) = path {
                    write!(f, " -> {}", path.display())?;
                }
                Ok(())
            }
            Self::Push(call) => write!(f, "push {}({})", call.method, call.arguments),
            Self::Response { method, response } => match response {
                MethodResponse::Success(value) => write!(f, "call {method}: {value}"),
                MethodResponse::NotImplemented => write!(f, "call {method}: not implemented"),
            },
        }
    }
}

struct Printer<'a> {
    out: &'a mut dyn Write,
    json: bool,
}

impl Printer<'_> {
    fn emit(&mut self, report: &Report) -> Result<()> {
        if self.json {
            serde_json::to_writer(&mut *self.out, report)?;
            writeln!(self.out)?;
        } else {
            writeln!(self.out, "{report}")?;
        }
        Ok(())
    }
}

/// Run one session and write its report to `out`.
pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let config_dir = cli.resolved_config_dir();
    let mut config = HandoffConfig::load(&config_dir);
    if let Some(root) = &cli.cache_root {
        config.cache_root = Some(root.clone());
    }
    if cli.write_config {
        config.persist(&config_dir)?;
        info!(dir = %config_dir.display(), "configuration saved");
    }

    let intake = IntakeComponent::for_platform(handoff_bridge::platform_bridge(), &config)?;
    info!(
        channel = %config.channel_name,
        staging = %intake.staging_dir().display(),
        "intake ready"
    );

    let mut printer = Printer { out, json: cli.json };

    for reference in &cli.cold {
        let outcome = intake.process(&DeliveryEvent::cold(reference.as_str()));
        printer.emit(&Report::delivery(reference, &outcome))?;
    }

    // Pushes arrive on the listener; queue them and print in order after
    // each delivery.
    let pushes: Arc<Mutex<Vec<MethodCall>>> = Arc::default();
    let channel = intake.channel();
    let sink = Arc::clone(&pushes);
    channel.register(move |path: &Path| {
        let call = MethodCall::with_arguments(
            METHOD_ON_NEW_FILE_INTENT,
            Value::String(path.to_string_lossy().into_owned()),
        );
        sink.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    });
    debug!(channel = channel.name(), "listener registered");

    let poll = MethodCall::new(METHOD_GET_INITIAL_FILE_PATH);
    printer.emit(&Report::Response {
        method: poll.method.clone(),
        response: channel.handle(&poll),
    })?;

    for reference in &cli.warm {
        let outcome = intake.process(&DeliveryEvent::warm(reference.as_str()));
        printer.emit(&Report::delivery(reference, &outcome))?;
        let drained: Vec<MethodCall> =
            std::mem::take(&mut *pushes.lock().unwrap_or_else(PoisonError::into_inner));
        for call in drained {
            printer.emit(&Report::Push(call))?;
        }
    }

    for method in &cli.call {
        let call = MethodCall::new(method.as_str());
        printer.emit(&Report::Response {
            method: call.method.clone(),
            response: channel.handle(&call),
        })?;
    }

    printer.out.flush()?;
    Ok(())
}
