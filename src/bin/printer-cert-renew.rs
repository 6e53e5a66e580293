// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Printer Certificate Renewal Command-Line Tool
//!
//! Renews a device's identity certificate through its web console.
//!
//! # Usage
//!
//! ```text
//! printer-cert-renew [OPTIONS] [COMMAND]
//!
//! Commands:
//!   run           Probe, issue, and install in one process (default)
//!   issue         Probe, decide, extract a CSR, and have it signed
//!   install       Install a previously issued certificate
//!   check         Probe the device and report the renewal decision
//!   clear-marker  Remove the invalid-certificate marker
//!
//! Options:
//!   -c, --config <PATH>   Path to configuration file
//!   -v, --verbose         Enable debug output [alias: --debug]
//!       --staging         Use the CA's staging environment
//!       --insecure        Ignore console certificate errors [alias: --ignore-https-errors]
//!       --force-new       Skip the expiration check and renew
//!       --json-logs       Emit JSON log lines
//!   -h, --help            Print help
//!   -V, --version         Print version
//! ```
//!
//! # Examples
//!
//! ```bash
//! # Scheduled renewal, configured from the environment
//! PRINTER_URL=https://printer.example.com PRINTER_PIN=12345678 \
//!     CERTBOT_EMAIL=admin@example.com printer-cert-renew
//!
//! # Issue against staging, then install separately
//! printer-cert-renew --staging issue
//! printer-cert-renew install
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use printer_cert_renew::gate::{RenewalDecision, RenewalReason};
use printer_cert_renew::logging::{self, LogConfig};
use printer_cert_renew::orchestrator::{CycleOutcome, IssueOutcome, Renewer, RunOptions};
use printer_cert_renew::probe::{format_time, ProbeReport};
use printer_cert_renew::{ConfigLoader, InvalidCertMarker, RenewConfig};

/// Printer Certificate Renewal Command-Line Tool
#[derive(Parser)]
#[command(name = "printer-cert-renew")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Renew a device identity certificate through its web console", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, visible_alias = "debug")]
    verbose: bool,

    /// Request the certificate from the CA's staging environment
    #[arg(long, global = true)]
    staging: bool,

    /// Ignore certificate errors in console sessions
    #[arg(long, global = true, visible_alias = "ignore-https-errors")]
    insecure: bool,

    /// Renew without checking the current certificate
    #[arg(long, global = true)]
    force_new: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
enum Commands {
    /// Probe, issue, and install in one process
    Run,

    /// Probe, decide, extract a signing request, and have it signed
    Issue,

    /// Install a previously issued certificate
    Install,

    /// Probe the device and report the renewal decision
    Check,

    /// Remove the invalid-certificate marker
    ClearMarker,
}

impl Cli {
    fn options(&self) -> RunOptions {
        RunOptions {
            staging: self.staging,
            force_insecure: self.insecure,
            force_new: self.force_new,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let mut log_config = LogConfig::verbose(cli.verbose);
    if cli.json_logs {
        log_config = log_config.with_json();
    }
    if let Err(e) = logging::init(&log_config) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    // Create runtime for async operations
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run_command(&cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> printer_cert_renew::Result<RenewConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(ref path) = cli.config {
        loader = loader.with_path(path);
    }
    loader.load()
}

async fn run_command(cli: &Cli) -> printer_cert_renew::Result<()> {
    let config = load_config(cli)?;
    let options = cli.options();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(config, &options).await,
        Commands::Issue => cmd_issue(config, &options).await,
        Commands::Install => cmd_install(config, &options).await,
        Commands::Check => cmd_check(config, &options).await,
        Commands::ClearMarker => cmd_clear_marker(&config),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_run(config: RenewConfig, options: &RunOptions) -> printer_cert_renew::Result<()> {
    let renewer = Renewer::from_config(config)?;
    match renewer.run_cycle(options).await? {
        CycleOutcome::Skipped { remaining_days } => {
            info!("Nothing to do; certificate valid for {} day(s).", remaining_days);
        }
        CycleOutcome::Renewed { trust } => {
            info!("Certificate renewed and installed ({} trust).", trust);
        }
    }
    Ok(())
}

async fn cmd_issue(config: RenewConfig, options: &RunOptions) -> printer_cert_renew::Result<()> {
    let renewer = Renewer::from_config(config)?;
    match renewer.begin_issue(options).await? {
        IssueOutcome::Skipped { remaining_days } => {
            info!("Nothing to do; certificate valid for {} day(s).", remaining_days);
        }
        IssueOutcome::Issued { pair, trust } => {
            info!(
                "Issued {} and {}. Run 'install' next{}.",
                pair.cert.display(),
                pair.chain.display(),
                if trust.is_relaxed() {
                    " (the marker will relax console trust)"
                } else {
                    ""
                }
            );
        }
    }
    Ok(())
}

async fn cmd_install(config: RenewConfig, options: &RunOptions) -> printer_cert_renew::Result<()> {
    let renewer = Renewer::from_config(config)?;
    let trust = renewer.finish_install(options).await?;
    info!("Certificate installed ({} trust).", trust);
    Ok(())
}

async fn cmd_check(config: RenewConfig, options: &RunOptions) -> printer_cert_renew::Result<()> {
    let renewer = Renewer::from_config(config)?;
    let outcome = renewer.check(options).await?;

    println!("Device: {}", renewer.config().device_url);
    match &outcome.report {
        ProbeReport::Trusted(record) => {
            println!("Certificate: {}", record.subject);
            println!("  Expires: {}", format_time(record.not_after));
            println!("  SHA-256: {}", record.format_fingerprint());
            println!("  Trusted: yes");
        }
        ProbeReport::Untrusted { record, reason } => {
            println!("Certificate: {}", record.subject);
            println!("  Expires: {}", format_time(record.not_after));
            println!("  SHA-256: {}", record.format_fingerprint());
            println!("  Trusted: no ({})", reason);
        }
        ProbeReport::Unknown { reason } => {
            println!("Certificate: unavailable ({})", reason);
        }
    }

    match outcome.decision {
        RenewalDecision::Skip { remaining_days } => {
            println!("Decision: skip ({} day(s) remaining)", remaining_days);
        }
        RenewalDecision::Renew(RenewalReason::Forced) => println!("Decision: renew (forced)"),
        RenewalDecision::Renew(RenewalReason::ExpiringSoon { remaining_days }) => {
            println!("Decision: renew ({} day(s) remaining)", remaining_days);
        }
        RenewalDecision::Renew(RenewalReason::ValidityUnknown) => {
            println!("Decision: renew (validity unknown)");
        }
    }
    Ok(())
}

fn cmd_clear_marker(config: &RenewConfig) -> printer_cert_renew::Result<()> {
    let marker = InvalidCertMarker::new(config.marker_path());
    if marker.clear()? {
        info!("Removed {}", marker.path().display());
    } else {
        info!("No marker at {}", marker.path().display());
    }
    Ok(())
}
