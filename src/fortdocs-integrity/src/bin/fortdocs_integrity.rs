//! FortDocs integrity CLI - run the device-integrity gate from a shell.
//!
//! Useful for checking a policy file before shipping it and for inspecting
//! what the gate sees on a test device.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fortdocs_integrity::{GateAction, IntegrityConfig, IntegrityError, IntegrityGate, Verdict};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit status for a rejected or unreadable policy.
const EXIT_CONFIG_ERROR: u8 = 3;

/// FortDocs integrity gate.
///
/// Probes the runtime environment for signs of a jailbroken or rooted
/// device and reports the action the document store would take:
/// Allow, AllowDegraded or Deny.
#[derive(Parser)]
#[command(name = "fortdocs-integrity")]
#[command(version = VERSION)]
#[command(about = "Device-integrity gate for the FortDocs document store")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one evaluation. Exit code: 0 Allow, 1 AllowDegraded, 2 Deny, 3 bad policy
    Check {
        /// Policy file (JSON). Embedded defaults when omitted
        #[arg(long)]
        policy: Option<PathBuf>,
    },

    /// Print the embedded default policy
    Policy,

    /// Validate a policy file without running any probe
    Validate {
        /// Policy file (JSON)
        file: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<IntegrityConfig, IntegrityError> {
    match path {
        Some(path) => IntegrityConfig::load(path),
        None => Ok(IntegrityConfig::default()),
    }
}

fn report_config_error(err: &IntegrityError, json: bool) -> ExitCode {
    if json {
        let output = serde_json::json!({
            "status": "config_error",
            "error": err.to_string(),
        });
        println!("{output}");
    } else {
        eprintln!("Policy rejected: {err}");
    }
    ExitCode::from(EXIT_CONFIG_ERROR)
}

fn print_verdict(verdict: &Verdict, action: GateAction) {
    println!("\nINTEGRITY CHECK");
    println!("===============\n");
    for evidence in &verdict.contributing_evidence {
        let marker = if evidence.detected {
            "DETECTED"
        } else if evidence.is_neutral() {
            "NEUTRAL "
        } else {
            "clean   "
        };
        println!(
            "  [{marker}] {:<28} conf={:.2}  {}",
            evidence.probe_name, evidence.confidence, evidence.detail
        );
    }
    println!();
    println!("  Score:    {:.3}", verdict.score);
    println!("  Decision: {:?}", verdict.decision);
    println!("  Action:   {action:?}");
}

async fn run_check(policy: Option<&Path>, json: bool) -> ExitCode {
    let gate = match load_config(policy).and_then(IntegrityGate::from_config) {
        Ok(gate) => gate,
        Err(err) => return report_config_error(&err, json),
    };

    let verdict = gate.evaluate_async().await;
    let action = gate.decide(&verdict);

    if json {
        let output = serde_json::json!({
            "status": "ok",
            "action": action,
            "verdict": verdict,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Failed to render verdict: {e}"),
        }
    } else {
        print_verdict(&verdict, action);
    }

    // Action codes are 0..=2.
    ExitCode::from(action.code() as u8)
}

fn run_policy() -> ExitCode {
    match IntegrityConfig::default().to_json_pretty() {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        },
        Err(err) => {
            eprintln!("Failed to render default policy: {err}");
            ExitCode::FAILURE
        },
    }
}

fn run_validate(file: &Path, json: bool) -> ExitCode {
    let config = match IntegrityConfig::load(file) {
        Ok(config) => config,
        Err(err) => return report_config_error(&err, json),
    };
    let policy = match config.validate() {
        Ok(policy) => policy,
        Err(err) => return report_config_error(&err, json),
    };
    let probes: Vec<&str> = config.enabled_probes().map(|p| p.name()).collect();

    if json {
        let output = serde_json::json!({
            "status": "ok",
            "probes": probes,
            "fail_closed": policy.fail_closed(),
        });
        println!("{output}");
    } else {
        println!("Policy OK: {}", file.display());
        println!(
            "  Thresholds: suspicious >= {}, compromised >= {}",
            policy.threshold_suspicious(),
            policy.threshold_compromised()
        );
        println!("  Fail closed: {}", policy.fail_closed());
        println!("  Probe timeout: {}ms", policy.probe_timeout().as_millis());
        println!("  Probes: {}", probes.join(", "));
    }
    ExitCode::SUCCESS
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_output = cli.format == "json";

    // Initialize logging (suppress for JSON output)
    if json_output {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_target(false)
            .init();
    } else if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_target(false)
            .init();
    }

    match cli.command {
        Some(Commands::Check { policy }) => run_check(policy.as_deref(), json_output).await,
        Some(Commands::Policy) => run_policy(),
        Some(Commands::Validate { file }) => run_validate(&file, json_output),
        None => {
            println!("fortdocs-integrity {VERSION}");
            println!();
            println!("  fortdocs-integrity check [--policy FILE]   Evaluate this device");
            println!("  fortdocs-integrity policy                  Print the default policy");
            println!("  fortdocs-integrity validate FILE           Check a policy file");
            ExitCode::SUCCESS
        },
    }
}
