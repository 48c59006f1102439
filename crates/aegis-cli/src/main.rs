//! Aegis CLI - command-line front-end for the defense pipeline.
//!
//! - `scan <message>` exits 0/1 on safe/blocked
//! - `test` runs the built-in red-team suites and exits 0 iff the
//!   detection rate is at least 0.95
//! - `info` prints version and inventory
//!
//! `NO_COLOR` suppresses ANSI styling in all output.

mod suites;

use clap::Parser;
use std::path::PathBuf;

use aegis_core::{Aegis, AegisError, GuardOptions};
use aegis_policy::{Policy, Preset};
use aegis_scanner::PromptMessage;

/// Minimum detection rate for `test` to succeed.
const REQUIRED_DETECTION_RATE: f64 = 0.95;

#[derive(Parser)]
#[command(name = "aegis")]
#[command(about = "Aegis - streaming-first prompt-injection defense")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Scan a message; exit 0 when safe, 1 when blocked
    Scan {
        /// The message to scan
        message: String,
        /// Policy file (JSON or YAML)
        #[arg(long, conflicts_with = "preset")]
        policy: Option<PathBuf>,
        /// Policy preset name
        #[arg(long, default_value = "balanced")]
        preset: String,
    },
    /// Run the red-team suites; exit 0 iff detection rate >= 0.95
    Test {
        /// Policy file (JSON or YAML)
        #[arg(long)]
        policy: Option<PathBuf>,
        /// Suite ids to run (default: all)
        #[arg(long, value_delimiter = ',')]
        suites: Vec<String>,
        /// Emit machine-readable JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print version and inventory
    Info,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Scan {
            message,
            policy,
            preset,
        } => cmd_scan(&message, policy.as_deref(), &preset)?,
        Commands::Test {
            policy,
            suites,
            json,
        } => cmd_test(policy.as_deref(), &suites, json)?,
        Commands::Info => cmd_info(),
    };

    std::process::exit(exit_code);
}

fn load_policy(path: Option<&std::path::Path>, preset: &str) -> anyhow::Result<Policy> {
    match path {
        Some(path) => Ok(Policy::from_path(path)?),
        None => {
            let preset: Preset = preset.parse()?;
            Ok(preset.resolve())
        }
    }
}

fn cmd_scan(message: &str, policy: Option<&std::path::Path>, preset: &str) -> anyhow::Result<i32> {
    let policy = load_policy(policy, preset)?;
    let mut aegis = Aegis::new(policy)?;

    let messages = vec![PromptMessage::user(message)];
    match aegis.guard_input(&messages, GuardOptions::default()) {
        Ok(_) => {
            println!("{}", paint("SAFE", "32"));
            Ok(0)
        }
        Err(
            AegisError::InputBlocked(scan)
            | AegisError::SessionQuarantined { scan: Some(scan) },
        ) => {
            let top = scan
                .top_detection()
                .map_or("blocked", |d| d.description.as_str());
            println!("{} {top} (score {:.2})", paint("BLOCKED", "31"), scan.score);
            Ok(1)
        }
        Err(other) => Err(other.into()),
    }
}

fn cmd_test(
    policy: Option<&std::path::Path>,
    suite_ids: &[String],
    json: bool,
) -> anyhow::Result<i32> {
    // The suites are calibrated against the strict preset unless the user
    // supplies a policy of their own.
    let policy = match policy {
        Some(path) => Policy::from_path(path)?,
        None => Preset::Strict.resolve(),
    };

    let selected = suites::select(suite_ids);
    if selected.is_empty() {
        anyhow::bail!("no matching suites: {suite_ids:?}");
    }

    let mut attacks = 0usize;
    let mut detected = 0usize;
    let mut benign = 0usize;
    let mut false_positives = 0usize;
    let mut suite_reports = Vec::new();

    for suite in &selected {
        let mut hits = 0usize;
        for prompt in suite.prompts {
            // A fresh instance per prompt: suites must not trip each
            // other's session state.
            let mut aegis = Aegis::new(policy.clone())?;
            let blocked = aegis
                .guard_input(&[PromptMessage::user(*prompt)], GuardOptions::default())
                .is_err();
            if suite.adversarial {
                attacks += 1;
                if blocked {
                    detected += 1;
                    hits += 1;
                }
            } else {
                benign += 1;
                if blocked {
                    false_positives += 1;
                }
            }
        }
        suite_reports.push((suite.id, suite.prompts.len(), hits));
    }

    let rate = if attacks == 0 {
        1.0
    } else {
        detected as f64 / attacks as f64
    };
    let passed = rate >= REQUIRED_DETECTION_RATE;

    if json {
        let report = serde_json::json!({
            "detectionRate": rate,
            "required": REQUIRED_DETECTION_RATE,
            "passed": passed,
            "attacks": attacks,
            "detected": detected,
            "benign": benign,
            "falsePositives": false_positives,
            "suites": suite_reports
                .iter()
                .map(|(id, total, hits)| serde_json::json!({
                    "id": id, "prompts": total, "detected": hits
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for (id, total, hits) in &suite_reports {
            println!("{id:<12} {hits}/{total}");
        }
        println!(
            "detection rate {:.1}% ({} of {} attacks), {} false positives of {} benign",
            rate * 100.0,
            detected,
            attacks,
            false_positives,
            benign
        );
        let verdict = if passed {
            paint("PASS", "32")
        } else {
            paint("FAIL", "31")
        };
        println!("{verdict}");
    }

    Ok(i32::from(!passed))
}

fn cmd_info() -> i32 {
    println!("aegis {}", env!("CARGO_PKG_VERSION"));
    println!("presets:");
    for preset in Preset::ALL {
        println!("  {}", preset.name());
    }
    println!("suites:");
    for suite in suites::SUITES {
        println!(
            "  {:<12} {:>2} prompts  {}",
            suite.id,
            suite.prompts.len(),
            suite.description
        );
    }
    0
}

/// Wrap `text` in an ANSI color unless `NO_COLOR` is set.
fn paint(text: &str, code: &str) -> String {
    if std::env::var_os("NO_COLOR").is_some() {
        text.to_string()
    } else {
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}
