//! Invigil CLI - drives the cancellation core from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Run the scripted cancellation demonstration
//! invigil demo
//!
//! # Same, with simulated delays shortened
//! invigil demo --fast
//!
//! # Show configuration and the live panel
//! invigil status
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use invigil::features::ScoreOrigin;
use invigil::presentation::{Notice, NoticeLevel};
use invigil::registry::ProcessKind;
use invigil::services::BiometricFactor;
use invigil::{App, InvigilConfig};

#[derive(Parser)]
#[command(name = "invigil")]
#[command(about = "Invigil - proctoring console cancellation core", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (human, json)
    #[arg(long, global = true, default_value = "human")]
    format: OutputFormatArg,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormatArg {
    Human,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scripted cancellation demonstration
    Demo {
        /// Shorten every simulated delay for a quick run
        #[arg(long)]
        fast: bool,
    },

    /// Show configuration and the live process panel
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => InvigilConfig::load_from_path(path)?,
        None => InvigilConfig::default(),
    };

    match cli.command {
        Commands::Demo { fast } => run_demo(config, fast, cli.format).await,
        Commands::Status => show_status(config, cli.format),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_filter = if verbose { "invigil=debug" } else { "invigil=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

async fn run_demo(mut config: InvigilConfig, fast: bool, format: OutputFormatArg) -> Result<()> {
    if fast {
        config.timings = config.timings.clone().scaled_down(10);
    }
    let timings = config.timings.clone();
    let app = App::new(config);
    let panel = app.attach_panel();

    println!(
        "{}",
        style("Invigil cancellation demonstration").bold().cyan()
    );

    // Candidate intake and evidence uploads
    app.biometric().set_candidate("123412341234")?;
    let (_, face_ref) = app.biometric().upload_capture(BiometricFactor::Face)?;
    let (_, fingerprint_ref) = app.biometric().upload_capture(BiometricFactor::Fingerprint)?;
    tokio::time::sleep(timings.upload_delay() + Duration::from_millis(100)).await;

    // Start the simulated workload
    app.biometric().start_factor(BiometricFactor::Face, &face_ref)?;
    let fingerprint_id = app
        .biometric()
        .start_factor(BiometricFactor::Fingerprint, &fingerprint_ref)?;
    app.fraud().start_full_scan()?;
    app.monitor().start("EXAM-2024-117", "HALL-A1", 120).await?;

    println!("\n{}", panel.render());

    // Cancel one verification mid-capture to show individual teardown
    tokio::time::sleep(timings.capture_window() / 2).await;
    panel.cancel(fingerprint_id);

    // Watch the fraud scan run to completion
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.green}] {pos}%")
            .expect("Invalid template"),
    );
    bar.set_message("Fraud scan");
    while app.fraud().in_progress() {
        bar.set_position(app.fraud().progress() as u64);
        tokio::time::sleep(timings.scan_step_delay() / 2).await;
    }
    bar.finish_with_message("Fraud scan finished");

    // Let the remaining verification complete naturally
    let drained = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let busy = panel
                .processes()
                .iter()
                .any(|process| process.kind == ProcessKind::Verification);
            if !busy {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if drained.is_err() {
        eprintln!(
            "{}",
            style("Verification did not settle in time").yellow()
        );
    }

    println!("\n{}", panel.render());

    // Bulk cancel what is left, behind the confirmation gate
    let live = app.registry().len();
    let decision = app
        .confirm()
        .request(format!("Cancel all {live} active processes?"));
    app.confirm().resolve(true);
    if decision.wait().await {
        panel.cancel_all();
    }

    match format {
        OutputFormatArg::Human => print_human_summary(&app),
        OutputFormatArg::Json => print_json_summary(&app)?,
    }
    Ok(())
}

fn print_human_summary(app: &App) {
    println!("\n{}", style("Notices").bold());
    for notice in app.notices().drain() {
        print_notice(&notice);
    }

    let scores = app.biometric().scores();
    println!("\n{}", style("Factor scores").bold());
    for factor in BiometricFactor::ALL {
        match scores.get(factor) {
            Some(result) => {
                let origin = match result.origin {
                    ScoreOrigin::Service => String::new(),
                    ScoreOrigin::SimulatedFallback => String::from(" (simulated fallback)"),
                };
                println!("  {factor}: {}%{origin}", result.score);
            }
            None => println!("  {factor}: not scored"),
        }
    }

    if let Some(assessment) = app.fraud().last_assessment() {
        println!("\n{}", style("Fraud assessment").bold());
        println!(
            "  risk {:.2} ({}) - {}",
            assessment.risk_score,
            assessment.level,
            assessment.findings.join("; ")
        );
    }

    println!(
        "\nMonitoring sweeps: {} ({} high-risk findings), stored records: {}",
        app.monitor().sweeps_run(),
        app.monitor().high_risk_total(),
        app.store().len()
    );
}

fn print_json_summary(app: &App) -> Result<()> {
    let summary = serde_json::json!({
        "scores": app.biometric().scores(),
        "assessment": app.fraud().last_assessment(),
        "sweeps_run": app.monitor().sweeps_run(),
        "high_risk_total": app.monitor().high_risk_total(),
        "stored_records": app.store().len(),
        "notices": app.notices().drain(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn print_notice(notice: &Notice) {
    let line = match notice.level {
        NoticeLevel::Info => style(format!("i  {}", notice.message)).cyan(),
        NoticeLevel::Success => style(format!("OK {}", notice.message)).green(),
        NoticeLevel::Warning => style(format!("!  {}", notice.message)).yellow(),
        NoticeLevel::Error => style(format!("X  {}", notice.message)).red(),
    };
    println!("  {line}");
}

fn show_status(config: InvigilConfig, format: OutputFormatArg) -> Result<()> {
    match format {
        OutputFormatArg::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "version": invigil::VERSION,
                    "config": config,
                    "active_processes": [],
                }))?
            );
        }
        OutputFormatArg::Human => {
            println!("invigil {}", invigil::VERSION);
            println!(
                "capture window {} ms, scan step {} ms, sweep interval {} ms",
                config.timings.capture_window_ms,
                config.timings.scan_step_delay_ms,
                config.timings.sweep_interval_ms
            );
            println!(
                "verify threshold {}%, auto-approve {}%, outage rate {:.2}",
                config.thresholds.verify_threshold,
                config.thresholds.auto_approve_threshold,
                config.simulation.outage_rate
            );
            println!("No active processes");
        }
    }
    Ok(())
}
