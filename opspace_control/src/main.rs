//! # Operational-Space Control Simulator
//!
//! Runs the OSC law in closed loop against a planar point-mass arm.
//!
//! Loads a single TOML file (`[shared]`, `[controller]`, `[arm]`, `[run]`),
//! builds the controller and plant, runs the configured number of ticks
//! and reports the final tracking error and controller compute time.

use clap::Parser;
use opspace_common::config::LogLevel;
use opspace_control::config::SimConfig;
use opspace_control::planar::PlanarArm;
use opspace_control::sim::Simulation;
use std::path::PathBuf;
use std::process;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// Operational-space control simulator
#[derive(Parser, Debug)]
#[command(name = "opspace_sim")]
#[command(version)]
#[command(about = "Closed-loop operational-space control of a planar arm")]
struct Args {
    /// Path to the simulator configuration TOML.
    #[arg(default_value = "config/sim.toml")]
    config: PathBuf,

    /// Override the number of ticks from the config file.
    #[arg(long)]
    ticks: Option<u64>,

    /// Print the final report as JSON on stdout.
    #[arg(long)]
    report_json: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let loaded = SimConfig::load_file(&args.config);

    let level = match (&loaded, args.verbose) {
        (_, true) => Level::DEBUG,
        (Ok(config), false) => config.shared.log_level.into(),
        (Err(_), false) => LogLevel::default().into(),
    };
    setup_tracing(level, args.json);

    info!("opspace_sim v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("FATAL: {}: {e}", args.config.display());
            process::exit(1);
        }
    };

    if let Err(e) = run(&args, config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("opspace_sim finished");
}

fn run(args: &Args, config: SimConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Config OK: service={}, {} links, dt={}s",
        config.shared.service_name,
        config.arm.link_lengths.len(),
        config.run.dt,
    );

    let arm = PlanarArm::new(&config.arm)?;
    let n = config.arm.link_lengths.len();
    let mut settings = config.run.settings();
    if let Some(ticks) = args.ticks {
        settings.ticks = ticks;
    }

    let mut sim = Simulation::new(arm, &config.controller, settings, config.run.initial_state(n))?;
    info!("Parameters: {}", serde_json::to_string(sim.controller().params())?);

    let report = sim.run(None)?;
    info!(
        "Done: {} ticks, |e|={:.5} m, pose=[{:.4}, {:.4}, {:.4}]",
        report.ticks, report.final_error, report.final_pose[0], report.final_pose[1], report.final_pose[2],
    );
    info!(
        "Compute time: avg={} ns, min={} ns, max={} ns, stddev={:.0} ns, regularized ticks={}",
        report.stats.avg_ns(),
        report.stats.min_ns,
        report.stats.max_ns,
        report.stats.stddev_ns(),
        report.stats.regularized_ticks,
    );

    if args.report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

/// Setup tracing subscriber.
fn setup_tracing(level: Level, json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
