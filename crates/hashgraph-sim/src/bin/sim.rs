#![forbid(unsafe_code)]

use std::env;
use std::ops::Range;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use hashgraph_core::{SemanticsType, config, timing};
use hashgraph_sim::campaign::{self, CampaignConfig};
use hashgraph_sim::network::FaultConfig;
use hashgraph_sim::{SimulationConfig, Simulator};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "hashgraph-sim: deterministic replica convergence simulator",
    long_about = None
)]
struct Cli {
    /// Emit per-phase graph timing to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one seed and print the convergence summary.
    Run {
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[command(flatten)]
        params: SimParams,
    },
    /// Run a range of seeds and report failures.
    Campaign {
        /// Seed range as `start..end`.
        #[arg(long, default_value = "0..100", value_parser = parse_seed_range)]
        seeds: Range<u64>,
        #[command(flatten)]
        params: SimParams,
    },
    /// Re-run one seed and print its full trace.
    Replay {
        seed: u64,
        #[command(flatten)]
        params: SimParams,
    },
}

#[derive(Args, Debug, Clone)]
struct SimParams {
    #[arg(long, default_value_t = 4)]
    replicas: usize,
    #[arg(long, default_value_t = 20)]
    rounds: u64,
    #[arg(long, default_value_t = 2)]
    fanout: usize,
    #[arg(long, default_value_t = 50)]
    emit_percent: u8,
    /// `pair` or `multiple`. Defaults to the user config.
    #[arg(long)]
    semantics: Option<SemanticsType>,
    /// Disable every network fault.
    #[arg(long)]
    reliable: bool,
}

impl SimParams {
    fn campaign_config(&self, seed_range: Range<u64>) -> Result<CampaignConfig> {
        let semantics = match self.semantics {
            Some(s) => s,
            None => config::load_user_config()?.semantics,
        };
        Ok(CampaignConfig {
            seed_range,
            replica_count: self.replicas,
            rounds: self.rounds,
            fanout: self.fanout,
            emit_percent: self.emit_percent,
            semantics,
            fault: if self.reliable {
                FaultConfig::reliable()
            } else {
                FaultConfig::default()
            },
        })
    }
}

fn parse_seed_range(raw: &str) -> Result<Range<u64>> {
    let Some((start, end)) = raw.split_once("..") else {
        bail!("expected start..end, got '{raw}'");
    };
    Ok(start.trim().parse()?..end.trim().parse()?)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("HASHGRAPH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "hashgraph=debug,info"
        } else {
            "hashgraph=info,warn"
        })
    });

    let format = env::var("HASHGRAPH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Commands::Run { seed, params } => {
            let config: SimulationConfig = params
                .campaign_config(*seed..seed.saturating_add(1))?
                .sim_config_for_seed(*seed);
            let result = Simulator::new(config)?.run()?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "seed": seed,
                        "emitted": result.emitted.len(),
                        "trace_events": result.trace.len(),
                        "interesting": result.interesting_state_reached,
                        "convergence": result.convergence,
                    }))?
                );
            } else {
                println!(
                    "seed {seed}: emitted={} trace_events={} converged={} interesting={}",
                    result.emitted.len(),
                    result.trace.len(),
                    result.convergence.passed,
                    result.interesting_state_reached
                );
                for v in &result.convergence.violations {
                    println!("  {v}");
                }
            }
            Ok(result.convergence.passed)
        }
        Commands::Campaign { seeds, params } => {
            let report = campaign::run_campaign(&params.campaign_config(seeds.clone())?)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "seeds run: {}  passed: {}  interesting: {}",
                    report.seeds_run, report.seeds_passed, report.interesting_states_reached
                );
                if let Some(seed) = report.first_failure {
                    println!("first failure: seed {seed} (replay with `hashgraph-sim replay {seed}`)");
                }
                for failure in &report.failures {
                    for v in &failure.violations {
                        println!("  seed {}: {v}", failure.seed);
                    }
                }
            }
            Ok(report.all_passed())
        }
        Commands::Replay { seed, params } => {
            let config = params.campaign_config(*seed..seed.saturating_add(1))?;
            let trace = campaign::replay_seed(*seed, &config)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&trace.result)?);
            } else {
                for event in &trace.result.trace {
                    println!("[{:>3}] {:?}", event.round, event.kind);
                }
                for state in &trace.result.states {
                    println!(
                        "replica {}: vertices={} frontier={} linearized={}",
                        state.id,
                        state.vertices.len(),
                        state.frontier.len(),
                        state.linearization.len()
                    );
                }
                for v in &trace.result.convergence.violations {
                    println!("  {v}");
                }
            }
            Ok(trace.passed())
        }
    }
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let timing_enabled = cli.timing || timing::init_from_env();
    timing::set_enabled(timing_enabled);

    let passed = run(&cli)?;

    if timing_enabled {
        let report = timing::take_report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.render());
            eprintln!("timing report (json):");
            eprintln!("{}", serde_json::to_string_pretty(&report.to_json())?);
        }
    }

    if !passed {
        bail!("convergence check failed");
    }
    Ok(())
}
