//! Seed sweeps over the simulator.
//!
//! A campaign runs one simulation per seed with shared parameters and keeps
//! the failing seeds so any one of them can be replayed with a full trace.

use std::ops::Range;

use anyhow::{Result, bail};
use hashgraph_core::SemanticsType;
use serde::{Deserialize, Serialize};

use crate::network::FaultConfig;
use crate::oracle::InvariantViolation;
use crate::{SimulationConfig, SimulationResult, Simulator};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub seed_range: Range<u64>,
    pub replica_count: usize,
    pub rounds: u64,
    pub fanout: usize,
    pub emit_percent: u8,
    pub semantics: SemanticsType,
    pub fault: FaultConfig,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        Self {
            seed_range: 0..100,
            replica_count: sim.replica_count,
            rounds: sim.rounds,
            fanout: sim.fanout,
            emit_percent: sim.emit_percent,
            semantics: sim.semantics,
            fault: sim.fault,
        }
    }
}

impl CampaignConfig {
    #[must_use]
    pub fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            replica_count: self.replica_count,
            rounds: self.rounds,
            fanout: self.fanout,
            emit_percent: self.emit_percent,
            semantics: self.semantics,
            fault: self.fault,
        }
    }

    /// # Errors
    ///
    /// Returns an error for an empty seed range or an invalid per-seed
    /// simulation config.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!(
                "seed_range {}..{} is empty",
                self.seed_range.start,
                self.seed_range.end
            );
        }
        self.sim_config_for_seed(self.seed_range.start).validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// Lowest failing seed, the natural one to replay first.
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Seeds where some vertex arrived ahead of its dependencies.
    pub interesting_states_reached: usize,
}

impl CampaignReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Full output of one replayed seed.
#[derive(Debug, Clone)]
pub struct DetailedTrace {
    pub config: SimulationConfig,
    pub result: SimulationResult,
}

impl DetailedTrace {
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.result.convergence.passed
    }
}

/// # Errors
///
/// Returns an error if the config is invalid or a simulation fails
/// internally. Invariant violations are reported, not returned as errors.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut report = CampaignReport {
        seeds_run: 0,
        seeds_passed: 0,
        first_failure: None,
        failures: Vec::new(),
        interesting_states_reached: 0,
    };

    for seed in config.seed_range.clone() {
        let result = Simulator::new(config.sim_config_for_seed(seed))?.run()?;
        report.seeds_run += 1;
        if result.interesting_state_reached {
            report.interesting_states_reached += 1;
        }
        if result.convergence.passed {
            report.seeds_passed += 1;
        } else {
            tracing::info!(seed, "seed failed");
            report.first_failure.get_or_insert(seed);
            report.failures.push(SeedFailure {
                seed,
                violations: result
                    .convergence
                    .violations
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            });
        }
    }

    tracing::info!(
        seeds = report.seeds_run,
        passed = report.seeds_passed,
        interesting = report.interesting_states_reached,
        "campaign finished"
    );
    Ok(report)
}

/// `Ok(Err(_))` carries the violations of a seed that ran but failed.
///
/// # Errors
///
/// Returns an error if the simulation itself fails.
pub fn run_single_seed(
    seed: u64,
    config: &CampaignConfig,
) -> Result<std::result::Result<(), Vec<InvariantViolation>>> {
    let result = Simulator::new(config.sim_config_for_seed(seed))?.run()?;
    if result.convergence.passed {
        Ok(Ok(()))
    } else {
        Ok(Err(result.convergence.violations))
    }
}

/// # Errors
///
/// Returns an error when config validation or simulation fails.
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    config.validate()?;
    let sim_config = config.sim_config_for_seed(seed);
    let result = Simulator::new(sim_config.clone())?.run()?;
    Ok(DetailedTrace {
        config: sim_config,
        result,
    })
}
