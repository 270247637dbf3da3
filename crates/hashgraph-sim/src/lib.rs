//! Deterministic multi-replica simulation for hashgraph convergence.
//!
//! A [`Simulator`] runs a fixed number of rounds. Each round some replicas
//! author a vertex and gossip it to a few peers over a [`SimulatedNetwork`]
//! that drops, duplicates, delays and reorders messages. After the last
//! round the network heals, replicas run pairwise anti-entropy until nothing
//! changes, and the [`ConvergenceOracle`] checks the end states.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **Randomness**: Every decision draws from a [`DeterministicRng`] seeded
//!   from [`SimulationConfig::seed`].

pub mod campaign;
pub mod network;
pub mod oracle;
pub mod replica;
pub mod rng;

use std::collections::BTreeSet;

use anyhow::{Result, bail};
use hashgraph_core::{SemanticsType, VertexHash};
use serde::{Deserialize, Serialize};

use crate::network::{Envelope, FaultConfig, SendFate, SimulatedNetwork};
use crate::oracle::{ConvergenceOracle, OracleResult};
use crate::replica::{Receipt, Replica, ReplicaId, ReplicaState};
use crate::rng::DeterministicRng;

// ── Configuration ────────────────────────────────────────────────────────────

/// Parameters for one deterministic simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seed for every random choice in the run. Same seed, same trace.
    pub seed: u64,
    /// Number of replicas, each with its own graph. Must be > 0.
    pub replica_count: usize,
    /// Emit-and-deliver rounds before the network is healed and drained.
    /// Must be > 0.
    pub rounds: u64,
    /// Peers each new vertex is pushed to.
    pub fanout: usize,
    /// Chance per round that a given replica authors a vertex (0..=100).
    pub emit_percent: u8,
    /// Linearization semantics every replica uses.
    pub semantics: SemanticsType,
    /// Network faults injected while rounds are running.
    pub fault: FaultConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            replica_count: 4,
            rounds: 20,
            fanout: 2,
            emit_percent: 50,
            semantics: SemanticsType::default(),
            fault: FaultConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// # Errors
    ///
    /// Returns an error if any parameter is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.replica_count == 0 {
            bail!("replica_count must be > 0");
        }
        if self.rounds == 0 {
            bail!("rounds must be > 0");
        }
        if self.emit_percent > 100 {
            bail!("emit_percent must be <= 100, got {}", self.emit_percent);
        }
        let fault = &self.fault;
        for (name, value) in [
            ("drop_percent", fault.drop_percent),
            ("duplicate_percent", fault.duplicate_percent),
            ("reorder_percent", fault.reorder_percent),
            ("partition_percent", fault.partition_percent),
        ] {
            if value > 100 {
                bail!("fault.{name} must be <= 100, got {value}");
            }
        }
        Ok(())
    }
}

// ── Trace ────────────────────────────────────────────────────────────────────

/// One step of a run, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Round the event happened in. Events after healing are stamped with
    /// `rounds`, one past the last regular round.
    pub round: u64,
    pub kind: TraceEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEventKind {
    Emit {
        replica: ReplicaId,
        vertex: VertexHash,
    },
    Send {
        from: ReplicaId,
        to: ReplicaId,
        vertex: VertexHash,
        fate: SendFate,
    },
    Deliver {
        from: ReplicaId,
        to: ReplicaId,
        vertex: VertexHash,
        receipt: Receipt,
    },
    Partition {
        replica: ReplicaId,
        isolated: bool,
    },
    /// One anti-entropy exchange after healing.
    Sync {
        from: ReplicaId,
        to: ReplicaId,
        vertices: usize,
    },
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Every emit, send, delivery, partition and sync, in order.
    pub trace: Vec<TraceEvent>,
    /// Final state of each replica, indexed by replica id.
    pub states: Vec<ReplicaState>,
    /// Hashes of every vertex authored during the run.
    pub emitted: BTreeSet<VertexHash>,
    /// Verdict of the convergence checks over `states`.
    pub convergence: OracleResult,
    /// A replica had to buffer a vertex that arrived ahead of its
    /// dependencies, so causal delivery was actually exercised.
    pub interesting_state_reached: bool,
}

// ── Simulator ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Simulator {
    config: SimulationConfig,
    replicas: Vec<Replica>,
    network: SimulatedNetwork,
    rng: DeterministicRng,
    trace: Vec<TraceEvent>,
    emitted: BTreeSet<VertexHash>,
    buffered_any: bool,
}

impl Simulator {
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let replicas = (0..config.replica_count)
            .map(|id| Replica::new(id, config.semantics))
            .collect();
        Ok(Self {
            network: SimulatedNetwork::new(config.fault),
            rng: DeterministicRng::new(config.seed),
            replicas,
            config,
            trace: Vec::new(),
            emitted: BTreeSet::new(),
            buffered_any: false,
        })
    }

    /// Run every round, settle, and check convergence.
    ///
    /// # Errors
    ///
    /// Returns an error if a replica's graph reports an internal failure.
    pub fn run(mut self) -> Result<SimulationResult> {
        tracing::debug!(
            seed = self.config.seed,
            replicas = self.config.replica_count,
            rounds = self.config.rounds,
            "simulation start"
        );

        for round in 0..self.config.rounds {
            self.maybe_partition(round);
            self.emit_round(round)?;
            let (batch, _) = self.network.deliver_due(round, &mut self.rng);
            self.deliver(round, batch)?;
        }

        let settle = self.config.rounds;
        self.network.heal();
        let pending = self.network.drain();
        self.deliver(settle, pending)?;
        self.anti_entropy(settle)?;

        let states = self
            .replicas
            .iter_mut()
            .map(Replica::snapshot)
            .collect::<Result<Vec<_>>>()?;
        let convergence = ConvergenceOracle::check_all(&states, &self.emitted);

        if convergence.passed {
            tracing::debug!(seed = self.config.seed, vertices = self.emitted.len(), "converged");
        } else {
            tracing::warn!(
                seed = self.config.seed,
                violations = convergence.violations.len(),
                "replicas failed to converge"
            );
        }

        Ok(SimulationResult {
            trace: self.trace,
            states,
            emitted: self.emitted,
            convergence,
            interesting_state_reached: self.buffered_any,
        })
    }

    fn record(&mut self, round: u64, kind: TraceEventKind) {
        self.trace.push(TraceEvent { round, kind });
    }

    fn maybe_partition(&mut self, round: u64) {
        if self.replicas.len() < 2 || !self.rng.chance(self.config.fault.partition_percent) {
            return;
        }
        let replica = self.rng.below(self.replicas.len());
        let isolated = self.network.toggle_isolation(replica);
        self.record(round, TraceEventKind::Partition { replica, isolated });
    }

    fn emit_round(&mut self, round: u64) -> Result<()> {
        for id in 0..self.replicas.len() {
            if !self.rng.chance(self.config.emit_percent) {
                continue;
            }
            let vertex = self.replicas[id].emit(round)?;
            self.emitted.insert(vertex.hash.clone());
            self.record(
                round,
                TraceEventKind::Emit {
                    replica: id,
                    vertex: vertex.hash.clone(),
                },
            );

            let mut peers: Vec<ReplicaId> = (0..self.replicas.len()).filter(|&p| p != id).collect();
            self.rng.shuffle(&mut peers);
            peers.truncate(self.config.fanout);
            for to in peers {
                let hash = vertex.hash.clone();
                let fate = self.network.send(
                    Envelope {
                        from: id,
                        to,
                        vertex: vertex.clone(),
                    },
                    round,
                    &mut self.rng,
                );
                self.record(
                    round,
                    TraceEventKind::Send {
                        from: id,
                        to,
                        vertex: hash,
                        fate,
                    },
                );
            }
        }
        Ok(())
    }

    fn deliver(&mut self, round: u64, batch: Vec<Envelope>) -> Result<()> {
        for Envelope { from, to, vertex } in batch {
            let hash = vertex.hash.clone();
            let receipt = self.replicas[to].receive(vertex)?;
            self.buffered_any |= receipt == Receipt::Buffered;
            self.record(
                round,
                TraceEventKind::Deliver {
                    from,
                    to,
                    vertex: hash,
                    receipt,
                },
            );
        }
        Ok(())
    }

    // Pull from every peer until a full pass moves nothing.
    fn anti_entropy(&mut self, round: u64) -> Result<()> {
        let n = self.replicas.len();
        let mut passes = 0_usize;
        loop {
            passes += 1;
            let mut moved = 0_usize;
            for to in 0..n {
                for from in (0..n).filter(|&f| f != to) {
                    let missing = self.replicas[to].missing_from(&self.replicas[from])?;
                    if missing.is_empty() {
                        continue;
                    }
                    let count = missing.len();
                    for vertex in missing {
                        self.replicas[to].receive(vertex)?;
                    }
                    moved += count;
                    self.record(
                        round,
                        TraceEventKind::Sync {
                            from,
                            to,
                            vertices: count,
                        },
                    );
                }
            }
            if moved == 0 {
                break;
            }
        }
        tracing::trace!(passes, "anti-entropy settled");
        Ok(())
    }
}
