//! Fault-injecting gossip network.
//!
//! Messages carry whole vertices between replicas. Each send may be dropped,
//! duplicated or delayed, and each delivery batch may be shuffled. Replicas
//! can be isolated; sends from or to an isolated replica are lost.

use std::collections::BTreeSet;

use hashgraph_core::Vertex;
use serde::{Deserialize, Serialize};

use crate::replica::ReplicaId;
use crate::rng::DeterministicRng;

/// Fault probabilities, as integer percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultConfig {
    #[serde(default = "default_max_delay")]
    pub max_delay_rounds: u8,
    #[serde(default)]
    pub drop_percent: u8,
    #[serde(default)]
    pub duplicate_percent: u8,
    #[serde(default)]
    pub reorder_percent: u8,
    /// Chance per round of isolating or reconnecting one replica.
    #[serde(default)]
    pub partition_percent: u8,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            max_delay_rounds: default_max_delay(),
            drop_percent: 5,
            duplicate_percent: 5,
            reorder_percent: 10,
            partition_percent: 3,
        }
    }
}

impl FaultConfig {
    /// No faults at all: every message arrives, in order, next round.
    #[must_use]
    pub const fn reliable() -> Self {
        Self {
            max_delay_rounds: 0,
            drop_percent: 0,
            duplicate_percent: 0,
            reorder_percent: 0,
            partition_percent: 0,
        }
    }
}

const fn default_max_delay() -> u8 {
    2
}

/// A vertex in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Sender.
    pub from: ReplicaId,
    /// Recipient.
    pub to: ReplicaId,
    pub vertex: Vertex,
}

#[derive(Debug, Clone)]
struct InFlight {
    due: u64,
    envelope: Envelope,
}

/// What happened to one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendFate {
    /// Dropped, or either end was partitioned.
    Lost,
    /// Delivered `delay` rounds after the next one. `duplicated` means a
    /// second copy was queued as well.
    Queued { delay: u8, duplicated: bool },
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedNetwork {
    in_flight: Vec<InFlight>,
    isolated: BTreeSet<ReplicaId>,
    fault: FaultConfig,
}

impl SimulatedNetwork {
    #[must_use]
    pub fn new(fault: FaultConfig) -> Self {
        Self {
            in_flight: Vec::new(),
            isolated: BTreeSet::new(),
            fault,
        }
    }

    #[must_use]
    pub const fn fault(&self) -> FaultConfig {
        self.fault
    }

    #[must_use]
    pub fn is_isolated(&self, replica: ReplicaId) -> bool {
        self.isolated.contains(&replica)
    }

    /// Flip a replica's isolation. Returns the new state.
    pub fn toggle_isolation(&mut self, replica: ReplicaId) -> bool {
        if self.isolated.remove(&replica) {
            false
        } else {
            self.isolated.insert(replica);
            true
        }
    }

    /// Reconnect every replica.
    pub fn heal(&mut self) {
        self.isolated.clear();
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn send(&mut self, envelope: Envelope, round: u64, rng: &mut DeterministicRng) -> SendFate {
        if self.is_isolated(envelope.from)
            || self.is_isolated(envelope.to)
            || rng.chance(self.fault.drop_percent)
        {
            return SendFate::Lost;
        }

        let delay = u8::try_from(rng.below(usize::from(self.fault.max_delay_rounds) + 1))
            .unwrap_or(self.fault.max_delay_rounds);
        let due = round.saturating_add(1).saturating_add(u64::from(delay));

        let duplicated = rng.chance(self.fault.duplicate_percent);
        if duplicated {
            self.in_flight.push(InFlight {
                due,
                envelope: envelope.clone(),
            });
        }
        self.in_flight.push(InFlight { due, envelope });

        SendFate::Queued { delay, duplicated }
    }

    /// Remove and return every message due by `round`. The second value is
    /// `true` when the batch was shuffled.
    pub fn deliver_due(&mut self, round: u64, rng: &mut DeterministicRng) -> (Vec<Envelope>, bool) {
        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|m| m.due <= round);
        self.in_flight = later;

        let mut batch: Vec<Envelope> = due.into_iter().map(|m| m.envelope).collect();
        let shuffled = batch.len() > 1 && rng.chance(self.fault.reorder_percent);
        if shuffled {
            rng.shuffle(&mut batch);
        }
        (batch, shuffled)
    }

    /// Remove and return everything still in flight, regardless of delay.
    pub fn drain(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.in_flight)
            .into_iter()
            .map(|m| m.envelope)
            .collect()
    }
}
