//! Replicas converge under arbitrary seeds and fault mixes.

use hashgraph_core::SemanticsType;
use hashgraph_sim::network::FaultConfig;
use hashgraph_sim::{SimulationConfig, Simulator, TraceEventKind};
use proptest::prelude::*;

fn arb_fault() -> impl Strategy<Value = FaultConfig> {
    (0u8..=4, 0u8..=50, 0u8..=30, 0u8..=100, 0u8..=25).prop_map(
        |(max_delay_rounds, drop_percent, duplicate_percent, reorder_percent, partition_percent)| {
            FaultConfig {
                max_delay_rounds,
                drop_percent,
                duplicate_percent,
                reorder_percent,
                partition_percent,
            }
        },
    )
}

fn arb_semantics() -> impl Strategy<Value = SemanticsType> {
    prop_oneof![Just(SemanticsType::Pair), Just(SemanticsType::Multiple)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn replicas_converge(
        seed in any::<u64>(),
        replica_count in 2usize..=5,
        fanout in 1usize..=3,
        emit_percent in 10u8..=90,
        semantics in arb_semantics(),
        fault in arb_fault(),
    ) {
        let config = SimulationConfig {
            seed,
            replica_count,
            rounds: 15,
            fanout,
            emit_percent,
            semantics,
            fault,
        };
        let result = Simulator::new(config).unwrap().run().unwrap();
        prop_assert!(result.convergence.passed, "{:?}", result.convergence.violations);

        let reference = &result.states[0];
        prop_assert_eq!(reference.vertices.len(), result.emitted.len() + 1);
        prop_assert!(reference.linearization.len() <= result.emitted.len());
    }

    #[test]
    fn runs_are_deterministic(seed in any::<u64>(), fault in arb_fault()) {
        let config = SimulationConfig {
            seed,
            replica_count: 3,
            rounds: 10,
            fault,
            ..SimulationConfig::default()
        };
        let a = Simulator::new(config.clone()).unwrap().run().unwrap();
        let b = Simulator::new(config).unwrap().run().unwrap();
        prop_assert_eq!(a, b);
    }
}

#[test]
fn every_emit_is_traced_once() {
    let result = Simulator::new(SimulationConfig {
        seed: 21,
        ..SimulationConfig::default()
    })
    .unwrap()
    .run()
    .unwrap();

    let emits: Vec<_> = result
        .trace
        .iter()
        .filter_map(|e| match &e.kind {
            TraceEventKind::Emit { vertex, .. } => Some(vertex.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(emits.len(), result.emitted.len());
    assert!(emits.iter().all(|h| result.emitted.contains(h)));
}

#[test]
fn last_writer_wins_leaves_one_survivor_per_concurrent_burst() {
    // Everyone writes in round 0 on top of the root only.
    let result = Simulator::new(SimulationConfig {
        seed: 5,
        replica_count: 4,
        rounds: 1,
        emit_percent: 100,
        fault: FaultConfig::reliable(),
        ..SimulationConfig::default()
    })
    .unwrap()
    .run()
    .unwrap();

    assert!(result.convergence.passed);
    assert_eq!(result.emitted.len(), 4);
    for state in &result.states {
        assert_eq!(state.frontier.len(), 4);
        assert_eq!(state.linearization.len(), 1);
    }
}
