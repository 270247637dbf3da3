use std::collections::HashSet;

use hashgraph_core::{
    ActionType, ConflictPolicies, HashGraph, HashGraphConfig, Operation, ROOT_HASH, Resolution,
    SemanticsType, Vertex, VertexHash, verify_chain,
};
use serde_json::json;

use generators::*;

fn lww_graph(peer: &str, semantics: SemanticsType) -> HashGraph {
    HashGraph::new(peer)
        .with_semantics(semantics)
        .with_policies(ConflictPolicies {
            acl: None,
            drp: Some(Box::new(keep_largest_hash)),
        })
}

#[test]
fn empty_graph() {
    let mut graph = HashGraph::new("p1");
    assert_eq!(graph.get_frontier(), vec![VertexHash::root()]);
    assert_eq!(graph.get_frontier()[0].as_str(), ROOT_HASH);
    assert!(graph.linearize_vertices().unwrap().is_empty());
}

#[test]
fn two_concurrent_vertices_without_policy_come_out_in_hash_order() {
    let mut graph = HashGraph::new("p1");
    let root = VertexHash::root();
    let a = graph.create_vertex(Operation::drp("set", json!("A")), vec![root.clone()], 1);
    let b = graph.create_vertex(Operation::drp("set", json!("B")), vec![root], 2);
    graph.add_vertex(a.clone()).unwrap();
    graph.add_vertex(b.clone()).unwrap();

    let mut expected = vec![a.hash, b.hash];
    expected.sort();
    assert_eq!(hashes(&graph.linearize_vertices().unwrap()), expected);
}

#[test]
fn last_writer_policy_keeps_exactly_one() {
    for semantics in [SemanticsType::Multiple, SemanticsType::Pair] {
        let mut graph = lww_graph("p1", semantics);
        let root = VertexHash::root();
        let a = graph.create_vertex(Operation::drp("set", json!("A")), vec![root.clone()], 1);
        let b = graph.create_vertex(Operation::drp("set", json!("B")), vec![root], 2);
        graph.add_vertex(a.clone()).unwrap();
        graph.add_vertex(b.clone()).unwrap();

        let out = hashes(&graph.linearize_vertices().unwrap());
        assert_eq!(out, vec![a.hash.clone().max(b.hash.clone())], "{semantics}");
    }
}

#[test]
fn three_way_concurrency_dropping_c() {
    let policy = |vs: &[Vertex]| {
        let c: Vec<_> = vs
            .iter()
            .filter(|v| v.operation.value == json!("C"))
            .map(|v| v.hash.clone())
            .collect();
        if c.is_empty() {
            Resolution::nop()
        } else {
            Resolution::drop_vertices(c)
        }
    };
    for semantics in [SemanticsType::Multiple, SemanticsType::Pair] {
        let mut graph = HashGraph::new("p1")
            .with_semantics(semantics)
            .with_policies(ConflictPolicies {
                acl: None,
                drp: Some(Box::new(policy)),
            });
        let root = VertexHash::root();
        for (i, name) in ["A", "B", "C"].into_iter().enumerate() {
            let v = graph.create_vertex(
                Operation::drp("set", json!(name)),
                vec![root.clone()],
                i64::try_from(i).unwrap(),
            );
            graph.add_vertex(v).unwrap();
        }

        let out = graph.linearize_vertices().unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.operation.value != json!("C")));
    }
}

#[test]
fn acl_sets_go_to_the_acl_policy() {
    let mut graph = HashGraph::new("admin").with_policies(ConflictPolicies {
        // Revokes beat concurrent grants.
        acl: Some(Box::new(|vs: &[Vertex]| {
            if vs.iter().any(|v| v.operation.op_type == "revoke") {
                Resolution::drop_vertices(
                    vs.iter()
                        .filter(|v| v.operation.op_type == "grant")
                        .map(|v| v.hash.clone())
                        .collect(),
                )
            } else {
                Resolution::nop()
            }
        })),
        drp: None,
    });
    let root = VertexHash::root();
    let grant = graph.create_vertex(Operation::acl("grant", json!("p2")), vec![root.clone()], 1);
    let revoke = graph.create_vertex(Operation::acl("revoke", json!("p2")), vec![root], 2);
    graph.add_vertex(grant).unwrap();
    graph.add_vertex(revoke.clone()).unwrap();

    let out = graph.linearize_vertices().unwrap();
    assert_eq!(hashes(&out), vec![revoke.hash]);
}

#[test]
fn replicas_converge_after_exchanging_vertices() {
    let mut p1 = lww_graph("p1", SemanticsType::Multiple);
    let mut p2 = lww_graph("p2", SemanticsType::Multiple);

    let v1 = p1.create_vertex(Operation::drp("set", json!(1)), p1.get_frontier(), 10);
    p1.add_vertex(v1.clone()).unwrap();
    let v2 = p2.create_vertex(Operation::drp("set", json!(2)), p2.get_frontier(), 11);
    p2.add_vertex(v2.clone()).unwrap();

    p1.add_vertex(v2).unwrap();
    p2.add_vertex(v1).unwrap();

    let merge = p1.create_vertex(Operation::drp("set", json!(3)), p1.get_frontier(), 12);
    p1.add_vertex(merge.clone()).unwrap();
    p2.add_vertex(merge.clone()).unwrap();

    assert_eq!(p1.get_frontier(), vec![merge.hash.clone()]);
    assert_eq!(p2.get_frontier(), vec![merge.hash]);
    assert_eq!(
        hashes(&p1.linearize_vertices().unwrap()),
        hashes(&p2.linearize_vertices().unwrap())
    );
}

#[test]
fn scoped_linearization_covers_only_the_subgraph() {
    let mut graph = HashGraph::new("p1");
    let root = VertexHash::root();
    let a = graph.create_vertex(Operation::drp("set", json!("a")), vec![root.clone()], 1);
    let b = graph.create_vertex(Operation::drp("set", json!("b")), vec![a.hash.clone()], 2);
    let c = graph.create_vertex(Operation::drp("set", json!("c")), vec![root], 3);
    for v in [&a, &b, &c] {
        graph.add_vertex(v.clone()).unwrap();
    }

    let scope: HashSet<_> = [a.hash.clone(), b.hash.clone()].into_iter().collect();
    let out = graph.linearize_vertices_from(&a.hash, &scope).unwrap();
    assert_eq!(hashes(&out), vec![b.hash]);

    // The full-graph query afterwards sees c again.
    assert_eq!(graph.linearize_vertices().unwrap().len(), 3);
}

#[test]
fn causal_queries_after_scoped_linearization_see_the_whole_graph() {
    // root -> a -> e -> x, and d depends on a and x. Only the path through
    // x relates e and d, and x is outside the scope.
    let shape = DagShape {
        parents: vec![vec![0], vec![1], vec![2], vec![1, 3]],
    };
    let vertices = shape.vertices();
    let [a, e, _x, d] = [0, 1, 2, 3].map(|i| vertices[i].hash.clone());
    let mut graph = build(HashGraph::new("p1"), &vertices);

    let scope: HashSet<_> = [a.clone(), e.clone(), d.clone()].into_iter().collect();
    graph.linearize_vertices_from(&a, &scope).unwrap();

    assert!(graph.are_causally_related_using_bfs(&e, &d).unwrap());
    assert!(graph.are_causally_related_using_bitsets(&e, &d).unwrap());
    assert!(graph.is_index_full());

    let all = graph.topological_sort().unwrap();
    graph.linearize_vertices_from(&a, &scope).unwrap();
    for p in &all {
        for q in &all {
            assert_eq!(
                graph.are_causally_related_using_bitsets(p, q).unwrap(),
                graph.are_causally_related_using_bfs(p, q).unwrap(),
                "disagreement on {p} / {q}"
            );
        }
    }
}

#[test]
fn graph_contents_pass_chain_verification() {
    let shape = DagShape {
        parents: vec![vec![0], vec![0], vec![1, 2], vec![3, 1]],
    };
    let graph = build(HashGraph::new("observer"), &shape.vertices());
    let all: Vec<Vertex> = graph.get_all_vertices();
    let refs: Vec<&Vertex> = all.iter().collect();
    assert!(verify_chain(&refs).is_ok());
}

#[test]
fn config_drives_semantics() {
    let config = HashGraphConfig {
        semantics: SemanticsType::Pair,
        initial_bitset_capacity: 64,
    };
    let graph = HashGraph::with_config("p1", &config);
    assert_eq!(graph.semantics(), SemanticsType::Pair);
    assert_eq!(graph.current_bitset_size(), 64);
    assert_eq!(graph.resolve_conflicts(&[]).action, ActionType::Nop);
}
