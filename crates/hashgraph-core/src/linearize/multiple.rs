use std::collections::HashMap;

use super::{DropMask, vertices_at};
use crate::dag::graph::HashGraph;
use crate::error::HashGraphError;
use crate::vertex::{Vertex, VertexHash};

/// Scan `order` (origin first), resolving maximal concurrent sets.
pub(super) fn linearize(
    graph: &mut HashGraph,
    order: &[VertexHash],
) -> Result<Vec<Vertex>, HashGraphError> {
    let mut mask = DropMask::new(order.len());
    let mut result = Vec::with_capacity(order.len().saturating_sub(1));

    for i in 1..order.len() {
        if mask.is_dropped(i) {
            continue;
        }
        let anchor = &order[i];

        let mut j = i + 1;
        while j < order.len() {
            if mask.is_dropped(j) || graph.are_causally_related_in_index(anchor, &order[j])? {
                j += 1;
                continue;
            }

            let members = concurrent_set(graph, order, &mask, i, j)?;
            let shown: HashMap<VertexHash, usize> =
                members.iter().map(|&p| (order[p].clone(), p)).collect();
            let resolution = graph.resolve_conflicts(&vertices_at(graph, order, &members));

            if !mask.apply(&resolution, &shown) {
                j += 1;
                continue;
            }
            if mask.is_dropped(i) {
                break;
            }
        }

        if mask.is_dropped(i) {
            continue;
        }
        if let Some(vertex) = graph.get_vertex(anchor) {
            result.push(vertex.clone());
        }
    }

    Ok(result)
}

// Anchor, first candidate, then every later survivor concurrent with all
// members collected so far.
fn concurrent_set(
    graph: &mut HashGraph,
    order: &[VertexHash],
    mask: &DropMask,
    anchor: usize,
    first: usize,
) -> Result<Vec<usize>, HashGraphError> {
    let mut members = vec![anchor, first];
    for k in first + 1..order.len() {
        if mask.is_dropped(k) {
            continue;
        }
        let mut concurrent = true;
        for &m in &members {
            if graph.are_causally_related_in_index(&order[m], &order[k])? {
                concurrent = false;
                break;
            }
        }
        if concurrent {
            members.push(k);
        }
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use crate::config::SemanticsType;
    use crate::dag::graph::HashGraph;
    use crate::resolve::{ConflictPolicies, Resolution};
    use crate::vertex::{Operation, Vertex, VertexHash};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn graph_with(policy: impl Fn(&[Vertex]) -> Resolution + Send + Sync + 'static) -> HashGraph {
        HashGraph::new("p")
            .with_semantics(SemanticsType::Multiple)
            .with_policies(ConflictPolicies {
                acl: None,
                drp: Some(Box::new(policy)),
            })
    }

    fn add(graph: &mut HashGraph, value: &str, deps: &[&VertexHash], ts: i64) -> VertexHash {
        let v = graph.create_vertex(
            Operation::drp("set", json!(value)),
            deps.iter().map(|d| (*d).clone()).collect(),
            ts,
        );
        let hash = v.hash.clone();
        graph.add_vertex(v).unwrap();
        hash
    }

    fn values(vs: &[Vertex]) -> Vec<String> {
        vs.iter()
            .map(|v| v.operation.value.as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn three_way_concurrency_is_one_policy_call() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&calls);
        let mut graph = graph_with(move |vs: &[Vertex]| {
            seen.lock().unwrap().push(vs.len());
            let drop: Vec<_> = vs
                .iter()
                .filter(|v| v.operation.value == json!("c"))
                .map(|v| v.hash.clone())
                .collect();
            if drop.is_empty() {
                Resolution::nop()
            } else {
                Resolution::drop_vertices(drop)
            }
        });
        let root = VertexHash::root();
        add(&mut graph, "a", &[&root], 1);
        add(&mut graph, "b", &[&root], 2);
        add(&mut graph, "c", &[&root], 3);

        let out = graph.linearize_vertices().unwrap();
        let mut got = values(&out);
        got.sort();
        assert_eq!(got, vec!["a", "b"]);
        assert_eq!(calls.lock().unwrap()[0], 3);
    }

    #[test]
    fn dropping_the_anchor_ends_its_scan() {
        // Drop whichever vertex is listed first (always the anchor).
        let mut graph = graph_with(|vs: &[Vertex]| Resolution::drop_vertices(vec![vs[0].hash.clone()]));
        let root = VertexHash::root();
        let a = add(&mut graph, "a", &[&root], 1);
        let b = add(&mut graph, "b", &[&root], 2);

        let out = graph.linearize_vertices().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].hash, a.max(b));
    }

    #[test]
    fn causal_successors_are_kept_when_a_branch_loses() {
        let mut graph = graph_with(|vs: &[Vertex]| {
            let loser = vs
                .iter()
                .find(|v| v.operation.value == json!("x"))
                .map(|v| v.hash.clone());
            loser.map_or_else(Resolution::nop, |h| Resolution::drop_vertices(vec![h]))
        });
        let root = VertexHash::root();
        let x = add(&mut graph, "x", &[&root], 1);
        add(&mut graph, "y", &[&root], 2);
        add(&mut graph, "x2", &[&x], 3);

        let out = values(&graph.linearize_vertices().unwrap());
        assert!(!out.contains(&"x".to_string()));
        assert!(out.contains(&"y".to_string()));
        assert!(out.contains(&"x2".to_string()));
    }

    #[test]
    fn ineffective_drop_terminates() {
        let ghost = VertexHash::new_unchecked("blake3:ghost");
        let mut graph = graph_with(move |_: &[Vertex]| Resolution::drop_vertices(vec![ghost.clone()]));
        let root = VertexHash::root();
        add(&mut graph, "a", &[&root], 1);
        add(&mut graph, "b", &[&root], 2);

        assert_eq!(graph.linearize_vertices().unwrap().len(), 2);
    }
}
