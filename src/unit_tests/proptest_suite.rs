// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property-based suites, gated behind the `proptest1` feature.

use crate::graph::{Direction, Graph, NodeKey};
use crate::version::Version;
use proptest::prelude::*;
use std::collections::{HashSet, VecDeque};

/// A DAG over `node_count` nodes, built only from edges `(src, dst)` with `src < dst` so it is
/// acyclic by construction, letting the properties below focus on the graph's own bookkeeping
/// rather than on generating and filtering out cycles.
fn dag_strategy() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (2usize..12).prop_flat_map(|node_count| {
        let edge = (0..node_count - 1).prop_flat_map(move |src| (Just(src), (src + 1)..node_count));
        (Just(node_count), prop::collection::vec(edge, 0..node_count * 2))
    })
}

fn build_dag(node_count: usize, edges: &[(usize, usize)]) -> (Graph<(), ()>, Vec<NodeKey>) {
    let mut g = Graph::new();
    let keys: Vec<NodeKey> = (0..node_count).map(|_| g.add_node(()).unwrap()).collect();
    for &(src, dst) in edges {
        g.add_edge(keys[src], keys[dst], ()).unwrap();
    }
    (g, keys)
}

fn brute_force_reachable(node_count: usize, edges: &[(usize, usize)], from: usize) -> HashSet<usize> {
    let mut adjacency = vec![Vec::new(); node_count];
    for &(src, dst) in edges {
        adjacency[src].push(dst);
    }
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([from]);
    while let Some(node) = queue.pop_front() {
        for &next in &adjacency[node] {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    seen
}

proptest! {
    /// Every node key minted by `add_node` is distinct from every other currently-live key.
    #[test]
    fn node_ids_are_bijective((node_count, edges) in dag_strategy()) {
        let (g, keys) = build_dag(node_count, &edges);
        let unique: HashSet<NodeKey> = keys.iter().copied().collect();
        prop_assert_eq!(unique.len(), keys.len());
        for key in &keys {
            prop_assert!(g.contains_node(*key));
        }
    }

    /// `topological_sort` over a graph that is acyclic by construction always succeeds, and every
    /// edge's source precedes its destination in the returned order.
    #[test]
    fn topological_sort_respects_every_edge((node_count, edges) in dag_strategy()) {
        let (g, keys) = build_dag(node_count, &edges);
        let order = g.topological_sort(Direction::Outgoing).unwrap();
        prop_assert_eq!(order.len(), node_count);
        let position: std::collections::HashMap<NodeKey, usize> =
            order.iter().enumerate().map(|(i, &k)| (k, i)).collect();
        for &(src, dst) in &edges {
            prop_assert!(position[&keys[src]] < position[&keys[dst]]);
        }
    }

    /// `path_exists` agrees with a brute-force BFS over the same edge list.
    #[test]
    fn path_exists_matches_brute_force_reachability((node_count, edges) in dag_strategy()) {
        let (g, keys) = build_dag(node_count, &edges);
        let reachable = brute_force_reachable(node_count, &edges, 0);
        for target in 0..node_count {
            let expected = target == 0 || reachable.contains(&target);
            prop_assert_eq!(g.path_exists(keys[0], keys[target]).unwrap(), expected);
        }
    }

    /// Removing every node one at a time (in arbitrary order) always leaves the graph empty and
    /// never panics, regardless of how entangled the edges were.
    #[test]
    fn removing_every_node_empties_the_graph((node_count, edges) in dag_strategy()) {
        let (mut g, keys) = build_dag(node_count, &edges);
        for key in keys {
            g.remove_node(key).unwrap();
        }
        prop_assert_eq!(g.node_count(), 0);
        prop_assert_eq!(g.edge_count(), 0);
    }

    /// A version is always compatible with itself.
    #[test]
    fn version_is_compatible_with_itself(version: Version) {
        prop_assert!(version.is_compatible_with(&version));
    }
}
