// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reachability, cycle detection, topological sort and subgraph extraction.
//!
//! These are hand-rolled, iterative (never recursive) DFS/BFS traversals: the module registry's
//! dependency graphs are built from untrusted host input and may be deep, so a recursive
//! postorder walk is not an option (mirrors the source's own preference for Kosaraju's algorithm
//! over Tarjan's for exactly this reason).

use crate::graph::{Direction, EdgeKey, Graph, NodeKey};
use crate::{Error, Result};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

/// Frame of an iterative DFS: the node being visited, its (materialized) neighbor list, and a
/// cursor into that list.
///
/// Most module dependency graphs have only a handful of edges per node, so the neighbor list
/// lives inline up to 8 entries before spilling to the heap.
struct Frame {
    node: NodeKey,
    neighbors: SmallVec<[NodeKey; 8]>,
    cursor: usize,
}

impl<N, E> Graph<N, E> {
    /// Returns true iff there is a path from `a` to `b` following outgoing edges.
    ///
    /// `a == b` is a special case: it returns true iff `a` lies on some cycle, which is checked
    /// by computing whether any node reachable from `a` has an edge back into `a`.
    pub fn path_exists(&self, a: NodeKey, b: NodeKey) -> Result<bool> {
        if !self.contains_node(a) || !self.contains_node(b) {
            return Err(Error::NotFound("path_exists: unknown node".into()));
        }

        let mut visited = HashSet::new();
        visited.insert(a);
        let mut stack = vec![a];
        while let Some(node) = stack.pop() {
            for next in self.neighbors(node, Direction::Outgoing) {
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }

        if a == b {
            Ok(self
                .neighbors(a, Direction::Incoming)
                .any(|src| visited.contains(&src)))
        } else {
            Ok(visited.contains(&b))
        }
    }

    /// Returns true iff the graph contains a directed cycle.
    ///
    /// Iterative DFS with a tri-colour marker set: nodes are `Unvisited`, `Discovered` (on the
    /// current DFS path) or `Finished`. A back-edge into a `Discovered` node means a cycle.
    pub fn is_cyclic(&self) -> bool {
        const DISCOVERED: u8 = 1;
        const FINISHED: u8 = 2;

        let mut color: HashMap<NodeKey, u8> = HashMap::new();
        for start in self.nodes() {
            if color.contains_key(&start) {
                continue;
            }
            let mut stack = vec![Frame {
                node: start,
                neighbors: self.neighbors(start, Direction::Outgoing).collect(),
                cursor: 0,
            }];
            color.insert(start, DISCOVERED);

            while let Some(frame) = stack.last_mut() {
                if frame.cursor < frame.neighbors.len() {
                    let next = frame.neighbors[frame.cursor];
                    frame.cursor += 1;
                    match color.get(&next).copied() {
                        None => {
                            color.insert(next, DISCOVERED);
                            stack.push(Frame {
                                node: next,
                                neighbors: self.neighbors(next, Direction::Outgoing).collect(),
                                cursor: 0,
                            });
                        }
                        Some(DISCOVERED) => return true,
                        _ => {}
                    }
                } else {
                    let node = frame.node;
                    color.insert(node, FINISHED);
                    stack.pop();
                }
            }
        }
        false
    }

    /// A DFS-based topological order (reverse post-order) over edges followed in `direction`.
    ///
    /// For every edge `(s, d)` traversed in `direction`, `s` precedes `d` in the result. Fails
    /// with [`Error::Invalid`] if the graph (restricted to `direction`) contains a cycle.
    pub fn topological_sort(&self, direction: Direction) -> Result<Vec<NodeKey>> {
        const DISCOVERED: u8 = 1;
        const FINISHED: u8 = 2;

        let mut color: HashMap<NodeKey, u8> = HashMap::new();
        let mut post_order = Vec::with_capacity(self.node_count());

        for start in self.nodes() {
            if color.get(&start).copied() == Some(FINISHED) {
                continue;
            }
            let mut stack = vec![Frame {
                node: start,
                neighbors: self.neighbors(start, direction).collect(),
                cursor: 0,
            }];
            color.insert(start, DISCOVERED);

            while let Some(frame) = stack.last_mut() {
                if frame.cursor < frame.neighbors.len() {
                    let next = frame.neighbors[frame.cursor];
                    frame.cursor += 1;
                    match color.get(&next).copied() {
                        None => {
                            color.insert(next, DISCOVERED);
                            stack.push(Frame {
                                node: next,
                                neighbors: self.neighbors(next, direction).collect(),
                                cursor: 0,
                            });
                        }
                        Some(DISCOVERED) => {
                            return Err(Error::Invalid(
                                "topological_sort: graph contains a cycle".into(),
                            ))
                        }
                        _ => {}
                    }
                } else {
                    let node = frame.node;
                    color.insert(node, FINISHED);
                    post_order.push(node);
                    stack.pop();
                }
            }
        }

        post_order.reverse();
        Ok(post_order)
    }

    /// Returns the strongly connected components of this graph (Kosaraju's algorithm, run
    /// iteratively). Each component is returned in ascending key order; components themselves are
    /// in an unspecified but deterministic order.
    pub fn strongly_connected_components(&self) -> Vec<Vec<NodeKey>> {
        let mut visited = HashSet::new();
        let mut finish_order = Vec::with_capacity(self.node_count());

        for start in self.nodes() {
            if visited.contains(&start) {
                continue;
            }
            let mut stack = vec![Frame {
                node: start,
                neighbors: self.neighbors(start, Direction::Outgoing).collect(),
                cursor: 0,
            }];
            visited.insert(start);

            while let Some(frame) = stack.last_mut() {
                if frame.cursor < frame.neighbors.len() {
                    let next = frame.neighbors[frame.cursor];
                    frame.cursor += 1;
                    if visited.insert(next) {
                        stack.push(Frame {
                            node: next,
                            neighbors: self.neighbors(next, Direction::Outgoing).collect(),
                            cursor: 0,
                        });
                    }
                } else {
                    finish_order.push(frame.node);
                    stack.pop();
                }
            }
        }

        let mut assigned = HashSet::new();
        let mut components = Vec::new();
        for &node in finish_order.iter().rev() {
            if assigned.contains(&node) {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![node];
            assigned.insert(node);
            while let Some(n) = stack.pop() {
                component.push(n);
                for next in self.neighbors(n, Direction::Incoming) {
                    if assigned.insert(next) {
                        stack.push(next);
                    }
                }
            }
            component.sort();
            components.push(component);
        }
        components
    }
}

impl<N: Clone, E: Clone> Graph<N, E> {
    /// Produces a structural copy of this graph. `node_mapper`/`edge_mapper` are invoked exactly
    /// once per cloned node/edge, `(old_key, new_key, user_data)`, in ascending old-key order,
    /// nodes entirely before edges.
    pub fn clone_mapped<U>(
        &self,
        mut node_mapper: impl FnMut(NodeKey, NodeKey, &mut U),
        mut edge_mapper: impl FnMut(EdgeKey, EdgeKey, &mut U),
        user_data: &mut U,
    ) -> Graph<N, E> {
        let mut out = Graph::new();
        let mut node_map = HashMap::with_capacity(self.node_count());

        for (&old_key, entry) in self.nodes.iter() {
            let new_key = out
                .add_node(entry.payload.clone())
                .expect("freshly created graph cannot exhaust id space here");
            node_mapper(old_key, new_key, user_data);
            node_map.insert(old_key, new_key);
        }
        for (&old_key, entry) in self.edges.iter() {
            let new_src = node_map[&entry.src];
            let new_dst = node_map[&entry.dst];
            let (new_key, _) = out
                .add_edge(new_src, new_dst, entry.payload.clone())
                .expect("endpoints were just inserted");
            edge_mapper(old_key, new_key, user_data);
        }
        out
    }

    /// Clones the subgraph reachable from `start` via outgoing edges. Mapper callbacks fire once
    /// per newly mapped node/edge, in DFS discovery order; a node-mapping table prevents
    /// double-visits.
    pub fn clone_reachable_subgraph<U>(
        &self,
        start: NodeKey,
        mut node_mapper: impl FnMut(NodeKey, NodeKey, &mut U),
        mut edge_mapper: impl FnMut(EdgeKey, EdgeKey, &mut U),
        user_data: &mut U,
    ) -> Result<Graph<N, E>> {
        if !self.contains_node(start) {
            return Err(Error::NotFound(
                "clone_reachable_subgraph: unknown start node".into(),
            ));
        }

        let mut out = Graph::new();
        let mut node_map = HashMap::new();

        let start_new = out.add_node(self.node_payload(start).unwrap().clone())?;
        node_mapper(start, start_new, user_data);
        node_map.insert(start, start_new);

        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            let new_src = node_map[&node];
            for (&dst, &edge_key) in self.nodes[&node].adjacency.iter() {
                let new_dst = if let Some(&mapped) = node_map.get(&dst) {
                    mapped
                } else {
                    let mapped = out.add_node(self.node_payload(dst).unwrap().clone())?;
                    node_mapper(dst, mapped, user_data);
                    node_map.insert(dst, mapped);
                    stack.push(dst);
                    mapped
                };
                let payload = self.edge_payload(edge_key).unwrap().clone();
                let (new_edge_key, _) = out.add_edge(new_src, new_dst, payload)?;
                edge_mapper(edge_key, new_edge_key, user_data);
            }
        }
        Ok(out)
    }
}
