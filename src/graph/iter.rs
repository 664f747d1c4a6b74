// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::graph::{Direction, EdgeKey, Graph, NodeKey};

impl<N, E> Graph<N, E> {
    /// Iterates over every live node key, in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.nodes.keys().copied()
    }

    /// Iterates over every live edge as `(key, src, dst)`, in ascending key order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeKey, NodeKey, NodeKey)> + '_ {
        self.edges.iter().map(|(&key, e)| (key, e.src, e.dst))
    }

    /// Nodes with an empty adjacency set in `direction`: no outgoing edges for
    /// [`Direction::Outgoing`], no incoming edges for [`Direction::Incoming`].
    pub fn externals(&self, direction: Direction) -> impl Iterator<Item = NodeKey> + '_ {
        self.nodes.iter().filter_map(move |(&key, entry)| {
            let empty = match direction {
                Direction::Outgoing => entry.adjacency.is_empty(),
                Direction::Incoming => entry.inv_adjacency.is_empty(),
            };
            empty.then_some(key)
        })
    }

    /// Neighbors of `node` in `direction`, in ascending key order. Empty if `node` is unknown.
    pub fn neighbors(&self, node: NodeKey, direction: Direction) -> impl Iterator<Item = NodeKey> + '_ {
        self.adjacency(node, direction)
            .into_iter()
            .flat_map(|map| map.keys().copied())
    }

    /// Edges incident to `node` in `direction`, in ascending neighbor-key order.
    pub fn neighbor_edges(
        &self,
        node: NodeKey,
        direction: Direction,
    ) -> impl Iterator<Item = EdgeKey> + '_ {
        self.adjacency(node, direction)
            .into_iter()
            .flat_map(|map| map.values().copied())
    }
}
