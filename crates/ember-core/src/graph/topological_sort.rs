// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A stable variant of Kahn's algorithm for topological sorting.
//!
//! Among the nodes that are ready at any point, the one that appears first in
//! the input order is emitted first. A graph whose edges all point forward in
//! the input order therefore sorts to exactly the input order, which is what
//! the frame graph relies on to keep its fixed pass order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;

/// An error indicating that a cycle was detected in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<T> {
    /// Nodes that could not be ordered because they sit on, or behind, a cycle.
    pub unresolved: Vec<T>,
}

/// Performs a topological sort on a generic directed graph.
///
/// # Arguments
///
/// * `nodes`: The unique nodes of the graph, in their preferred order.
/// * `edges`: Directed edges as `(parent, child)` tuples; the parent is
///   emitted before the child. Edges that mention unknown nodes are ignored.
///
/// # Returns
///
/// * `Ok(Vec<T>)`: The nodes in a valid topological order.
/// * `Err(CycleError)`: If the graph contains one or more cycles.
pub fn topological_sort<T>(
    nodes: impl IntoIterator<Item = T>,
    edges: impl IntoIterator<Item = (T, T)>,
) -> Result<Vec<T>, CycleError<T>>
where
    T: Copy + Eq + Hash,
{
    let node_list: Vec<T> = nodes.into_iter().collect();
    if node_list.is_empty() {
        return Ok(Vec::new());
    }

    let position: HashMap<T, usize> = node_list
        .iter()
        .enumerate()
        .map(|(index, node)| (*node, index))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); node_list.len()];
    let mut in_degree = vec![0usize; node_list.len()];

    for (parent, child) in edges {
        let (Some(&p), Some(&c)) = (position.get(&parent), position.get(&child)) else {
            continue;
        };
        children[p].push(c);
        in_degree[c] += 1;
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| Reverse(index))
        .collect();

    let mut sorted = Vec::with_capacity(node_list.len());
    while let Some(Reverse(index)) = ready.pop() {
        sorted.push(node_list[index]);
        for &child in &children[index] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.push(Reverse(child));
            }
        }
    }

    if sorted.len() != node_list.len() {
        let unresolved = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree > 0)
            .map(|(index, _)| node_list[index])
            .collect();
        Err(CycleError { unresolved })
    } else {
        Ok(sorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_edges_keep_input_order() {
        let nodes = [0, 1, 2, 3, 4];
        let edges = [(0, 3), (1, 2), (2, 4), (0, 4)];
        assert_eq!(topological_sort(nodes, edges), Ok(vec![0, 1, 2, 3, 4]));
    }

    #[test]
    fn backward_edge_reorders() {
        let nodes = ["b", "a"];
        let edges = [("a", "b")];
        assert_eq!(topological_sort(nodes, edges), Ok(vec!["a", "b"]));
    }

    #[test]
    fn cycle_is_reported_with_its_members() {
        let nodes = [1, 2, 3, 4];
        let edges = [(1, 2), (2, 3), (3, 2)];
        let err = topological_sort(nodes, edges).unwrap_err();
        assert_eq!(err.unresolved, vec![2, 3]);
    }

    #[test]
    fn empty_graph_sorts_to_nothing() {
        let nodes: [u32; 0] = [];
        assert_eq!(topological_sort(nodes, []), Ok(vec![]));
    }

    #[test]
    fn unknown_edge_endpoints_are_ignored() {
        assert_eq!(topological_sort([7, 8], [(9, 7), (8, 7)]), Ok(vec![8, 7]));
    }
}
