//! Cycle detection over the dependency graph.
//!
//! Depth-first search with three node states. A back edge onto a VISITING
//! node closes a cycle; the reported path runs from the first occurrence of
//! the re-visited node and ends with that node again.

use std::collections::HashMap;
use waveplan_core::{PlanError, StoryId};

#[derive(Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Unvisited,
    Visiting,
    Visited,
}

/// Predicate form: does the dependency graph contain a cycle?
pub fn has_cycle(dependencies: &HashMap<StoryId, Vec<StoryId>>) -> bool {
    find_cycle(dependencies).is_err()
}

/// Fail with `CyclicDependency(path)` when the graph has a cycle.
///
/// Nodes are visited in sorted order so the reported path is stable across
/// runs.
pub fn find_cycle(dependencies: &HashMap<StoryId, Vec<StoryId>>) -> Result<(), PlanError> {
    let mut nodes: Vec<&StoryId> = dependencies.keys().collect();
    for deps in dependencies.values() {
        for dep in deps {
            if !dependencies.contains_key(dep) {
                nodes.push(dep);
            }
        }
    }
    nodes.sort();
    nodes.dedup();

    let mut states: HashMap<&StoryId, NodeState> =
        nodes.iter().map(|&n| (n, NodeState::Unvisited)).collect();

    for &node in &nodes {
        if states[node] == NodeState::Unvisited {
            let mut path: Vec<&StoryId> = Vec::new();
            if let Some(cycle) = dfs(node, dependencies, &mut states, &mut path) {
                return Err(PlanError::CyclicDependency(cycle));
            }
        }
    }

    Ok(())
}

fn dfs<'a>(
    node: &'a StoryId,
    dependencies: &'a HashMap<StoryId, Vec<StoryId>>,
    states: &mut HashMap<&'a StoryId, NodeState>,
    path: &mut Vec<&'a StoryId>,
) -> Option<Vec<StoryId>> {
    states.insert(node, NodeState::Visiting);
    path.push(node);

    for dep in dependencies.get(node).map(Vec::as_slice).unwrap_or(&[]) {
        match states.get(dep).copied().unwrap_or(NodeState::Unvisited) {
            NodeState::Visiting => {
                // Back edge: extract the cycle from the current path
                let start = path.iter().position(|&p| p == dep).unwrap_or(0);
                let mut cycle: Vec<StoryId> = path[start..].iter().map(|&p| p.clone()).collect();
                cycle.push(dep.clone());
                return Some(cycle);
            }
            NodeState::Unvisited => {
                if let Some(cycle) = dfs(dep, dependencies, states, path) {
                    return Some(cycle);
                }
            }
            NodeState::Visited => {}
        }
    }

    states.insert(node, NodeState::Visited);
    path.pop();
    None
}
