//! Backlog ordering.
//!
//! Kahn's algorithm with a priority-ordered ready queue: stories become
//! ready once all their present dependencies are emitted, and the ready
//! queue always yields the lowest-priority-number story first.
//!
//! Stories referencing ids that are not in the input never become ready and
//! are silently omitted from the output; that is how phantom dependencies
//! are absorbed. Cycles abort the sort.

use crate::cycle;
use std::collections::HashMap;
use waveplan_core::{PlanError, Story, StoryId};

/// Compute a topological order over `stories`, returned as indices into the
/// input slice.
///
/// Ties are broken by ascending `priority`; equal priorities keep input
/// order. Complexity O(V + E + V log V) due to the ordered ready queue.
pub fn topological_order(stories: &[Story]) -> Result<Vec<usize>, PlanError> {
    if stories.is_empty() {
        return Ok(Vec::new());
    }

    let dependency_map: HashMap<StoryId, Vec<StoryId>> = stories
        .iter()
        .map(|s| (s.id.clone(), s.dependencies.clone()))
        .collect();
    cycle::find_cycle(&dependency_map)?;

    let index: HashMap<&str, usize> = stories
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    // Successor adjacency: dependency -> dependents
    let mut successors: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut in_degree: Vec<usize> = vec![0; stories.len()];
    for (i, story) in stories.iter().enumerate() {
        // Dangling dependencies still count towards the in-degree; nothing
        // ever decrements them, which keeps the story out of the output.
        in_degree[i] = story.dependencies.len();
        for dep in &story.dependencies {
            if let Some(&dep_idx) = index.get(dep.as_str()) {
                successors.entry(dep_idx).or_default().push(i);
            }
        }
    }

    // Ready queue ordered by priority, stable for equal priorities
    let mut ready: Vec<usize> = (0..stories.len())
        .filter(|&i| in_degree[i] == 0)
        .collect();
    ready.sort_by_key(|&i| stories[i].priority);

    let mut order = Vec::with_capacity(stories.len());

    while !ready.is_empty() {
        let current = ready.remove(0);
        order.push(current);

        if let Some(dependents) = successors.get(&current) {
            for &dependent in dependents {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    // Insert after any already-ready story of equal priority
                    let at = ready
                        .partition_point(|&i| stories[i].priority <= stories[dependent].priority);
                    ready.insert(at, dependent);
                }
            }
        }
    }

    Ok(order)
}

/// Convenience wrapper returning the stories themselves in sorted order.
pub fn sort(stories: &[Story]) -> Result<Vec<Story>, PlanError> {
    let order = topological_order(stories)?;
    Ok(order.into_iter().map(|i| stories[i].clone()).collect())
}
