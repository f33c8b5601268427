// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, warn};

use super::task::{Task, TaskId, TaskState};
use crate::metrics;

/// One cycle-breaking decision made while building the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleResolution {
    /// Task whose dependencies were dropped
    pub task: TaskId,
    /// Dependencies removed from `task`
    pub removed: Vec<TaskId>,
    /// Every task detected as cyclic in that round
    pub cycle: Vec<TaskId>,
}

/// Validated, acyclic task graph.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub nodes: BTreeMap<TaskId, Task>,
    /// task → its remaining dependencies (sorted, unique)
    pub edges: BTreeMap<TaskId, Vec<TaskId>>,
    /// (task, dependency) pairs removed to break cycles
    pub broken_edges: Vec<(TaskId, TaskId)>,
    pub resolutions: Vec<CycleResolution>,
}

impl DependencyGraph {
    /// Build a graph from decomposed tasks.
    ///
    /// Unknown, self-referencing and duplicate dependencies are dropped.
    /// Duplicate task ids keep the first occurrence. Cycles are broken
    /// deterministically by [`select_cycle_breaker`].
    pub fn build(tasks: Vec<Task>) -> Self {
        let mut nodes: BTreeMap<TaskId, Task> = BTreeMap::new();
        for task in tasks {
            if nodes.contains_key(&task.id) {
                debug!(task = task.id, "Dropping duplicate task id");
                continue;
            }
            nodes.insert(task.id, task);
        }

        let mut edges: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();
        for (id, task) in &nodes {
            let mut deps = BTreeSet::new();
            for dep in &task.depends_on {
                if *dep == *id {
                    debug!(task = id, "Dropping self-dependency");
                } else if !nodes.contains_key(dep) {
                    debug!(task = id, dependency = dep, "Dropping dependency on unknown task");
                } else if !deps.insert(*dep) {
                    debug!(task = id, dependency = dep, "Dropping duplicate dependency");
                }
            }
            edges.insert(*id, deps.into_iter().collect());
        }

        let mut graph = Self {
            nodes,
            edges,
            broken_edges: Vec::new(),
            resolutions: Vec::new(),
        };
        graph.resolve_cycles();

        for (id, task) in graph.nodes.iter_mut() {
            let blocked = graph.edges.get(id).is_some_and(|d| !d.is_empty());
            task.state = if blocked { TaskState::Pending } else { TaskState::Ready };
        }
        graph
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remaining dependencies of `id` (empty for unknown ids).
    #[must_use]
    pub fn dependencies(&self, id: TaskId) -> &[TaskId] {
        self.edges.get(&id).map_or(&[], Vec::as_slice)
    }

    /// True when no dependency cycle remains.
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        find_cyclic_tasks(&self.edges).is_empty()
    }

    fn resolve_cycles(&mut self) {
        let no_progress = BTreeSet::new();
        for _round in 0..self.nodes.len() {
            let cyclic = find_cyclic_tasks(&self.edges);
            if cyclic.is_empty() {
                break;
            }
            let Some(breaker) = select_cycle_breaker(&cyclic, &self.edges, &no_progress) else {
                break;
            };

            let deps = self.edges.entry(breaker).or_default();
            let (removed, kept): (Vec<TaskId>, Vec<TaskId>) =
                deps.iter().copied().partition(|d| cyclic.contains(d));
            *deps = kept;

            warn!(
                task = breaker,
                removed = ?removed,
                cycle = ?cyclic,
                "Dependency cycle detected, dropping edges"
            );
            self.broken_edges.extend(removed.iter().map(|d| (breaker, *d)));
            self.resolutions.push(CycleResolution {
                task: breaker,
                removed,
                cycle: cyclic.into_iter().collect(),
            });
        }
        if !self.resolutions.is_empty() {
            metrics::record_cycle_resolution(self.resolutions.len());
        }
    }
}

/// Choose the task to schedule with its dependencies ignored.
///
/// Fewest dependencies not yet in `satisfied` wins; ties go to the lowest id.
#[must_use]
pub fn select_cycle_breaker(
    candidates: &BTreeSet<TaskId>,
    edges: &BTreeMap<TaskId, Vec<TaskId>>,
    satisfied: &BTreeSet<TaskId>,
) -> Option<TaskId> {
    candidates
        .iter()
        .map(|id| {
            let unmet = edges
                .get(id)
                .map_or(0, |deps| deps.iter().filter(|d| !satisfied.contains(d)).count());
            (unmet, *id)
        })
        .min()
        .map(|(_, id)| id)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Grey,
    Black,
}

/// Tasks lying on a dependency cycle.
///
/// Iterative DFS over an index arena with white/grey/black marks. On every
/// back edge, each task on the stack from the target up is marked cyclic.
#[must_use]
pub fn find_cyclic_tasks(edges: &BTreeMap<TaskId, Vec<TaskId>>) -> BTreeSet<TaskId> {
    let ids: Vec<TaskId> = edges.keys().copied().collect();
    let index: BTreeMap<TaskId, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let adjacency: Vec<Vec<usize>> = ids
        .iter()
        .map(|id| {
            edges[id]
                .iter()
                .filter_map(|d| index.get(d).copied())
                .collect()
        })
        .collect();

    let mut marks = vec![Mark::White; ids.len()];
    let mut cyclic = vec![false; ids.len()];
    // (node, next child position)
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..ids.len() {
        if marks[root] != Mark::White {
            continue;
        }
        marks[root] = Mark::Grey;
        stack.push((root, 0));

        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            if let Some(&child) = adjacency[node].get(next) {
                top.1 += 1;
                match marks[child] {
                    Mark::White => {
                        marks[child] = Mark::Grey;
                        stack.push((child, 0));
                    }
                    Mark::Grey => {
                        let start = stack.iter().rposition(|(n, _)| *n == child).unwrap_or(0);
                        for (n, _) in &stack[start..] {
                            cyclic[*n] = true;
                        }
                    }
                    Mark::Black => {}
                }
            } else {
                marks[node] = Mark::Black;
                stack.pop();
            }
        }
    }

    ids.into_iter()
        .zip(cyclic)
        .filter_map(|(id, c)| c.then_some(id))
        .collect()
}
