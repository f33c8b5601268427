// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, warn};

use super::builder::{select_cycle_breaker, DependencyGraph};
use super::task::TaskId;

/// Ordered waves of task ids. Ids within a wave are ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WavePlan {
    pub waves: Vec<Vec<TaskId>>,
    /// Tasks forced into a wave of their own with dependencies unmet
    pub forced: Vec<TaskId>,
}

impl WavePlan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.waves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    /// Index of the wave holding `id`.
    #[must_use]
    pub fn wave_of(&self, id: TaskId) -> Option<usize> {
        self.waves.iter().position(|w| w.contains(&id))
    }
}

impl DependencyGraph {
    /// Level the graph into waves.
    ///
    /// Each wave holds every unplanned task whose dependencies are all in
    /// earlier waves. If none qualifies while tasks remain, one task is forced
    /// through on its own using the cycle-breaker rule, so planning always
    /// terminates and covers every task.
    #[must_use]
    pub fn plan(&self) -> WavePlan {
        let mut plan = WavePlan::default();
        let mut planned: BTreeSet<TaskId> = BTreeSet::new();
        let mut remaining: BTreeSet<TaskId> = self.nodes.keys().copied().collect();

        while !remaining.is_empty() {
            let wave: Vec<TaskId> = remaining
                .iter()
                .copied()
                .filter(|id| self.dependencies(*id).iter().all(|d| planned.contains(d)))
                .collect();

            let wave = if wave.is_empty() {
                let Some(forced) = select_cycle_breaker(&remaining, &self.edges, &planned) else {
                    break;
                };
                warn!(task = forced, "No task ready, forcing one through with unmet dependencies");
                plan.forced.push(forced);
                vec![forced]
            } else {
                wave
            };

            for id in &wave {
                remaining.remove(id);
                planned.insert(*id);
            }
            debug!(wave = plan.waves.len(), tasks = ?wave, "Planned wave");
            plan.waves.push(wave);
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Task;
    use std::collections::BTreeMap;

    #[test]
    fn test_independent_tasks_share_first_wave() {
        // A=1, B=2 depends on A, C=3
        let graph = DependencyGraph::build(vec![
            Task::new(1, "A"),
            Task::new(2, "B").depends_on([1]),
            Task::new(3, "C"),
        ]);
        let plan = graph.plan();
        assert_eq!(plan.waves, vec![vec![1, 3], vec![2]]);
        assert!(plan.forced.is_empty());
    }

    #[test]
    fn test_cycle_plans_two_singleton_waves() {
        let graph = DependencyGraph::build(vec![
            Task::new(1, "A").depends_on([2]),
            Task::new(2, "B").depends_on([1]),
        ]);
        let plan = graph.plan();
        assert_eq!(plan.waves, vec![vec![1], vec![2]]);
        assert_eq!(graph.resolutions.len() + plan.forced.len(), 1);
    }

    #[test]
    fn test_diamond() {
        let graph = DependencyGraph::build(vec![
            Task::new(1, "root"),
            Task::new(2, "left").depends_on([1]),
            Task::new(3, "right").depends_on([1]),
            Task::new(4, "join").depends_on([2, 3]),
        ]);
        let plan = graph.plan();
        assert_eq!(plan.waves, vec![vec![1], vec![2, 3], vec![4]]);
        assert_eq!(plan.wave_of(4), Some(2));
        assert_eq!(plan.wave_of(9), None);
    }

    #[test]
    fn test_forced_fallback_on_hand_built_cycle() {
        // Bypass build() so the cycle survives into planning
        let mut graph = DependencyGraph::build(vec![Task::new(1, "a"), Task::new(2, "b")]);
        graph.edges = BTreeMap::from([(1, vec![2]), (2, vec![1])]);

        let plan = graph.plan();
        assert_eq!(plan.forced, vec![1]);
        assert_eq!(plan.waves, vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_empty_graph() {
        let plan = DependencyGraph::build(Vec::new()).plan();
        assert!(plan.is_empty());
    }
}
