// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Dependency graph construction and wave planning.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Graph Module                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │  task.rs    - Task, TaskId, TaskState                        │
//! │  builder.rs - validation + cycle detection/breaking          │
//! │  └─ find_cyclic_tasks: iterative DFS, white/grey/black       │
//! │  └─ select_cycle_breaker: fewest unmet deps, lowest id       │
//! │  plan.rs    - Kahn-style levels into a WavePlan              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use recall_engine::graph::{DependencyGraph, Task};
//!
//! let graph = DependencyGraph::build(vec![
//!     Task::new(1, "find the population of Lyon"),
//!     Task::new(2, "compare it to Marseille").depends_on([1, 3]),
//!     Task::new(3, "find the population of Marseille"),
//! ]);
//! assert_eq!(graph.plan().waves, vec![vec![1, 3], vec![2]]);
//! ```

pub mod builder;
pub mod plan;
pub mod task;

pub use builder::{find_cyclic_tasks, select_cycle_breaker, CycleResolution, DependencyGraph};
pub use plan::WavePlan;
pub use task::{Task, TaskId, TaskState};
