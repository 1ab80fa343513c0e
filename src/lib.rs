//! Capstone defense scheduling.
//!
//! Assigns examination panels to student projects, places every defense in
//! a timeslot, and labels rooms so that concurrent defenses never share
//! one. When no schedule exists, the failure is attributed to concrete
//! causes (capacity deficits, missing common availability, slot shortage).
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Project`, `Panelist`, `TimeSlot`,
//!   `PanelAssignment`, `DefenseSchedule`, `RoomPlan`, raw input tables
//! - **`validation`**, **`dataset`**: Input integrity checks and the
//!   normalized, indexed problem
//! - **`milp`**: Solver-agnostic linear model, the `MilpSolver` seam, and
//!   the bundled `good_lp` backend
//! - **`assignment`**: Phase 1 model (panelist ↔ project)
//! - **`timetable`**: Phase 2 model (project ↔ slot)
//! - **`rooms`**: Greedy interval coloring into room labels
//! - **`diagnostics`**: Infeasibility attribution
//! - **`verify`**, **`kpi`**: Post-solve invariant checks and quality metrics
//! - **`generator`**: Seeded synthetic seasons
//! - **`pipeline`**: End-to-end orchestration
//!
//! # Architecture
//!
//! The problem is decomposed into two MILPs solved in sequence. Phase 1
//! fixes who sits on each panel; Phase 2 then only has to find a slot per
//! project in which its whole panel is free. Each phase is solved for
//! feasibility first and refined by its objective only afterwards.
//!
//! # References
//!
//! - Burke & Petrovic (2002), "Recent research directions in automated
//!   timetabling"
//! - Schaerf (1999), "A survey of automated timetabling"
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"

pub mod assignment;
pub mod config;
pub mod dataset;
pub mod diagnostics;
pub mod error;
pub mod generator;
pub mod kpi;
pub mod milp;
pub mod models;
pub mod phase;
pub mod pipeline;
pub mod rooms;
pub mod timetable;
pub mod validation;
pub mod verify;

pub use config::{
    AssignmentObjective, FatigueMode, FatiguePolicy, ScheduleObjective, SchedulerConfig,
    TimeoutPolicy,
};
pub use dataset::Dataset;
pub use diagnostics::{Diagnosis, Diagnostic, DiagnosticKind};
pub use error::{Error, Result};
pub use milp::{GoodLpSolver, MilpSolver, SolveVerdict, SolverConfig};
pub use models::RawTables;
pub use phase::{Phase, PhaseFailure};
pub use pipeline::{schedule_defenses, DefenseScheduler, ScheduleOutcome};
pub use validation::{normalize, ValidationReport};
