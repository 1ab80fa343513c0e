//! Pipeline configuration.
//!
//! Every field has a default, so an empty document deserializes to
//! [`SchedulerConfig::default`].

use serde::{Deserialize, Serialize};

use crate::milp::SolverConfig;

/// Secondary objective for panel assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentObjective {
    /// Any feasible assignment.
    #[default]
    Feasibility,
    /// Minimize the spread between the busiest and idlest panelist.
    Balanced,
}

/// Secondary objective for slot scheduling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleObjective {
    /// Any feasible schedule.
    #[default]
    Feasibility,
    /// Minimize the number of distinct dates used.
    FewestDays,
    /// Prefer chronologically early slots.
    Earliest,
}

/// When back-to-back defenses are forbidden for a panelist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatigueMode {
    /// Never.
    Off,
    /// Only between slots no longer than `max_slot_minutes`.
    #[default]
    Threshold,
    /// Between any consecutive slots.
    Always,
}

/// Anti-fatigue rule settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FatiguePolicy {
    pub mode: FatigueMode,
    /// Longest slot (minutes) the threshold mode applies to.
    pub max_slot_minutes: i64,
}

impl Default for FatiguePolicy {
    fn default() -> Self {
        Self {
            mode: FatigueMode::Threshold,
            max_slot_minutes: 30,
        }
    }
}

impl FatiguePolicy {
    /// Rule disabled.
    pub fn off() -> Self {
        Self {
            mode: FatigueMode::Off,
            ..Self::default()
        }
    }

    /// Rule applied to every consecutive pair.
    pub fn always() -> Self {
        Self {
            mode: FatigueMode::Always,
            ..Self::default()
        }
    }

    /// Whether the rule applies between two slots of the given lengths.
    pub fn applies(&self, first_minutes: i64, second_minutes: i64) -> bool {
        match self.mode {
            FatigueMode::Off => false,
            FatigueMode::Always => true,
            FatigueMode::Threshold => {
                first_minutes <= self.max_slot_minutes && second_minutes <= self.max_slot_minutes
            }
        }
    }
}

/// What to do when the solver runs out of time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Report the phase as failed (inconclusive).
    #[default]
    Fail,
    /// Use the best solution found so far, if any.
    AcceptIncumbent,
}

/// Configuration of a full scheduling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub assignment_objective: AssignmentObjective,
    pub schedule_objective: ScheduleObjective,
    pub fatigue: FatiguePolicy,
    /// Projects a single slot can host.
    pub slot_capacity: u32,
    /// Cap on concurrent defenses per instant (rooms available).
    pub max_parallel_defenses: Option<u32>,
    pub solver: SolverConfig,
    pub timeout_policy: TimeoutPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            assignment_objective: AssignmentObjective::default(),
            schedule_objective: ScheduleObjective::default(),
            fatigue: FatiguePolicy::default(),
            slot_capacity: 1,
            max_parallel_defenses: None,
            solver: SolverConfig::default(),
            timeout_policy: TimeoutPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the panel assignment objective.
    pub fn with_assignment_objective(mut self, objective: AssignmentObjective) -> Self {
        self.assignment_objective = objective;
        self
    }

    /// Sets the slot scheduling objective.
    pub fn with_schedule_objective(mut self, objective: ScheduleObjective) -> Self {
        self.schedule_objective = objective;
        self
    }

    /// Sets the anti-fatigue rule.
    pub fn with_fatigue(mut self, fatigue: FatiguePolicy) -> Self {
        self.fatigue = fatigue;
        self
    }

    /// Sets how many projects one slot can host.
    pub fn with_slot_capacity(mut self, capacity: u32) -> Self {
        self.slot_capacity = capacity;
        self
    }

    /// Caps concurrent defenses per instant.
    pub fn with_max_parallel_defenses(mut self, rooms: u32) -> Self {
        self.max_parallel_defenses = Some(rooms);
        self
    }

    /// Sets the solver configuration.
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Sets the timeout policy.
    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }
}
