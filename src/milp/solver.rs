//! Solver boundary: trait, configuration, and verdicts.

use serde::{Deserialize, Serialize};

use super::{LinearModel, VarId};

/// Solver run limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Wall-clock budget per solve call (ms). `None` = unbounded.
    pub time_limit_ms: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: Some(300_000),
        }
    }
}

impl SolverConfig {
    /// Sets the per-call time budget.
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    /// Removes the time budget.
    pub fn unbounded() -> Self {
        Self {
            time_limit_ms: None,
        }
    }
}

/// Variable values returned by a solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilpSolution {
    /// One value per model variable, indexed by `VarId`.
    pub values: Vec<f64>,
    /// Objective value (0 for feasibility models).
    pub objective: f64,
}

impl MilpSolution {
    /// Creates a solution.
    pub fn new(values: Vec<f64>, objective: f64) -> Self {
        Self { values, objective }
    }

    /// Value of a variable (0 if out of range).
    #[inline]
    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.0).copied().unwrap_or(0.0)
    }

    /// Whether a binary variable is set.
    #[inline]
    pub fn is_set(&self, var: VarId) -> bool {
        self.value(var) > 0.5
    }
}

/// Bounded-time solver outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveVerdict {
    /// A solution satisfying every constraint.
    Feasible(MilpSolution),
    /// Proven to have no solution.
    Infeasible,
    /// Budget exhausted; carries the best incumbent if the backend kept one.
    Timeout(Option<MilpSolution>),
    /// Backend failure that is not a verdict (unbounded model, crash).
    Error(String),
}

impl SolveVerdict {
    /// Whether a solution is available (feasible, or a timed-out incumbent).
    pub fn is_solution_found(&self) -> bool {
        matches!(self, Self::Feasible(_) | Self::Timeout(Some(_)))
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Feasible(_) => "feasible",
            Self::Infeasible => "infeasible",
            Self::Timeout(Some(_)) => "timeout_with_incumbent",
            Self::Timeout(None) => "timeout",
            Self::Error(_) => "error",
        }
    }
}

/// A mixed-integer solver.
///
/// Implementations must return within the configured time budget.
pub trait MilpSolver {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Solves `model`.
    fn solve(&self, model: &LinearModel, config: &SolverConfig) -> SolveVerdict;
}
