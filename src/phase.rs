//! Feasibility-first solve policy shared by both modeling phases.
//!
//! # Algorithm
//! 1. Solve the base (feasibility-only) model.
//! 2. If it has a solution and a refined model (same base variables plus
//!    objective auxiliaries) is given, solve that too.
//! 3. Keep the refined solution only if it is valid; otherwise fall back
//!    to the base solution.
//!
//! The refined model is never attempted when the base model is infeasible
//! or timed out. Every solution is re-checked against its model before
//! use, so an incumbent accepted on timeout is still a valid one.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::TimeoutPolicy;
use crate::error::{Error, Result};
use crate::milp::{LinearModel, MilpSolution, MilpSolver, SolveVerdict, SolverConfig};

/// Pipeline phase that invoked the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Panelist ↔ project.
    Assignment,
    /// Project ↔ slot.
    Scheduling,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assignment => f.write_str("assignment"),
            Self::Scheduling => f.write_str("scheduling"),
        }
    }
}

/// Why a phase produced no solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PhaseFailure {
    /// The solver proved the model has no solution.
    Infeasible { phase: Phase },
    /// The budget ran out without a usable solution.
    Timeout { phase: Phase },
}

impl PhaseFailure {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Infeasible { phase } | Self::Timeout { phase } => *phase,
        }
    }
}

/// Result of a staged solve.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome<T> {
    /// Solved. `refined` tells whether the secondary objective was applied.
    Solved { solution: T, refined: bool },
    Failed(PhaseFailure),
}

/// Runs the feasibility-first policy and returns the raw solution.
pub(crate) fn solve_staged<S: MilpSolver + ?Sized>(
    solver: &S,
    phase: Phase,
    base: &LinearModel,
    refined: Option<&LinearModel>,
    config: &SolverConfig,
    policy: TimeoutPolicy,
) -> Result<PhaseOutcome<MilpSolution>> {
    info!(
        %phase,
        solver = solver.name(),
        vars = base.var_count(),
        constraints = base.constraint_count(),
        "solving feasibility model"
    );
    let verdict = solver.solve(base, config);
    debug!(%phase, verdict = verdict.label(), "feasibility verdict");

    let base_solution = match verdict {
        SolveVerdict::Feasible(solution) => {
            if let Some(msg) = base.violation(&solution.values) {
                return Err(Error::InvariantViolation(format!(
                    "{phase} solver returned an invalid solution: {msg}"
                )));
            }
            solution
        }
        SolveVerdict::Infeasible => {
            return Ok(PhaseOutcome::Failed(PhaseFailure::Infeasible { phase }));
        }
        SolveVerdict::Timeout(incumbent) => {
            let usable = incumbent.filter(|s| {
                policy == TimeoutPolicy::AcceptIncumbent && base.violation(&s.values).is_none()
            });
            return Ok(match usable {
                Some(solution) => {
                    warn!(%phase, "budget exhausted; accepting incumbent");
                    PhaseOutcome::Solved {
                        solution,
                        refined: false,
                    }
                }
                None => PhaseOutcome::Failed(PhaseFailure::Timeout { phase }),
            });
        }
        SolveVerdict::Error(msg) => return Err(Error::Solver(msg)),
    };

    let Some(refined_model) = refined else {
        return Ok(PhaseOutcome::Solved {
            solution: base_solution,
            refined: false,
        });
    };

    info!(%phase, vars = refined_model.var_count(), "solving refined model");
    let candidate = match solver.solve(refined_model, config) {
        SolveVerdict::Feasible(solution) => Some(solution),
        SolveVerdict::Timeout(Some(solution)) if policy == TimeoutPolicy::AcceptIncumbent => {
            Some(solution)
        }
        other => {
            warn!(%phase, verdict = other.label(), "refinement failed; keeping feasibility solution");
            None
        }
    };

    Ok(match candidate {
        Some(solution) if refined_model.violation(&solution.values).is_none() => {
            PhaseOutcome::Solved {
                solution,
                refined: true,
            }
        }
        Some(_) => {
            warn!(%phase, "refined solution failed verification; keeping feasibility solution");
            PhaseOutcome::Solved {
                solution: base_solution,
                refined: false,
            }
        }
        None => PhaseOutcome::Solved {
            solution: base_solution,
            refined: false,
        },
    })
}
