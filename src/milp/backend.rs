//! `good_lp` adapter.
//!
//! Translates a [`LinearModel`] into a `good_lp` problem solved by the
//! pure-Rust `microlp` backend. The backend has no time limit of its own,
//! so a bounded call runs it on a worker thread and stops waiting at the
//! deadline. The worker is detached and finishes in the background.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use good_lp::{
    constraint, default_solver, variable, Expression, ProblemVariables, ResolutionError,
    Solution, SolverModel, Variable,
};
use tracing::{debug, warn};

use super::{
    Comparison, LinearModel, MilpSolution, MilpSolver, Sense, SolveVerdict, SolverConfig,
    VarDef, VarId, VarKind,
};

/// [`MilpSolver`] backed by `good_lp` + `microlp`.
///
/// With a time limit the solve runs on a thread named `milp-<model>`.
/// After a timeout that thread is left detached: it keeps its CPU core
/// and its copy of the model until microlp returns, and its verdict is
/// dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpSolver;

impl GoodLpSolver {
    /// Creates the adapter.
    pub fn new() -> Self {
        Self
    }
}

impl MilpSolver for GoodLpSolver {
    fn name(&self) -> &str {
        "good_lp/microlp"
    }

    fn solve(&self, model: &LinearModel, config: &SolverConfig) -> SolveVerdict {
        if let Some(row) = model.constant_violation() {
            debug!(model = model.name(), constraint = %row.name, "constant row violated");
            return SolveVerdict::Infeasible;
        }
        if model.var_count() == 0 {
            let objective = model.objective().map_or(0.0, |o| o.constant);
            return SolveVerdict::Feasible(MilpSolution::new(Vec::new(), objective));
        }

        let Some(limit_ms) = config.time_limit_ms else {
            return solve_blocking(model);
        };

        let owned = model.clone();
        let (tx, rx) = mpsc::channel();
        let thread_name = format!("milp-{}", model.name());
        let spawned = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                // Receiver may be gone after a timeout.
                let _ = tx.send(solve_blocking(&owned));
            });
        if let Err(e) = spawned {
            return SolveVerdict::Error(format!("cannot start solver thread: {e}"));
        }

        match rx.recv_timeout(Duration::from_millis(limit_ms)) {
            Ok(verdict) => verdict,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    model = model.name(),
                    thread = %thread_name,
                    limit_ms,
                    "solver budget exhausted; worker left running detached"
                );
                SolveVerdict::Timeout(None)
            }
            Err(RecvTimeoutError::Disconnected) => {
                SolveVerdict::Error("solver thread terminated without a verdict".into())
            }
        }
    }
}

fn solve_blocking(model: &LinearModel) -> SolveVerdict {
    let mut problem = ProblemVariables::new();
    let vars: Vec<Variable> = model
        .vars()
        .iter()
        .map(|def| problem.add(definition(def)))
        .collect();

    let (sense, objective) = match model.objective() {
        Some(obj) => (
            obj.sense,
            expression(&vars, &obj.terms) + Expression::from(obj.constant),
        ),
        None => (Sense::Minimize, Expression::from(0.0)),
    };

    let unsolved = match sense {
        Sense::Minimize => problem.minimise(objective.clone()),
        Sense::Maximize => problem.maximise(objective.clone()),
    };
    let mut solver_model = unsolved.using(default_solver);

    for row in model.constraints() {
        if row.terms.is_empty() {
            // Constant rows were checked before solving.
            continue;
        }
        let lhs = expression(&vars, &row.terms);
        let c = match row.cmp {
            Comparison::Eq => constraint::eq(lhs, row.rhs),
            Comparison::Le => constraint::leq(lhs, row.rhs),
            Comparison::Ge => constraint::geq(lhs, row.rhs),
        };
        solver_model = solver_model.with(c);
    }

    match solver_model.solve() {
        Ok(solution) => {
            // Snap integral variables; the simplex leaves float noise.
            let values: Vec<f64> = vars
                .iter()
                .zip(model.vars())
                .map(|(&v, def)| match def.kind {
                    VarKind::Continuous => solution.value(v),
                    VarKind::Binary | VarKind::Integer => solution.value(v).round(),
                })
                .collect();
            let value = solution.eval(objective);
            SolveVerdict::Feasible(MilpSolution::new(values, value))
        }
        Err(ResolutionError::Infeasible) => SolveVerdict::Infeasible,
        Err(e) => SolveVerdict::Error(e.to_string()),
    }
}

fn definition(def: &VarDef) -> good_lp::VariableDefinition {
    let base = match def.kind {
        VarKind::Binary => return variable().binary(),
        VarKind::Integer => variable().integer(),
        VarKind::Continuous => variable(),
    };
    let base = if def.lower.is_finite() {
        base.min(def.lower)
    } else {
        base
    };
    if def.upper.is_finite() {
        base.max(def.upper)
    } else {
        base
    }
}

fn expression(vars: &[Variable], terms: &[(VarId, f64)]) -> Expression {
    terms
        .iter()
        .fold(Expression::from(0.0), |acc, &(v, coef)| acc + coef * vars[v.0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_feasible_binary() {
        let mut m = LinearModel::new("pick");
        let a = m.add_binary("a");
        let b = m.add_binary("b");
        let c = m.add_binary("c");
        m.add_sum_eq("two_of_three", &[a, b, c], 2.0);
        m.add_sum_le("not_both_ab", &[a, b], 1.0);

        match GoodLpSolver::new().solve(&m, &SolverConfig::default()) {
            SolveVerdict::Feasible(sol) => {
                assert!(m.violation(&sol.values).is_none());
                assert!(sol.is_set(c));
            }
            other => panic!("expected feasible, got {other:?}"),
        }
    }

    #[test]
    fn test_bounded_solve_on_worker() {
        let mut m = LinearModel::new("bounded_pick");
        let a = m.add_binary("a");
        let b = m.add_binary("b");
        m.add_sum_eq("exactly_one", &[a, b], 1.0);

        let config = SolverConfig::unbounded().with_time_limit_ms(60_000);
        match GoodLpSolver::new().solve(&m, &config) {
            SolveVerdict::Feasible(sol) => assert!(sol.is_set(a) ^ sol.is_set(b)),
            other => panic!("expected feasible, got {other:?}"),
        }
    }

    #[test]
    fn test_solve_infeasible() {
        let mut m = LinearModel::new("conflict");
        let a = m.add_binary("a");
        let b = m.add_binary("b");
        m.add_sum_eq("both", &[a, b], 2.0);
        m.add_sum_le("at_most_one", &[a, b], 1.0);

        let verdict = GoodLpSolver::new().solve(&m, &SolverConfig::default());
        assert_eq!(verdict, SolveVerdict::Infeasible);
    }

    #[test]
    fn test_constant_row_short_circuits() {
        let mut m = LinearModel::new("no_vars");
        m.add_sum_eq("cardinality[P01]", &[], 2.0);
        let verdict = GoodLpSolver::new().solve(&m, &SolverConfig::unbounded());
        assert_eq!(verdict, SolveVerdict::Infeasible);
    }

    #[test]
    fn test_minimize_objective() {
        let mut m = LinearModel::new("cheapest");
        let a = m.add_binary("a");
        let b = m.add_binary("b");
        m.add_sum_eq("exactly_one", &[a, b], 1.0);
        m.set_objective(Sense::Minimize, vec![(a, 5.0), (b, 2.0)]);

        match GoodLpSolver::new().solve(&m, &SolverConfig::unbounded()) {
            SolveVerdict::Feasible(sol) => {
                assert!(sol.is_set(b));
                assert!(!sol.is_set(a));
                assert!((sol.objective - 2.0).abs() < 1e-6);
            }
            other => panic!("expected feasible, got {other:?}"),
        }
    }

    #[test]
    fn test_continuous_bounds() {
        let mut m = LinearModel::new("bounded");
        let z = m.add_continuous("z", 1.5, 4.0);
        m.set_objective(Sense::Maximize, vec![(z, 1.0)]);

        match GoodLpSolver::new().solve(&m, &SolverConfig::default()) {
            SolveVerdict::Feasible(sol) => assert!((sol.value(z) - 4.0).abs() < 1e-6),
            other => panic!("expected feasible, got {other:?}"),
        }
    }
}
