//! Declarative mixed-integer linear models and the solver boundary.
//!
//! A [`LinearModel`] is a struct-of-arrays: a vector of variable
//! definitions addressed by [`VarId`], a vector of sparse linear
//! constraints, and an optional linear objective. Modelers map their
//! domain pairs (panelist × project, project × slot) to `VarId`s with a
//! side table and never see the solver.
//!
//! Solving goes through the [`MilpSolver`] trait; [`GoodLpSolver`] is the
//! bundled adapter.
//!
//! # Reference
//! - Wolsey (2020), "Integer Programming", Ch. 1 (formulations)

mod backend;
mod solver;

pub use backend::GoodLpSolver;
pub use solver::{MilpSolution, MilpSolver, SolveVerdict, SolverConfig};

use serde::{Deserialize, Serialize};

/// Numerical tolerance for constraint and integrality checks.
pub const TOLERANCE: f64 = 1e-6;

/// Index of a variable within its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(pub usize);

/// Variable domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    /// 0 or 1.
    Binary,
    /// Integer within bounds.
    Integer,
    /// Real within bounds.
    Continuous,
}

/// A variable definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDef {
    /// Diagnostic name (e.g. `x[Prof_A,P01]`).
    pub name: String,
    pub kind: VarKind,
    pub lower: f64,
    pub upper: f64,
}

/// Constraint sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    /// `lhs == rhs`
    Eq,
    /// `lhs <= rhs`
    Le,
    /// `lhs >= rhs`
    Ge,
}

/// A sparse linear constraint `Σ coef·var (cmp) rhs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearConstraint {
    /// Diagnostic name (e.g. `capacity[Prof_A]`).
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub cmp: Comparison,
    pub rhs: f64,
}

impl LinearConstraint {
    /// Left-hand side under an assignment of values.
    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(v, c)| c * values.get(v.0).copied().unwrap_or(0.0))
            .sum()
    }

    /// Whether the constraint holds under `values`.
    pub fn is_satisfied_by(&self, values: &[f64]) -> bool {
        let lhs = self.lhs(values);
        match self.cmp {
            Comparison::Eq => (lhs - self.rhs).abs() <= TOLERANCE,
            Comparison::Le => lhs <= self.rhs + TOLERANCE,
            Comparison::Ge => lhs >= self.rhs - TOLERANCE,
        }
    }
}

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Minimize,
    Maximize,
}

/// A linear objective `Σ coef·var + constant`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearObjective {
    pub sense: Sense,
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinearObjective {
    /// Objective value under an assignment of values.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|&(v, c)| c * values.get(v.0).copied().unwrap_or(0.0))
                .sum::<f64>()
    }
}

/// A mixed-integer linear model.
///
/// Without an objective the model is a pure feasibility problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    name: String,
    vars: Vec<VarDef>,
    constraints: Vec<LinearConstraint>,
    objective: Option<LinearObjective>,
}

impl LinearModel {
    /// Creates an empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: Vec::new(),
            constraints: Vec::new(),
            objective: None,
        }
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the model (e.g. for a refined variant).
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Adds a binary variable.
    pub fn add_binary(&mut self, name: impl Into<String>) -> VarId {
        self.add_var(name, VarKind::Binary, 0.0, 1.0)
    }

    /// Adds an integer variable within `[lower, upper]`.
    pub fn add_integer(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        self.add_var(name, VarKind::Integer, lower, upper)
    }

    /// Adds a continuous variable within `[lower, upper]`.
    pub fn add_continuous(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        self.add_var(name, VarKind::Continuous, lower, upper)
    }

    fn add_var(&mut self, name: impl Into<String>, kind: VarKind, lower: f64, upper: f64) -> VarId {
        self.vars.push(VarDef {
            name: name.into(),
            kind,
            lower,
            upper,
        });
        VarId(self.vars.len() - 1)
    }

    /// Adds a constraint.
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(VarId, f64)>,
        cmp: Comparison,
        rhs: f64,
    ) {
        self.constraints.push(LinearConstraint {
            name: name.into(),
            terms,
            cmp,
            rhs,
        });
    }

    /// Adds `Σ vars == rhs` with unit coefficients.
    pub fn add_sum_eq(&mut self, name: impl Into<String>, vars: &[VarId], rhs: f64) {
        self.add_constraint(name, unit_terms(vars), Comparison::Eq, rhs);
    }

    /// Adds `Σ vars <= rhs` with unit coefficients.
    pub fn add_sum_le(&mut self, name: impl Into<String>, vars: &[VarId], rhs: f64) {
        self.add_constraint(name, unit_terms(vars), Comparison::Le, rhs);
    }

    /// Sets the objective.
    pub fn set_objective(&mut self, sense: Sense, terms: Vec<(VarId, f64)>) {
        self.objective = Some(LinearObjective {
            sense,
            terms,
            constant: 0.0,
        });
    }

    /// Removes the objective, turning the model into a feasibility problem.
    pub fn clear_objective(&mut self) {
        self.objective = None;
    }

    /// Variable definitions, indexed by `VarId`.
    pub fn vars(&self) -> &[VarDef] {
        &self.vars
    }

    /// Constraints in insertion order.
    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    /// The objective, if any.
    pub fn objective(&self) -> Option<&LinearObjective> {
        self.objective.as_ref()
    }

    /// Number of variables.
    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    /// Number of constraints.
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// First constraint without variables whose constant side already fails
    /// (e.g. `0 == 2` for a project with no eligible panelist).
    pub fn constant_violation(&self) -> Option<&LinearConstraint> {
        self.constraints
            .iter()
            .find(|c| c.terms.is_empty() && !c.is_satisfied_by(&[]))
    }

    /// First constraint or bound violated by `values`, as a message.
    ///
    /// Also checks vector length and integrality of binary/integer variables.
    pub fn violation(&self, values: &[f64]) -> Option<String> {
        if values.len() != self.vars.len() {
            return Some(format!(
                "expected {} values, got {}",
                self.vars.len(),
                values.len()
            ));
        }
        for (def, &v) in self.vars.iter().zip(values) {
            if v < def.lower - TOLERANCE || v > def.upper + TOLERANCE {
                return Some(format!("{} = {v} outside [{}, {}]", def.name, def.lower, def.upper));
            }
            if def.kind != VarKind::Continuous && (v - v.round()).abs() > TOLERANCE {
                return Some(format!("{} = {v} is not integral", def.name));
            }
        }
        self.constraints
            .iter()
            .find(|c| !c.is_satisfied_by(values))
            .map(|c| format!("constraint {} violated (lhs = {})", c.name, c.lhs(values)))
    }
}

fn unit_terms(vars: &[VarId]) -> Vec<(VarId, f64)> {
    vars.iter().map(|&v| (v, 1.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_model() {
        let mut m = LinearModel::new("toy");
        let a = m.add_binary("a");
        let b = m.add_binary("b");
        let z = m.add_continuous("z", 0.0, 10.0);
        m.add_sum_eq("pick_one", &[a, b], 1.0);
        m.add_constraint("z_ge_a", vec![(z, 1.0), (a, -1.0)], Comparison::Ge, 0.0);
        m.set_objective(Sense::Minimize, vec![(z, 1.0)]);

        assert_eq!(m.name(), "toy");
        assert_eq!(m.var_count(), 3);
        assert_eq!(m.constraint_count(), 2);
        assert_eq!(b, VarId(1));
        assert!(m.objective().is_some());
        m.clear_objective();
        assert!(m.objective().is_none());
    }

    #[test]
    fn test_violation_checks() {
        let mut m = LinearModel::new("toy");
        let a = m.add_binary("a");
        let b = m.add_binary("b");
        m.add_sum_le("at_most_one", &[a, b], 1.0);

        assert!(m.violation(&[1.0, 0.0]).is_none());
        assert!(m.violation(&[1.0, 1.0]).unwrap().contains("at_most_one"));
        assert!(m.violation(&[0.5, 0.0]).unwrap().contains("not integral"));
        assert!(m.violation(&[2.0, 0.0]).unwrap().contains("outside"));
        assert!(m.violation(&[1.0]).unwrap().contains("expected 2"));
    }

    #[test]
    fn test_constant_violation() {
        let mut m = LinearModel::new("empty_rows");
        m.add_sum_eq("trivially_ok", &[], 0.0);
        assert!(m.constant_violation().is_none());
        m.add_sum_eq("needs_two", &[], 2.0);
        assert_eq!(m.constant_violation().unwrap().name, "needs_two");
    }

    #[test]
    fn test_objective_evaluate() {
        let obj = LinearObjective {
            sense: Sense::Minimize,
            terms: vec![(VarId(0), 2.0), (VarId(1), -1.0)],
            constant: 3.0,
        };
        assert!((obj.evaluate(&[1.0, 4.0]) - 1.0).abs() < 1e-10);
    }
}
