//! Panel assignment formulation (Phase 1).
//!
//! Builds a [`LinearModel`] over binary variables `x[p,j]` ("panelist p
//! sits on project j") and decodes a solution into a [`PanelAssignment`].
//!
//! # Formulation
//! - Cardinality: `Σ_p x[p,j] == required_panelists[j]` per project
//! - Eligibility: `x[p,j]` exists only if p is a topic expert and not the
//!   supervisor of j
//! - Capacity: `Σ_j x[p,j] <= max_panels[p]` per panelist
//!
//! The balanced variant adds continuous `load_max`/`load_min` bounds on
//! every panelist's load and minimizes `load_max - load_min`.
//!
//! # Reference
//! - Pentico (2007), "Assignment problems: A golden anniversary survey"
//! - Burkard, Dell'Amico & Martello (2012), "Assignment Problems", Ch. 9

use std::collections::HashMap;

use tracing::info;

use crate::config::{AssignmentObjective, TimeoutPolicy};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::milp::{Comparison, LinearModel, MilpSolution, MilpSolver, Sense, SolverConfig, VarId};
use crate::models::PanelAssignment;
use crate::phase::{solve_staged, Phase, PhaseOutcome};

/// One `x[p,j]` variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelVar {
    /// Panelist index.
    pub panelist: usize,
    /// Project index.
    pub project: usize,
}

/// A built Phase 1 model plus its variable side table.
#[derive(Debug, Clone)]
pub struct PanelModel {
    /// The linear model.
    pub model: LinearModel,
    /// `vars[v.0]` names the pair behind `VarId` v. Objective auxiliaries
    /// come after these and have no entry.
    pub vars: Vec<PanelVar>,
    index: HashMap<(usize, usize), VarId>,
}

impl PanelModel {
    /// `VarId` of `x[p,j]`, if the pair is eligible.
    pub fn var(&self, panelist: usize, project: usize) -> Option<VarId> {
        self.index.get(&(panelist, project)).copied()
    }
}

/// Builds and solves the panel assignment model.
///
/// # Example
/// ```no_run
/// use u_defense::assignment::PanelModelBuilder;
/// use u_defense::config::AssignmentObjective;
/// # fn demo(dataset: &u_defense::dataset::Dataset) {
/// let builder = PanelModelBuilder::new(dataset)
///     .with_objective(AssignmentObjective::Balanced);
/// let model = builder.build();
/// # }
/// ```
pub struct PanelModelBuilder<'a> {
    dataset: &'a Dataset,
    objective: AssignmentObjective,
}

impl<'a> PanelModelBuilder<'a> {
    /// Creates a builder with the feasibility objective.
    pub fn new(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            objective: AssignmentObjective::Feasibility,
        }
    }

    /// Sets the secondary objective.
    pub fn with_objective(mut self, objective: AssignmentObjective) -> Self {
        self.objective = objective;
        self
    }

    /// Builds the model for the configured objective.
    pub fn build(&self) -> PanelModel {
        match self.objective {
            AssignmentObjective::Feasibility => self.build_feasibility(),
            AssignmentObjective::Balanced => self.build_balanced(),
        }
    }

    /// Builds the constraints without an objective.
    pub fn build_feasibility(&self) -> PanelModel {
        let ds = self.dataset;
        let mut model = LinearModel::new("panel_assignment");
        let mut vars = Vec::new();
        let mut index = HashMap::new();
        let mut by_panelist: Vec<Vec<VarId>> = vec![Vec::new(); ds.panelists().len()];

        for (j, project) in ds.projects().iter().enumerate() {
            let mut row = Vec::new();
            for p in ds.panel_candidates(j) {
                let v = model.add_binary(format!("x[{},{}]", ds.panelists()[p].id, project.id));
                vars.push(PanelVar {
                    panelist: p,
                    project: j,
                });
                index.insert((p, j), v);
                by_panelist[p].push(v);
                row.push(v);
            }
            // Kept even when empty: `0 == required` is the infeasibility proof.
            model.add_sum_eq(
                format!("cardinality[{}]", project.id),
                &row,
                f64::from(project.required_panelists),
            );
        }

        for (p, panelist) in ds.panelists().iter().enumerate() {
            let owned = &by_panelist[p];
            if owned.is_empty() {
                continue;
            }
            model.add_sum_le(
                format!("capacity[{}]", panelist.id),
                owned,
                f64::from(panelist.max_panels),
            );
        }

        PanelModel { model, vars, index }
    }

    /// Builds the constraints plus the load-spread objective.
    ///
    /// Panelists without variables, or with zero capacity, are left out of
    /// the spread since their load is fixed at zero.
    pub fn build_balanced(&self) -> PanelModel {
        let mut built = self.build_feasibility();
        let ds = self.dataset;
        let seats: f64 = ds
            .projects()
            .iter()
            .map(|p| f64::from(p.required_panelists))
            .sum();

        let mut loads: Vec<Vec<VarId>> = vec![Vec::new(); ds.panelists().len()];
        for (i, v) in built.vars.iter().enumerate() {
            loads[v.panelist].push(VarId(i));
        }

        let model = &mut built.model;
        model.set_name("panel_assignment_balanced");
        let load_max = model.add_continuous("load_max", 0.0, seats);
        let load_min = model.add_continuous("load_min", 0.0, seats);

        for (p, owned) in loads.iter().enumerate() {
            let panelist = &ds.panelists()[p];
            if owned.is_empty() || panelist.max_panels == 0 {
                continue;
            }
            let mut upper: Vec<(VarId, f64)> = owned.iter().map(|&v| (v, 1.0)).collect();
            let mut lower = upper.clone();
            upper.push((load_max, -1.0));
            lower.push((load_min, -1.0));
            model.add_constraint(
                format!("load_max[{}]", panelist.id),
                upper,
                Comparison::Le,
                0.0,
            );
            model.add_constraint(
                format!("load_min[{}]", panelist.id),
                lower,
                Comparison::Ge,
                0.0,
            );
        }

        model.set_objective(Sense::Minimize, vec![(load_max, 1.0), (load_min, -1.0)]);
        built
    }

    /// Solves feasibility first, then the balanced model if requested.
    pub fn solve<S: MilpSolver + ?Sized>(
        &self,
        solver: &S,
        config: &SolverConfig,
        policy: TimeoutPolicy,
    ) -> Result<PhaseOutcome<PanelAssignment>> {
        let base = self.build_feasibility();
        let refined = match self.objective {
            AssignmentObjective::Feasibility => None,
            AssignmentObjective::Balanced => Some(self.build_balanced()),
        };

        let outcome = solve_staged(
            solver,
            Phase::Assignment,
            &base.model,
            refined.as_ref().map(|r| &r.model),
            config,
            policy,
        )?;

        Ok(match outcome {
            PhaseOutcome::Solved { solution, refined } => {
                let assignment = self.decode(&base, &solution);
                info!(
                    projects = assignment.project_count(),
                    seats = assignment.seat_count(),
                    balanced = refined,
                    "panel assignment solved"
                );
                PhaseOutcome::Solved {
                    solution: assignment,
                    refined,
                }
            }
            PhaseOutcome::Failed(failure) => PhaseOutcome::Failed(failure),
        })
    }

    /// Decodes set `x[p,j]` variables into panels.
    ///
    /// Base variables share their `VarId` between the feasibility and the
    /// balanced model, so either solution decodes with the base table.
    pub fn decode(&self, built: &PanelModel, solution: &MilpSolution) -> PanelAssignment {
        let ds = self.dataset;
        let mut panels: Vec<Vec<&str>> = vec![Vec::new(); ds.projects().len()];
        for (i, v) in built.vars.iter().enumerate() {
            if solution.is_set(VarId(i)) {
                panels[v.project].push(ds.panelists()[v.panelist].id.as_str());
            }
        }

        let mut assignment = PanelAssignment::new();
        for (project, panel) in ds.projects().iter().zip(panels) {
            assignment.set_panel(project.id.as_str(), panel);
        }
        assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::milp::GoodLpSolver;
    use crate::models::RawTables;
    use crate::phase::PhaseFailure;
    use crate::validation::normalize;

    fn tables() -> RawTables {
        RawTables::new()
            .with_slot("S1", "2026-06-12", "10:00-11:00")
            .with_panelist("Prof_A", 2)
            .with_panelist("Prof_B", 2)
            .with_panelist("Prof_C", 2)
            .with_panelist("Prof_D", 2)
            .with_expertise("Prof_A", &["NLP"])
            .with_expertise("Prof_B", &["NLP"])
            .with_expertise("Prof_C", &["NLP", "Vision"])
            .with_expertise("Prof_D", &["Vision"])
            .with_project("P01", "NLP", "Prof_A", 2)
            .with_project("P02", "Vision", "Prof_B", 2)
            .with_project("P03", "NLP", "Prof_D", 1)
            .with_full_availability("Prof_A")
    }

    #[test]
    fn test_build_model() {
        let ds = normalize(&tables()).unwrap();
        let built = PanelModelBuilder::new(&ds).build();

        // P01: B, C (A supervises); P02: C, D; P03: A, B, C
        assert_eq!(built.vars.len(), 7);
        assert!(built.var(0, 0).is_none());
        assert!(built.var(1, 0).is_some());
        assert!(built.var(3, 0).is_none());
        // 3 cardinality + 4 capacity rows
        assert_eq!(built.model.constraint_count(), 7);
        assert!(built.model.objective().is_none());
    }

    #[test]
    fn test_var_lookup_matches_side_table() {
        let ds = normalize(&tables()).unwrap();
        let built = PanelModelBuilder::new(&ds)
            .with_objective(AssignmentObjective::Balanced)
            .build();
        for (i, v) in built.vars.iter().enumerate() {
            assert_eq!(built.var(v.panelist, v.project), Some(VarId(i)));
        }
        // load_max and load_min have no pair
        assert_eq!(built.model.var_count(), built.vars.len() + 2);
    }

    #[test]
    fn test_balanced_model_has_objective() {
        let ds = normalize(&tables()).unwrap();
        let built = PanelModelBuilder::new(&ds)
            .with_objective(AssignmentObjective::Balanced)
            .build();
        assert_eq!(built.model.var_count(), 9);
        assert!(built.model.objective().is_some());
        // base variables keep their ids
        assert_eq!(built.var(1, 0), PanelModelBuilder::new(&ds).build().var(1, 0));
    }

    #[test]
    fn test_solve_respects_rules() {
        let ds = normalize(&tables()).unwrap();
        let out = PanelModelBuilder::new(&ds)
            .solve(&GoodLpSolver::new(), &SolverConfig::default(), TimeoutPolicy::Fail)
            .unwrap();
        let PhaseOutcome::Solved { solution, .. } = out else {
            panic!("expected a solution");
        };

        assert_eq!(solution.panel("P01"), ["Prof_B", "Prof_C"]);
        assert_eq!(solution.panel("P02"), ["Prof_C", "Prof_D"]);
        assert_eq!(solution.panel("P03").len(), 1);
        assert_ne!(solution.panel("P03")[0], "Prof_D");
        for (id, load) in solution.loads() {
            assert!(load <= 2, "{id} over capacity");
        }
    }

    #[test]
    fn test_balanced_spreads_load() {
        // Two projects, three interchangeable experts with room for both.
        let raw = RawTables::new()
            .with_slot("S1", "2026-06-12", "10:00-11:00")
            .with_panelist("Sup", 0)
            .with_panelist("E1", 2)
            .with_panelist("E2", 2)
            .with_panelist("E3", 2)
            .with_expertise("E1", &["ML"])
            .with_expertise("E2", &["ML"])
            .with_expertise("E3", &["ML"])
            .with_project("P01", "ML", "Sup", 2)
            .with_project("P02", "ML", "Sup", 1);
        let ds = normalize(&raw).unwrap();

        let out = PanelModelBuilder::new(&ds)
            .with_objective(AssignmentObjective::Balanced)
            .solve(&GoodLpSolver::new(), &SolverConfig::default(), TimeoutPolicy::Fail)
            .unwrap();
        let PhaseOutcome::Solved { solution, refined } = out else {
            panic!("expected a solution");
        };
        assert!(refined);
        let loads = solution.loads();
        assert_eq!(loads.len(), 3);
        assert!(loads.values().all(|&l| l == 1));
    }

    #[test]
    fn test_capacity_deficit_is_infeasible() {
        let raw = RawTables::new()
            .with_slot("S1", "2026-06-12", "10:00-11:00")
            .with_panelist("Sup", 2)
            .with_panelist("Only", 1)
            .with_expertise("Only", &["T"])
            .with_project("P01", "T", "Sup", 1)
            .with_project("P02", "T", "Sup", 1);
        let ds = normalize(&raw).unwrap();

        let out = PanelModelBuilder::new(&ds)
            .solve(&GoodLpSolver::new(), &SolverConfig::default(), TimeoutPolicy::Fail)
            .unwrap();
        assert_eq!(
            out,
            PhaseOutcome::Failed(PhaseFailure::Infeasible {
                phase: Phase::Assignment
            })
        );
    }
}
