//! Defense timetabling formulation (Phase 2).
//!
//! Places every project of a fixed [`PanelAssignment`] into exactly one
//! slot. Binary `y[j,s]` = 1 iff project j is defended in slot s.
//!
//! # Formulation
//! - Single slot: `Σ_s y[j,s] == 1` per project
//! - Availability: `y[j,s]` exists only if every panel member of j can
//!   attend s
//! - No double booking: per panelist and per conflict point (a date and a
//!   start time some slot begins at), at most one of the panelist's
//!   projects runs in a slot covering that point. Overlapping slots are
//!   therefore conflicting too, not only identical instants.
//! - Anti-fatigue: per panelist and per pair of consecutive instants the
//!   fatigue policy applies to, at most one of the panelist's projects
//!   runs in either instant
//! - Slot capacity: `Σ_j y[j,s] <= slot_capacity` per slot, and at most
//!   one defense in a slot with a fixed room
//! - Parallel cap (optional): `Σ y <= max_parallel_defenses` per instant
//!
//! # Objectives
//! - `FewestDays`: binary `day_used[d]` with `Σ_{s on d} y[j,s] <= M·day_used[d]`,
//!   minimize `Σ day_used`
//! - `Earliest`: minimize `Σ rank(s)·y[j,s]`, rank = chronological instant index
//!
//! # Reference
//! - Schaerf (1999), "A Survey of Automated Timetabling"
//! - Burke & Petrovic (2002), "Recent research directions in automated timetabling"

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info};

use crate::config::{FatiguePolicy, ScheduleObjective, SchedulerConfig, TimeoutPolicy};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::milp::{Comparison, LinearModel, MilpSolution, MilpSolver, Sense, SolverConfig, VarId};
use crate::models::{DefenseSchedule, PanelAssignment};
use crate::phase::{solve_staged, Phase, PhaseOutcome};

/// One `y[j,s]` variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotVar {
    /// Project index.
    pub project: usize,
    /// Slot index.
    pub slot: usize,
}

/// A built Phase 2 model plus its variable side table.
#[derive(Debug, Clone)]
pub struct TimetableModel {
    pub model: LinearModel,
    /// `vars[v.0]` names the pair behind `VarId` v.
    pub vars: Vec<SlotVar>,
    index: HashMap<(usize, usize), VarId>,
}

impl TimetableModel {
    /// `VarId` of `y[j,s]`, if the slot is usable for the project.
    pub fn var(&self, project: usize, slot: usize) -> Option<VarId> {
        self.index.get(&(project, slot)).copied()
    }

    /// Slots usable by a project.
    pub fn usable_slots(&self, project: usize) -> Vec<usize> {
        self.vars
            .iter()
            .filter(|v| v.project == project)
            .map(|v| v.slot)
            .collect()
    }
}

/// Builds and solves the timetabling model for a fixed assignment.
pub struct TimetableModelBuilder<'a> {
    dataset: &'a Dataset,
    assignment: &'a PanelAssignment,
    objective: ScheduleObjective,
    fatigue: FatiguePolicy,
    slot_capacity: u32,
    max_parallel: Option<u32>,
}

impl<'a> TimetableModelBuilder<'a> {
    /// Creates a builder with default rules.
    pub fn new(dataset: &'a Dataset, assignment: &'a PanelAssignment) -> Self {
        Self {
            dataset,
            assignment,
            objective: ScheduleObjective::Feasibility,
            fatigue: FatiguePolicy::default(),
            slot_capacity: 1,
            max_parallel: None,
        }
    }

    /// Copies objective and rules from a run configuration.
    pub fn with_config(self, config: &SchedulerConfig) -> Self {
        let builder = self
            .with_objective(config.schedule_objective)
            .with_fatigue(config.fatigue)
            .with_slot_capacity(config.slot_capacity);
        match config.max_parallel_defenses {
            Some(rooms) => builder.with_max_parallel_defenses(rooms),
            None => builder,
        }
    }

    pub fn with_objective(mut self, objective: ScheduleObjective) -> Self {
        self.objective = objective;
        self
    }

    pub fn with_fatigue(mut self, fatigue: FatiguePolicy) -> Self {
        self.fatigue = fatigue;
        self
    }

    pub fn with_slot_capacity(mut self, capacity: u32) -> Self {
        self.slot_capacity = capacity;
        self
    }

    pub fn with_max_parallel_defenses(mut self, rooms: u32) -> Self {
        self.max_parallel = Some(rooms);
        self
    }

    /// Panel of project `j` as panelist indices.
    ///
    /// `None` if the panel names a panelist the dataset does not know; such
    /// a project gets no usable slot.
    fn panel_indices(&self, j: usize) -> Option<Vec<usize>> {
        let project = &self.dataset.projects()[j];
        self.assignment
            .panel(&project.id)
            .iter()
            .map(|id| self.dataset.panelist_idx(id))
            .collect()
    }

    /// Builds the model for the configured objective.
    pub fn build(&self) -> TimetableModel {
        match self.objective {
            ScheduleObjective::Feasibility => self.build_feasibility(),
            ScheduleObjective::FewestDays => self.build_fewest_days(),
            ScheduleObjective::Earliest => self.build_earliest(),
        }
    }

    /// Builds the constraints without an objective.
    pub fn build_feasibility(&self) -> TimetableModel {
        let ds = self.dataset;
        let slots = ds.slots();
        let mut model = LinearModel::new("defense_timetable");
        let mut vars = Vec::new();
        let mut index = HashMap::new();
        let mut by_project: Vec<Vec<(usize, VarId)>> = vec![Vec::new(); ds.projects().len()];
        let mut by_slot: Vec<Vec<VarId>> = vec![Vec::new(); slots.len()];
        let mut panelist_projects: Vec<Vec<usize>> = vec![Vec::new(); ds.panelists().len()];

        for (j, project) in ds.projects().iter().enumerate() {
            let Some(panel) = self.panel_indices(j) else {
                debug!(project = %project.id, "panel names an unknown panelist");
                model.add_sum_eq(format!("single_slot[{}]", project.id), &[], 1.0);
                continue;
            };
            for &p in &panel {
                panelist_projects[p].push(j);
            }
            let mut row = Vec::new();
            for (s, slot) in slots.iter().enumerate() {
                if panel.iter().all(|&p| ds.is_available(p, s)) {
                    let v = model.add_binary(format!("y[{},{}]", project.id, slot.id));
                    vars.push(SlotVar {
                        project: j,
                        slot: s,
                    });
                    index.insert((j, s), v);
                    by_project[j].push((s, v));
                    by_slot[s].push(v);
                    row.push(v);
                }
            }
            model.add_sum_eq(format!("single_slot[{}]", project.id), &row, 1.0);
        }

        for (s, owned) in by_slot.iter().enumerate() {
            // A fixed room seats one defense at a time.
            let capacity = match slots[s].room {
                Some(_) => self.slot_capacity.min(1),
                None => self.slot_capacity,
            };
            if owned.len() > capacity as usize {
                model.add_sum_le(
                    format!("slot_capacity[{}]", slots[s].id),
                    owned,
                    f64::from(capacity),
                );
            }
        }

        let instants = ds.instants();
        if let Some(rooms) = self.max_parallel {
            for (instant, members) in &instants {
                let row: Vec<VarId> = members.iter().flat_map(|&s| by_slot[s].iter().copied()).collect();
                if row.len() > rooms as usize {
                    model.add_sum_le(format!("parallel[{instant}]"), &row, f64::from(rooms));
                }
            }
        }

        // Distinct sets of slots covering each conflict point.
        let mut covers: BTreeMap<Vec<usize>, (NaiveDate, NaiveTime)> = BTreeMap::new();
        let points: BTreeSet<(NaiveDate, NaiveTime)> =
            slots.iter().map(|s| (s.date, s.range.start)).collect();
        for (date, start) in points {
            let covering: Vec<usize> = slots
                .iter()
                .enumerate()
                .filter(|(_, s)| s.date == date && s.range.contains(start))
                .map(|(i, _)| i)
                .collect();
            covers.entry(covering).or_insert((date, start));
        }

        // Consecutive instant pairs the fatigue rule covers.
        let mut fatigue_pairs: Vec<(String, Vec<usize>)> = Vec::new();
        for (first, first_slots) in &instants {
            for (second, second_slots) in instants.range(first..) {
                if first.is_followed_by(second)
                    && self
                        .fatigue
                        .applies(first.range.duration_minutes(), second.range.duration_minutes())
                {
                    let mut union = first_slots.clone();
                    union.extend(second_slots.iter().copied());
                    fatigue_pairs.push((format!("{first}+{}", second.range), union));
                }
            }
        }

        for (p, projects) in panelist_projects.iter().enumerate() {
            if projects.len() < 2 {
                continue;
            }
            let pid = &ds.panelists()[p].id;
            for (covering, (date, start)) in &covers {
                if let Some(row) = clique(&by_project, projects, covering) {
                    model.add_sum_le(
                        format!("no_double_booking[{pid},{date} {}]", start.format("%H:%M")),
                        &row,
                        1.0,
                    );
                }
            }
            for (label, union) in &fatigue_pairs {
                if let Some(row) = clique(&by_project, projects, union) {
                    model.add_sum_le(format!("fatigue[{pid},{label}]"), &row, 1.0);
                }
            }
        }

        TimetableModel { model, vars, index }
    }

    /// Feasibility constraints plus the day-use objective.
    pub fn build_fewest_days(&self) -> TimetableModel {
        let mut built = self.build_feasibility();
        let slots = self.dataset.slots();

        let mut by_date: BTreeMap<NaiveDate, (Vec<VarId>, BTreeSet<usize>)> = BTreeMap::new();
        for (i, v) in built.vars.iter().enumerate() {
            let entry = by_date.entry(slots[v.slot].date).or_default();
            entry.0.push(VarId(i));
            entry.1.insert(v.project);
        }

        let model = &mut built.model;
        model.set_name("defense_timetable_fewest_days");
        let mut objective = Vec::new();
        for (date, (row, projects)) in by_date {
            let used = model.add_binary(format!("day_used[{date}]"));
            let mut terms: Vec<(VarId, f64)> = row.into_iter().map(|v| (v, 1.0)).collect();
            terms.push((used, -(projects.len() as f64)));
            model.add_constraint(format!("day_link[{date}]"), terms, Comparison::Le, 0.0);
            objective.push((used, 1.0));
        }
        model.set_objective(Sense::Minimize, objective);
        built
    }

    /// Feasibility constraints plus the chronological-rank objective.
    pub fn build_earliest(&self) -> TimetableModel {
        let mut built = self.build_feasibility();
        let mut rank = vec![0.0; self.dataset.slots().len()];
        for (r, members) in self.dataset.instants().values().enumerate() {
            for &s in members {
                rank[s] = r as f64;
            }
        }

        let terms = built
            .vars
            .iter()
            .enumerate()
            .map(|(i, v)| (VarId(i), rank[v.slot]))
            .collect();
        built.model.set_name("defense_timetable_earliest");
        built.model.set_objective(Sense::Minimize, terms);
        built
    }

    /// Solves feasibility first, then the configured objective.
    pub fn solve<S: MilpSolver + ?Sized>(
        &self,
        solver: &S,
        config: &SolverConfig,
        policy: TimeoutPolicy,
    ) -> Result<PhaseOutcome<DefenseSchedule>> {
        let base = self.build_feasibility();
        let refined = match self.objective {
            ScheduleObjective::Feasibility => None,
            _ => Some(self.build()),
        };

        let outcome = solve_staged(
            solver,
            Phase::Scheduling,
            &base.model,
            refined.as_ref().map(|r| &r.model),
            config,
            policy,
        )?;

        Ok(match outcome {
            PhaseOutcome::Solved { solution, refined } => {
                let schedule = self.decode(&base, &solution);
                info!(
                    projects = schedule.project_count(),
                    objective_applied = refined,
                    "defense timetable solved"
                );
                PhaseOutcome::Solved {
                    solution: schedule,
                    refined,
                }
            }
            PhaseOutcome::Failed(failure) => PhaseOutcome::Failed(failure),
        })
    }

    /// Decodes set `y[j,s]` variables into placements.
    pub fn decode(&self, built: &TimetableModel, solution: &MilpSolution) -> DefenseSchedule {
        let ds = self.dataset;
        let mut schedule = DefenseSchedule::new();
        for (i, v) in built.vars.iter().enumerate() {
            if solution.is_set(VarId(i)) {
                schedule.place(ds.projects()[v.project].id.as_str(), ds.slots()[v.slot].id.as_str());
            }
        }
        schedule
    }
}

/// Variables of `projects` placed in any of `slots`, if at least two
/// distinct projects are involved.
fn clique(
    by_project: &[Vec<(usize, VarId)>],
    projects: &[usize],
    slots: &[usize],
) -> Option<Vec<VarId>> {
    let mut row = Vec::new();
    let mut involved = 0;
    for &j in projects {
        let before = row.len();
        row.extend(
            by_project[j]
                .iter()
                .filter(|(s, _)| slots.contains(s))
                .map(|&(_, v)| v),
        );
        if row.len() > before {
            involved += 1;
        }
    }
    (involved >= 2).then_some(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::milp::GoodLpSolver;
    use crate::models::RawTables;
    use crate::phase::PhaseFailure;
    use crate::validation::normalize;

    /// Two NLP projects; `Prof_C` sits on both panels.
    fn shared_panelist(slots: &[(&str, &str, &str)]) -> (Dataset, PanelAssignment) {
        let mut raw = RawTables::new();
        for (id, date, time) in slots {
            raw = raw.with_slot(*id, *date, *time);
        }
        let raw = raw
            .with_panelist("Prof_A", 2)
            .with_panelist("Prof_B", 2)
            .with_panelist("Prof_C", 2)
            .with_expertise("Prof_A", &["NLP"])
            .with_expertise("Prof_B", &["NLP"])
            .with_expertise("Prof_C", &["NLP"])
            .with_project("P01", "NLP", "Prof_A", 2)
            .with_project("P02", "NLP", "Prof_B", 2)
            .with_full_availability("Prof_A")
            .with_full_availability("Prof_B")
            .with_full_availability("Prof_C");
        let ds = normalize(&raw).unwrap();
        let assignment = PanelAssignment::new()
            .with_panel("P01", &["Prof_B", "Prof_C"])
            .with_panel("P02", &["Prof_A", "Prof_C"]);
        (ds, assignment)
    }

    fn solve(builder: &TimetableModelBuilder<'_>) -> PhaseOutcome<DefenseSchedule> {
        builder
            .solve(&GoodLpSolver::new(), &SolverConfig::default(), TimeoutPolicy::Fail)
            .unwrap()
    }

    fn solved(outcome: PhaseOutcome<DefenseSchedule>) -> DefenseSchedule {
        match outcome {
            PhaseOutcome::Solved { solution, .. } => solution,
            PhaseOutcome::Failed(f) => panic!("expected a schedule, got {f:?}"),
        }
    }

    fn infeasible() -> PhaseOutcome<DefenseSchedule> {
        PhaseOutcome::Failed(PhaseFailure::Infeasible {
            phase: Phase::Scheduling,
        })
    }

    #[test]
    fn test_availability_omits_variables() {
        let raw = RawTables::new()
            .with_slot("S1", "2026-06-12", "10:00-11:00")
            .with_slot("S2", "2026-06-12", "11:00-12:00")
            .with_panelist("Prof_A", 1)
            .with_panelist("Prof_B", 1)
            .with_expertise("Prof_B", &["NLP"])
            .with_project("P01", "NLP", "Prof_A", 1)
            .with_availability("Prof_B", &["S2"]);
        let ds = normalize(&raw).unwrap();
        let assignment = PanelAssignment::new().with_panel("P01", &["Prof_B"]);
        let built = TimetableModelBuilder::new(&ds, &assignment).build();

        assert_eq!(built.vars.len(), 1);
        assert_eq!(built.usable_slots(0), vec![1]);
        assert!(built.var(0, 0).is_none());
        assert_eq!(built.var(0, 1), Some(VarId(0)));
    }

    #[test]
    fn test_shared_panelist_not_double_booked() {
        let (ds, assignment) = shared_panelist(&[
            ("S1", "2026-06-12", "10:00-11:00"),
            ("S2", "2026-06-12", "10:00-11:00"),
            ("S3", "2026-06-12", "14:00-15:00"),
        ]);
        let schedule = solved(solve(&TimetableModelBuilder::new(&ds, &assignment)));

        assert_eq!(schedule.project_count(), 2);
        let s1 = schedule.slot_of("P01").unwrap();
        let s2 = schedule.slot_of("P02").unwrap();
        assert!(s1 == "S3" || s2 == "S3");
    }

    #[test]
    fn test_partial_overlap_conflicts() {
        let (ds, assignment) = shared_panelist(&[
            ("S1", "2026-06-12", "10:00-11:00"),
            ("S2", "2026-06-12", "10:30-11:30"),
        ]);
        assert_eq!(solve(&TimetableModelBuilder::new(&ds, &assignment)), infeasible());
    }

    #[test]
    fn test_fatigue_threshold_skips_slot() {
        let (ds, assignment) = shared_panelist(&[
            ("S1", "2026-06-12", "09:00-09:30"),
            ("S2", "2026-06-12", "09:30-10:00"),
            ("S3", "2026-06-12", "10:00-10:30"),
        ]);
        let schedule = solved(solve(&TimetableModelBuilder::new(&ds, &assignment)));
        let mut used = vec![
            schedule.slot_of("P01").unwrap(),
            schedule.slot_of("P02").unwrap(),
        ];
        used.sort();
        assert_eq!(used, vec!["S1", "S3"]);
    }

    #[test]
    fn test_fatigue_modes() {
        let (ds, assignment) = shared_panelist(&[
            ("S1", "2026-06-12", "09:00-10:00"),
            ("S2", "2026-06-12", "10:00-11:00"),
        ]);
        // 60-minute slots are above the default threshold.
        let threshold = TimetableModelBuilder::new(&ds, &assignment);
        solved(solve(&threshold));

        let always = TimetableModelBuilder::new(&ds, &assignment).with_fatigue(FatiguePolicy::always());
        assert_eq!(solve(&always), infeasible());

        let off = TimetableModelBuilder::new(&ds, &assignment).with_fatigue(FatiguePolicy::off());
        solved(solve(&off));
    }

    #[test]
    fn test_slot_capacity_limits_instant() {
        let raw = RawTables::new()
            .with_slot("X1", "2026-06-12", "10:00-11:00")
            .with_slot("X2", "2026-06-12", "10:00-11:00")
            .with_panelist("Sup", 0)
            .with_panelist("E1", 1)
            .with_panelist("E2", 1)
            .with_panelist("E3", 1)
            .with_expertise("E1", &["T"])
            .with_expertise("E2", &["T"])
            .with_expertise("E3", &["T"])
            .with_project("P01", "T", "Sup", 1)
            .with_project("P02", "T", "Sup", 1)
            .with_project("P03", "T", "Sup", 1)
            .with_full_availability("E1")
            .with_full_availability("E2")
            .with_full_availability("E3");
        let ds = normalize(&raw).unwrap();
        let assignment = PanelAssignment::new()
            .with_panel("P01", &["E1"])
            .with_panel("P02", &["E2"])
            .with_panel("P03", &["E3"]);

        let builder = TimetableModelBuilder::new(&ds, &assignment);
        assert_eq!(solve(&builder), infeasible());

        let roomy = TimetableModelBuilder::new(&ds, &assignment).with_slot_capacity(2);
        solved(solve(&roomy));

        let capped = TimetableModelBuilder::new(&ds, &assignment)
            .with_slot_capacity(2)
            .with_max_parallel_defenses(2);
        assert_eq!(solve(&capped), infeasible());
    }

    #[test]
    fn test_fixed_room_slot_hosts_one() {
        let raw = RawTables::new()
            .with_room_slot("F", "2026-06-12", "10:00-11:00", "Aula")
            .with_slot("G", "2026-06-12", "10:00-11:00")
            .with_panelist("Sup", 0)
            .with_panelist("E1", 1)
            .with_panelist("E2", 1)
            .with_expertise("E1", &["T"])
            .with_expertise("E2", &["T"])
            .with_project("P01", "T", "Sup", 1)
            .with_project("P02", "T", "Sup", 1)
            .with_full_availability("E1")
            .with_full_availability("E2");
        let ds = normalize(&raw).unwrap();
        let assignment = PanelAssignment::new()
            .with_panel("P01", &["E1"])
            .with_panel("P02", &["E2"]);

        let builder = TimetableModelBuilder::new(&ds, &assignment).with_slot_capacity(2);
        let built = builder.build();
        let fixed_row = built
            .model
            .constraints()
            .iter()
            .find(|c| c.name == "slot_capacity[F]")
            .unwrap();
        assert_eq!(fixed_row.rhs, 1.0);
        assert!(built
            .model
            .constraints()
            .iter()
            .all(|c| c.name != "slot_capacity[G]"));

        let schedule = solved(solve(&builder));
        assert!(schedule.projects_in("F").len() <= 1);
        assert_eq!(schedule.slots.len(), 2);
    }

    #[test]
    fn test_fewest_days() {
        let raw = RawTables::new()
            .with_slot("D1", "2026-06-12", "10:00-11:00")
            .with_slot("D2a", "2026-06-15", "10:00-11:00")
            .with_slot("D2b", "2026-06-15", "13:00-14:00")
            .with_panelist("Sup", 0)
            .with_panelist("E1", 1)
            .with_panelist("E2", 1)
            .with_expertise("E1", &["T"])
            .with_expertise("E2", &["T"])
            .with_project("P01", "T", "Sup", 1)
            .with_project("P02", "T", "Sup", 1)
            .with_full_availability("E1")
            .with_full_availability("E2");
        let ds = normalize(&raw).unwrap();
        let assignment = PanelAssignment::new()
            .with_panel("P01", &["E1"])
            .with_panel("P02", &["E2"]);

        let builder = TimetableModelBuilder::new(&ds, &assignment)
            .with_objective(ScheduleObjective::FewestDays);
        let schedule = solved(solve(&builder));
        assert!(schedule.slot_of("P01").unwrap().starts_with("D2"));
        assert!(schedule.slot_of("P02").unwrap().starts_with("D2"));
    }

    #[test]
    fn test_earliest() {
        let raw = RawTables::new()
            .with_slot("Late", "2026-06-13", "10:00-11:00")
            .with_slot("Early", "2026-06-12", "15:00-16:00")
            .with_panelist("Sup", 0)
            .with_panelist("E1", 1)
            .with_expertise("E1", &["T"])
            .with_project("P01", "T", "Sup", 1)
            .with_full_availability("E1");
        let ds = normalize(&raw).unwrap();
        let assignment = PanelAssignment::new().with_panel("P01", &["E1"]);

        let builder =
            TimetableModelBuilder::new(&ds, &assignment).with_objective(ScheduleObjective::Earliest);
        let schedule = solved(solve(&builder));
        assert_eq!(schedule.slot_of("P01"), Some("Early"));
    }

    #[test]
    fn test_unknown_panelist_has_no_slot() {
        let (ds, _) = shared_panelist(&[("S1", "2026-06-12", "10:00-11:00")]);
        let assignment = PanelAssignment::new()
            .with_panel("P01", &["Ghost"])
            .with_panel("P02", &["Prof_A"]);
        let built = TimetableModelBuilder::new(&ds, &assignment).build();
        assert!(built.usable_slots(0).is_empty());
        assert!(built.model.constant_violation().is_some());
    }
}
