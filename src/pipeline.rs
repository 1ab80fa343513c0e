//! End-to-end defense scheduling.
//!
//! # Flow
//! 1. Normalize raw tables (fatal on validation errors)
//! 2. Phase 1: assign panels
//! 3. Phase 2: place each project in a slot
//! 4. Color rooms, verify every invariant, compute KPIs
//!
//! A phase that is infeasible or runs out of time is not an error: the
//! outcome reports `success: false` with a diagnosis attached. When Phase 2
//! fails, the Phase 1 assignment is still returned.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::assignment::PanelModelBuilder;
use crate::config::{FatigueMode, SchedulerConfig};
use crate::dataset::Dataset;
use crate::diagnostics::{Diagnosis, Diagnostician};
use crate::error::{Error, Result};
use crate::kpi::ScheduleKpi;
use crate::milp::{GoodLpSolver, MilpSolver};
use crate::models::{DefenseSchedule, PanelAssignment, RawTables, RoomPlan, ScheduledDefense};
use crate::phase::{PhaseFailure, PhaseOutcome};
use crate::rooms::assign_rooms;
use crate::timetable::TimetableModelBuilder;
use crate::validation::{normalize, IssueKind, Severity, ValidationIssue};
use crate::verify::Verifier;

/// Result of a scheduling run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleOutcome {
    pub success: bool,
    /// Set when `success` is false.
    pub failure: Option<PhaseFailure>,
    /// Phase 1 result. Kept when Phase 2 fails.
    pub assignment: Option<PanelAssignment>,
    pub schedule: Option<DefenseSchedule>,
    pub rooms: Option<RoomPlan>,
    /// One row per defense, sorted by date, time, room.
    pub defenses: Vec<ScheduledDefense>,
    /// Whether the balanced assignment objective was applied.
    pub assignment_refined: bool,
    /// Whether the schedule objective was applied.
    pub schedule_refined: bool,
    pub diagnostics: Option<Diagnosis>,
    /// Non-fatal validation findings.
    pub warnings: Vec<ValidationIssue>,
    pub kpi: Option<ScheduleKpi>,
}

impl ScheduleOutcome {
    fn failed(
        failure: PhaseFailure,
        assignment: Option<PanelAssignment>,
        assignment_refined: bool,
        diagnosis: Diagnosis,
        warnings: Vec<ValidationIssue>,
    ) -> Self {
        Self {
            success: false,
            failure: Some(failure),
            assignment,
            schedule: None,
            rooms: None,
            defenses: Vec::new(),
            assignment_refined,
            schedule_refined: false,
            diagnostics: Some(diagnosis),
            warnings,
            kpi: None,
        }
    }

    /// The defense of a project, if scheduled.
    pub fn defense(&self, project_id: &str) -> Option<&ScheduledDefense> {
        self.defenses.iter().find(|d| d.project_id == project_id)
    }
}

/// Two-phase defense scheduler.
///
/// # Example
/// ```
/// use u_defense::{DefenseScheduler, RawTables, SchedulerConfig};
///
/// let tables = RawTables::new()
///     .with_slot("S1", "2026-06-12", "10:00-11:00")
///     .with_panelist("Sup", 0)
///     .with_panelist("E1", 2)
///     .with_expertise("E1", &["ML"])
///     .with_full_availability("E1")
///     .with_project("P01", "ML", "Sup", 1);
///
/// let outcome = DefenseScheduler::new(SchedulerConfig::default())
///     .run(&tables)
///     .unwrap();
/// assert!(outcome.success);
/// assert_eq!(outcome.defenses[0].room, "R1");
/// ```
pub struct DefenseScheduler<S = GoodLpSolver> {
    solver: S,
    config: SchedulerConfig,
}

impl DefenseScheduler<GoodLpSolver> {
    /// Scheduler backed by the bundled MILP solver.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            solver: GoodLpSolver::new(),
            config,
        }
    }
}

impl<S: MilpSolver> DefenseScheduler<S> {
    /// Scheduler backed by a custom solver.
    pub fn with_solver(solver: S, config: SchedulerConfig) -> Self {
        Self { solver, config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Validates `tables` and runs both phases.
    pub fn run(&self, tables: &RawTables) -> Result<ScheduleOutcome> {
        let dataset = normalize(tables).map_err(|report| {
            warn!(errors = report.error_count(), "input validation failed");
            Error::Validation(report)
        })?;
        self.run_dataset(&dataset)
    }

    /// Runs both phases on an already normalized dataset.
    pub fn run_dataset(&self, dataset: &Dataset) -> Result<ScheduleOutcome> {
        let cfg = &self.config;
        // Mixed durations only matter to the threshold fatigue rule.
        let warnings: Vec<ValidationIssue> = dataset
            .warnings()
            .issues
            .iter()
            .filter(|issue| {
                issue.kind != IssueKind::MixedSlotDurations
                    || cfg.fatigue.mode == FatigueMode::Threshold
            })
            .cloned()
            .collect();
        for issue in &warnings {
            match issue.severity {
                Severity::Warning => warn!(kind = ?issue.kind, "{}", issue.message),
                _ => debug!(kind = ?issue.kind, "{}", issue.message),
            }
        }
        info!(
            projects = dataset.projects().len(),
            panelists = dataset.panelists().len(),
            slots = dataset.slots().len(),
            solver = self.solver.name(),
            "scheduling run started"
        );
        let mut diagnostician = Diagnostician::new(dataset).with_slot_capacity(cfg.slot_capacity);
        if let Some(rooms) = cfg.max_parallel_defenses {
            diagnostician = diagnostician.with_max_parallel_defenses(rooms);
        }

        let phase1 = PanelModelBuilder::new(dataset)
            .with_objective(cfg.assignment_objective)
            .solve(&self.solver, &cfg.solver, cfg.timeout_policy)?;
        let (assignment, assignment_refined) = match phase1 {
            PhaseOutcome::Solved { solution, refined } => (solution, refined),
            PhaseOutcome::Failed(failure) => {
                warn!(?failure, "panel assignment failed");
                let diagnosis = diagnostician.diagnose(failure, None);
                return Ok(ScheduleOutcome::failed(failure, None, false, diagnosis, warnings));
            }
        };

        let verifier = Verifier::new(dataset).with_config(cfg);
        let violations = verifier.check_assignment(&assignment);
        if let Some(first) = violations.first() {
            return Err(Error::InvariantViolation(first.to_string()));
        }

        let phase2 = TimetableModelBuilder::new(dataset, &assignment)
            .with_config(cfg)
            .solve(&self.solver, &cfg.solver, cfg.timeout_policy)?;
        let (schedule, schedule_refined) = match phase2 {
            PhaseOutcome::Solved { solution, refined } => (solution, refined),
            PhaseOutcome::Failed(failure) => {
                warn!(?failure, "defense timetable failed");
                let diagnosis = diagnostician.diagnose(failure, Some(&assignment));
                return Ok(ScheduleOutcome::failed(
                    failure,
                    Some(assignment),
                    assignment_refined,
                    diagnosis,
                    warnings,
                ));
            }
        };

        let rooms = assign_rooms(dataset, &schedule)?;
        verifier.verify(&assignment, &schedule, &rooms)?;
        let kpi = ScheduleKpi::calculate(dataset, &assignment, &schedule, &rooms);
        let defenses = resolve_defenses(dataset, &assignment, &schedule, &rooms);
        info!(
            defenses = defenses.len(),
            rooms = rooms.room_count,
            days = kpi.days_used,
            load_spread = kpi.load_spread(),
            "scheduling run complete"
        );

        Ok(ScheduleOutcome {
            success: true,
            failure: None,
            assignment: Some(assignment),
            schedule: Some(schedule),
            rooms: Some(rooms),
            defenses,
            assignment_refined,
            schedule_refined,
            diagnostics: None,
            warnings,
            kpi: Some(kpi),
        })
    }
}

/// Runs the default scheduler on `tables`.
pub fn schedule_defenses(tables: &RawTables, config: SchedulerConfig) -> Result<ScheduleOutcome> {
    DefenseScheduler::new(config).run(tables)
}

fn resolve_defenses(
    dataset: &Dataset,
    assignment: &PanelAssignment,
    schedule: &DefenseSchedule,
    rooms: &RoomPlan,
) -> Vec<ScheduledDefense> {
    let mut defenses: Vec<ScheduledDefense> = dataset
        .projects()
        .iter()
        .filter_map(|project| {
            let slot_id = schedule.slot_of(&project.id)?;
            let slot = &dataset.slots()[dataset.slot_idx(slot_id)?];
            let mut panelists = assignment.panel(&project.id).to_vec();
            panelists.sort();
            Some(ScheduledDefense {
                project_id: project.id.clone(),
                topic: project.topic.clone(),
                slot_id: slot.id.clone(),
                date: slot.date,
                time: slot.range,
                room: rooms.room_of(&project.id).unwrap_or_default().to_string(),
                panelists,
            })
        })
        .collect();
    defenses.sort_by(|a, b| {
        (a.date, a.time.start, &a.room, &a.project_id).cmp(&(b.date, b.time.start, &b.room, &b.project_id))
    });
    defenses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::PanelModelBuilder;
    use crate::config::TimeoutPolicy;
    use crate::diagnostics::DiagnosticKind;
    use crate::generator::{DatasetGenerator, GeneratorConfig};
    use crate::milp::SolveVerdict;
    use crate::phase::testing::ScriptedSolver;
    use crate::config::FatiguePolicy;
    use crate::phase::Phase;

    fn four_parallel() -> RawTables {
        let mut raw = RawTables::new()
            .with_slot("X1", "2026-06-12", "10:00-11:00")
            .with_slot("X2", "2026-06-12", "10:00-11:00")
            .with_slot("X3", "2026-06-12", "10:00-11:00")
            .with_slot("X4", "2026-06-12", "10:00-11:00")
            .with_slot("Z", "2026-06-12", "14:00-15:00")
            .with_panelist("Sup", 0);
        for i in 1..=5 {
            let p = format!("E{i}");
            raw = raw
                .with_panelist(p.as_str(), 1)
                .with_expertise(&p, &["T"])
                .with_full_availability(&p)
                .with_project(format!("P0{i}"), "T", "Sup", 1);
        }
        raw
    }

    #[test]
    fn test_capacity_deficit_reported() {
        let raw = RawTables::new()
            .with_slot("S1", "2026-06-12", "10:00-11:00")
            .with_slot("S2", "2026-06-12", "11:00-12:00")
            .with_panelist("Sup", 2)
            .with_panelist("Only", 1)
            .with_expertise("Only", &["T"])
            .with_full_availability("Only")
            .with_project("P01", "T", "Sup", 1)
            .with_project("P02", "T", "Sup", 1);
        let outcome = schedule_defenses(&raw, SchedulerConfig::default()).unwrap();

        assert!(!outcome.success);
        assert_eq!(
            outcome.failure,
            Some(PhaseFailure::Infeasible {
                phase: Phase::Assignment
            })
        );
        assert!(outcome.assignment.is_none());
        let diagnosis = outcome.diagnostics.unwrap();
        let deficit: Vec<_> = diagnosis.of_kind(DiagnosticKind::TopicCapacityDeficit).collect();
        assert_eq!(deficit.len(), 1);
        assert_eq!(deficit[0].subject, "T");
        assert_eq!(deficit[0].deficit, 1);
    }

    #[test]
    fn test_slot_deficit_keeps_assignment() {
        let raw = RawTables::new()
            .with_slot("X1", "2026-06-12", "10:00-11:00")
            .with_slot("X2", "2026-06-12", "10:00-11:00")
            .with_slot("Y", "2026-06-12", "14:00-15:00")
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
            .with_availability("E1", &["X1", "X2"])
            .with_availability("E2", &["X1", "X2"])
            .with_availability("E3", &["X1", "X2"]);
        let outcome = DefenseScheduler::new(SchedulerConfig::default())
            .run(&raw)
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(
            outcome.failure,
            Some(PhaseFailure::Infeasible {
                phase: Phase::Scheduling
            })
        );
        assert_eq!(outcome.assignment.as_ref().unwrap().project_count(), 3);
        assert!(outcome.schedule.is_none());
        assert!(outcome.diagnostics.unwrap().has(DiagnosticKind::SlotDeficit));
    }

    #[test]
    fn test_parallel_defenses_get_distinct_rooms() {
        let outcome = DefenseScheduler::new(SchedulerConfig::default())
            .run(&four_parallel())
            .unwrap();

        assert!(outcome.success);
        let rooms = outcome.rooms.as_ref().unwrap();
        assert_eq!(rooms.room_count, 4);
        assert_eq!(outcome.defenses.len(), 5);

        let early: Vec<&str> = outcome.defenses[..4].iter().map(|d| d.room.as_str()).collect();
        assert_eq!(early, vec!["R1", "R2", "R3", "R4"]);
        assert_eq!(outcome.defenses[4].slot_id, "Z");
        assert_eq!(outcome.defenses[4].room, "R1");

        let kpi = outcome.kpi.unwrap();
        assert_eq!(kpi.peak_parallel, 4);
        assert_eq!(kpi.rooms_used, 4);
    }

    fn two_projects(raw: RawTables) -> RawTables {
        raw.with_panelist("Sup", 0)
            .with_panelist("E1", 1)
            .with_panelist("E2", 1)
            .with_expertise("E1", &["T"])
            .with_expertise("E2", &["T"])
            .with_full_availability("E1")
            .with_full_availability("E2")
            .with_project("P01", "T", "Sup", 1)
            .with_project("P02", "T", "Sup", 1)
    }

    #[test]
    fn test_fixed_room_slot_not_shared() {
        let config = SchedulerConfig::default().with_slot_capacity(2);

        let alone = two_projects(
            RawTables::new().with_room_slot("F", "2026-06-12", "10:00-11:00", "Aula"),
        );
        let outcome = schedule_defenses(&alone, config.clone()).unwrap();
        assert!(!outcome.success);
        assert_eq!(
            outcome.failure,
            Some(PhaseFailure::Infeasible {
                phase: Phase::Scheduling
            })
        );
        assert!(outcome.diagnostics.unwrap().has(DiagnosticKind::SlotDeficit));

        let with_spare = two_projects(
            RawTables::new()
                .with_room_slot("F", "2026-06-12", "10:00-11:00", "Aula")
                .with_slot("G", "2026-06-12", "10:00-11:00"),
        );
        let outcome = schedule_defenses(&with_spare, config).unwrap();
        assert!(outcome.success);
        let in_aula = outcome.defenses.iter().filter(|d| d.room == "Aula").count();
        assert!(in_aula <= 1);
        assert_eq!(outcome.rooms.unwrap().rooms.len(), 2);
    }

    #[test]
    fn test_parallel_cap_diagnosed() {
        let config = SchedulerConfig::default().with_max_parallel_defenses(2);
        let outcome = DefenseScheduler::new(config).run(&four_parallel()).unwrap();

        assert!(!outcome.success);
        let diagnosis = outcome.diagnostics.unwrap();
        let deficit: Vec<_> = diagnosis.of_kind(DiagnosticKind::SlotDeficit).collect();
        assert_eq!(deficit.len(), 1);
        assert_eq!(deficit[0].deficit, 2);
        assert!(!diagnosis.has(DiagnosticKind::Unattributed));
    }

    #[test]
    fn test_mixed_durations_warned_under_threshold_only() {
        let raw = RawTables::new()
            .with_slot("S1", "2026-06-12", "10:00-10:30")
            .with_slot("S2", "2026-06-12", "11:00-12:00")
            .with_panelist("Sup", 0)
            .with_panelist("E1", 1)
            .with_expertise("E1", &["T"])
            .with_full_availability("E1")
            .with_project("P01", "T", "Sup", 1);
        let mixed = |outcome: &ScheduleOutcome| {
            outcome
                .warnings
                .iter()
                .any(|w| w.kind == IssueKind::MixedSlotDurations)
        };

        let threshold = schedule_defenses(&raw, SchedulerConfig::default()).unwrap();
        assert!(threshold.success);
        assert!(mixed(&threshold));

        let off = SchedulerConfig::default().with_fatigue(FatiguePolicy::off());
        let outcome = schedule_defenses(&raw, off).unwrap();
        assert!(outcome.success);
        assert!(!mixed(&outcome));
    }

    #[test]
    fn test_validation_error_is_fatal() {
        let raw = RawTables::new()
            .with_slot("S1", "2026-06-12", "10:00-11:00")
            .with_panelist("Sup", 1)
            .with_project("P01", "T", "Nobody", 1);
        let err = schedule_defenses(&raw, SchedulerConfig::default()).unwrap_err();
        match err {
            Error::Validation(report) => {
                assert!(report.has_errors());
                assert!(report.contains(IssueKind::UnknownReference));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_timeout_fails_inconclusive() {
        let solver = ScriptedSolver::new(GoodLpSolver::new(), vec![SolveVerdict::Timeout(None)]);
        let outcome = DefenseScheduler::with_solver(solver, SchedulerConfig::default())
            .run(&four_parallel())
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(
            outcome.failure,
            Some(PhaseFailure::Timeout {
                phase: Phase::Assignment
            })
        );
        assert!(outcome.diagnostics.unwrap().has(DiagnosticKind::Inconclusive));
    }

    #[test]
    fn test_timeout_accepts_incumbent() {
        let raw = four_parallel();
        let ds = normalize(&raw).unwrap();
        let base = PanelModelBuilder::new(&ds).build_feasibility();
        let incumbent = match GoodLpSolver::new().solve(&base.model, &Default::default()) {
            SolveVerdict::Feasible(solution) => solution,
            other => panic!("unexpected verdict: {}", other.label()),
        };

        let config = SchedulerConfig::default().with_timeout_policy(TimeoutPolicy::AcceptIncumbent);
        let solver = ScriptedSolver::new(
            GoodLpSolver::new(),
            vec![SolveVerdict::Timeout(Some(incumbent))],
        );
        let scheduler = DefenseScheduler::with_solver(solver, config);
        let outcome = scheduler.run_dataset(&ds).unwrap();

        assert!(outcome.success);
        assert!(!outcome.assignment_refined);
        assert_eq!(scheduler.solver().call_count(), 2);
    }

    #[test]
    fn test_outcome_serializes() {
        let outcome = DefenseScheduler::new(SchedulerConfig::default())
            .run(&four_parallel())
            .unwrap();
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["success"], true);
        assert!(json["failure"].is_null());
        assert_eq!(json["rooms"]["room_count"], 4);
        assert_eq!(json["defenses"].as_array().unwrap().len(), 5);
        assert_eq!(json["defenses"][0]["date"], "2026-06-12");

        let failed = DefenseScheduler::with_solver(
            ScriptedSolver::new(GoodLpSolver::new(), vec![SolveVerdict::Infeasible]),
            SchedulerConfig::default(),
        )
        .run(&four_parallel())
        .unwrap();
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["failure"]["reason"], "infeasible");
        assert_eq!(json["failure"]["phase"], "assignment");
    }

    #[test]
    fn test_generated_season_end_to_end() {
        let cfg = GeneratorConfig::small().with_availability(1.0, 1.0);
        let raw = DatasetGenerator::new(cfg).generate(11);
        let config = SchedulerConfig::default()
            .with_assignment_objective(crate::config::AssignmentObjective::Balanced)
            .with_schedule_objective(crate::config::ScheduleObjective::FewestDays);
        let outcome = schedule_defenses(&raw, config).unwrap();

        assert!(outcome.success, "failure: {:?}", outcome.failure);
        assert_eq!(outcome.defenses.len(), raw.projects.len());
        for defense in &outcome.defenses {
            let project = raw
                .projects
                .iter()
                .find(|p| p.project_id == defense.project_id)
                .unwrap();
            assert_eq!(defense.panelists.len(), project.required_panelists as usize);
            assert!(!defense.panelists.contains(&project.supervisor));
        }
        let kpi = outcome.kpi.unwrap();
        assert_eq!(kpi.defenses, raw.projects.len());
        assert!(kpi.days_used >= 1);
    }
}
