//! Independent check of a finished result.
//!
//! Re-derives every data-model invariant from the dataset and the
//! produced assignment, schedule and rooms, without trusting the models
//! that produced them. The pipeline runs it before reporting success and
//! on every incumbent accepted after a timeout.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{FatiguePolicy, SchedulerConfig};
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::models::{DefenseSchedule, PanelAssignment, RoomPlan, SlotInstant};

/// Classification of invariant violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Panel size differs from `required_panelists`.
    PanelSize,
    SupervisorOnPanel,
    /// Panel member lacks expertise in the project's topic.
    MissingExpertise,
    /// Panelist sits on more panels than `max_panels`.
    CapacityExceeded,
    UnknownEntity,
    Unscheduled,
    /// Panel member cannot attend the chosen slot.
    Unavailable,
    /// Shared panelist in overlapping slots.
    DoubleBooked,
    /// Shared panelist in consecutive slots the fatigue rule covers.
    BackToBack,
    SlotOverfilled,
    ParallelCapExceeded,
    RoomMissing,
    RoomClash,
}

/// A broken invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Project, panelist, slot or room concerned.
    pub entity_id: String,
    pub message: String,
}

impl Violation {
    fn new(kind: ViolationKind, entity_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            entity_id: entity_id.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Checks results against one dataset and rule set.
pub struct Verifier<'a> {
    dataset: &'a Dataset,
    fatigue: FatiguePolicy,
    slot_capacity: u32,
    max_parallel: Option<u32>,
}

impl<'a> Verifier<'a> {
    /// Creates a verifier with default rules.
    pub fn new(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            fatigue: FatiguePolicy::default(),
            slot_capacity: 1,
            max_parallel: None,
        }
    }

    /// Uses the rules of a run configuration.
    pub fn with_config(mut self, config: &SchedulerConfig) -> Self {
        self.fatigue = config.fatigue;
        self.slot_capacity = config.slot_capacity;
        self.max_parallel = config.max_parallel_defenses;
        self
    }

    /// Panel invariants: size, supervisor exclusion, expertise, capacity.
    pub fn check_assignment(&self, assignment: &PanelAssignment) -> Vec<Violation> {
        let ds = self.dataset;
        let mut out = Vec::new();

        for project in ds.projects() {
            let panel = assignment.panel(&project.id);
            if panel.len() != project.required_panelists as usize {
                out.push(Violation::new(
                    ViolationKind::PanelSize,
                    &project.id,
                    format!(
                        "project '{}' has {} panelists, needs {}",
                        project.id,
                        panel.len(),
                        project.required_panelists
                    ),
                ));
            }
            for member in panel {
                if project.is_supervised_by(member) {
                    out.push(Violation::new(
                        ViolationKind::SupervisorOnPanel,
                        &project.id,
                        format!("supervisor '{member}' sits on project '{}'", project.id),
                    ));
                }
                match ds.panelist_idx(member) {
                    None => out.push(Violation::new(
                        ViolationKind::UnknownEntity,
                        member,
                        format!("project '{}' names unknown panelist '{member}'", project.id),
                    )),
                    Some(p) if !ds.has_expertise(p, &project.topic) => out.push(Violation::new(
                        ViolationKind::MissingExpertise,
                        member,
                        format!(
                            "'{member}' has no expertise in '{}' (project '{}')",
                            project.topic, project.id
                        ),
                    )),
                    Some(_) => {}
                }
            }
        }

        for project_id in assignment.panels.keys() {
            if ds.project_idx(project_id).is_none() {
                out.push(Violation::new(
                    ViolationKind::UnknownEntity,
                    project_id,
                    format!("assignment names unknown project '{project_id}'"),
                ));
            }
        }

        for panelist in ds.panelists() {
            let load = assignment.load(&panelist.id);
            if load > panelist.max_panels as usize {
                out.push(Violation::new(
                    ViolationKind::CapacityExceeded,
                    &panelist.id,
                    format!(
                        "'{}' sits on {load} panels, max {}",
                        panelist.id, panelist.max_panels
                    ),
                ));
            }
        }
        out
    }

    /// Timetable invariants for a fixed assignment.
    pub fn check_schedule(
        &self,
        assignment: &PanelAssignment,
        schedule: &DefenseSchedule,
    ) -> Vec<Violation> {
        let ds = self.dataset;
        let mut out = Vec::new();
        let mut placed: Vec<(&str, SlotInstant)> = Vec::new();
        let mut per_slot: BTreeMap<&str, usize> = BTreeMap::new();
        let mut per_instant: BTreeMap<SlotInstant, usize> = BTreeMap::new();

        for project in ds.projects() {
            let Some(slot_id) = schedule.slot_of(&project.id) else {
                out.push(Violation::new(
                    ViolationKind::Unscheduled,
                    &project.id,
                    format!("project '{}' has no slot", project.id),
                ));
                continue;
            };
            let Some(s) = ds.slot_idx(slot_id) else {
                out.push(Violation::new(
                    ViolationKind::UnknownEntity,
                    slot_id,
                    format!("project '{}' placed in unknown slot '{slot_id}'", project.id),
                ));
                continue;
            };
            for member in assignment.panel(&project.id) {
                if let Some(p) = ds.panelist_idx(member) {
                    if !ds.is_available(p, s) {
                        out.push(Violation::new(
                            ViolationKind::Unavailable,
                            member,
                            format!(
                                "'{member}' is not available in slot '{slot_id}' (project '{}')",
                                project.id
                            ),
                        ));
                    }
                }
            }
            let instant = ds.slots()[s].instant();
            *per_slot.entry(slot_id).or_default() += 1;
            *per_instant.entry(instant).or_default() += 1;
            placed.push((project.id.as_str(), instant));
        }

        for project_id in schedule.slots.keys() {
            if ds.project_idx(project_id).is_none() {
                out.push(Violation::new(
                    ViolationKind::UnknownEntity,
                    project_id,
                    format!("schedule names unknown project '{project_id}'"),
                ));
            }
        }

        for (slot_id, count) in per_slot {
            let fixed = ds
                .slot_idx(slot_id)
                .is_some_and(|s| ds.slots()[s].room.is_some());
            let capacity = if fixed {
                self.slot_capacity.min(1)
            } else {
                self.slot_capacity
            };
            if count > capacity as usize {
                out.push(Violation::new(
                    ViolationKind::SlotOverfilled,
                    slot_id,
                    format!("slot '{slot_id}' hosts {count} defenses, capacity {capacity}"),
                ));
            }
        }
        if let Some(rooms) = self.max_parallel {
            for (instant, count) in per_instant {
                if count > rooms as usize {
                    out.push(Violation::new(
                        ViolationKind::ParallelCapExceeded,
                        instant.to_string(),
                        format!("{count} defenses run at {instant}, cap {rooms}"),
                    ));
                }
            }
        }

        for (i, (a, ia)) in placed.iter().enumerate() {
            for (b, ib) in &placed[i + 1..] {
                if !assignment.shares_panelist(a, b) {
                    continue;
                }
                if ia.overlaps(ib) {
                    out.push(Violation::new(
                        ViolationKind::DoubleBooked,
                        *a,
                        format!("'{a}' ({ia}) and '{b}' ({ib}) share a panelist and overlap"),
                    ));
                } else if (ia.is_followed_by(ib) || ib.is_followed_by(ia))
                    && self
                        .fatigue
                        .applies(ia.range.duration_minutes(), ib.range.duration_minutes())
                {
                    out.push(Violation::new(
                        ViolationKind::BackToBack,
                        *a,
                        format!("'{a}' ({ia}) and '{b}' ({ib}) share a panelist back to back"),
                    ));
                }
            }
        }
        out
    }

    /// Room invariants: every defense has a room; concurrent defenses
    /// have different rooms.
    pub fn check_rooms(&self, schedule: &DefenseSchedule, rooms: &RoomPlan) -> Vec<Violation> {
        let ds = self.dataset;
        let mut out = Vec::new();
        let mut roomed: Vec<(&str, SlotInstant, &str)> = Vec::new();

        for (project_id, slot_id) in &schedule.slots {
            let Some(room) = rooms.room_of(project_id) else {
                out.push(Violation::new(
                    ViolationKind::RoomMissing,
                    project_id,
                    format!("project '{project_id}' has no room"),
                ));
                continue;
            };
            if let Some(s) = ds.slot_idx(slot_id) {
                roomed.push((project_id.as_str(), ds.slots()[s].instant(), room));
            }
        }

        for (i, (a, ia, ra)) in roomed.iter().enumerate() {
            for (b, ib, rb) in &roomed[i + 1..] {
                if ra == rb && ia.overlaps(ib) {
                    out.push(Violation::new(
                        ViolationKind::RoomClash,
                        *ra,
                        format!("'{a}' and '{b}' both use room '{ra}' at {ib}"),
                    ));
                }
            }
        }
        out
    }

    /// Runs every check; fails with all violations joined.
    pub fn verify(
        &self,
        assignment: &PanelAssignment,
        schedule: &DefenseSchedule,
        rooms: &RoomPlan,
    ) -> Result<()> {
        let mut violations = self.check_assignment(assignment);
        violations.extend(self.check_schedule(assignment, schedule));
        violations.extend(self.check_rooms(schedule, rooms));
        if violations.is_empty() {
            return Ok(());
        }
        let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
        Err(Error::InvariantViolation(messages.join("; ")))
    }
}
