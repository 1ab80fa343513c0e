//! Schedule (Phase 2 solution) and room plan models.
//!
//! A schedule places every project into exactly one slot. A room plan
//! labels each scheduled project with a room so that concurrent defenses
//! never share one.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::TimeRange;

/// Project → slot mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenseSchedule {
    /// Slot id per project id.
    pub slots: BTreeMap<String, String>,
}

impl DefenseSchedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a project into a slot, replacing any earlier placement.
    pub fn place(&mut self, project_id: impl Into<String>, slot_id: impl Into<String>) {
        self.slots.insert(project_id.into(), slot_id.into());
    }

    /// Builder form of [`DefenseSchedule::place`].
    pub fn with_placement(mut self, project_id: &str, slot_id: &str) -> Self {
        self.place(project_id, slot_id);
        self
    }

    /// Slot of a project.
    pub fn slot_of(&self, project_id: &str) -> Option<&str> {
        self.slots.get(project_id).map(String::as_str)
    }

    /// Projects placed in a slot, in project id order.
    pub fn projects_in(&self, slot_id: &str) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|(_, s)| s.as_str() == slot_id)
            .map(|(p, _)| p.as_str())
            .collect()
    }

    /// Number of scheduled projects.
    pub fn project_count(&self) -> usize {
        self.slots.len()
    }
}

/// Room label per scheduled project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPlan {
    /// Room label per project id.
    pub rooms: BTreeMap<String, String>,
    /// Number of distinct room labels in use.
    pub room_count: usize,
}

impl RoomPlan {
    /// Room of a project.
    pub fn room_of(&self, project_id: &str) -> Option<&str> {
        self.rooms.get(project_id).map(String::as_str)
    }
}

/// One fully resolved defense: who, when, where.
///
/// Denormalized for calendar-style consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledDefense {
    pub project_id: String,
    pub topic: String,
    pub slot_id: String,
    pub date: NaiveDate,
    pub time: TimeRange,
    pub room: String,
    /// Panel members, sorted.
    pub panelists: Vec<String>,
}
