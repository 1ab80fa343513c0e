//! Result quality metrics (KPIs).
//!
//! Computes summary indicators from a finished run.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Load min / max / mean / std-dev | Panels per panelist with capacity |
//! | Load spread | max − min load |
//! | Capacity utilization | Seats filled / Σ max_panels |
//! | Days used | Distinct dates with a defense |
//! | Rooms used | Distinct room labels |
//! | Slot utilization | Slots used / slots offered |
//! | Peak parallel | Most defenses at one instant |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::models::{DefenseSchedule, PanelAssignment, RoomPlan, SlotInstant};

/// Per-topic overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub topic: String,
    /// Projects with this topic, sorted.
    pub projects: Vec<String>,
    /// Panelists with expertise in this topic, sorted.
    pub eligible_panelists: Vec<String>,
    /// Σ required_panelists over the topic's projects.
    pub seats_required: u32,
}

/// Result performance indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleKpi {
    /// Scheduled defenses.
    pub defenses: usize,
    /// Panelists on at least one panel.
    pub panelists_used: usize,
    pub load_min: usize,
    pub load_max: usize,
    pub load_mean: f64,
    pub load_std_dev: f64,
    /// Panel count per panelist id (capacity > 0 only).
    pub load_by_panelist: BTreeMap<String, usize>,
    /// Filled seats / total capacity (0.0..1.0).
    pub capacity_utilization: f64,
    pub days_used: usize,
    pub defenses_per_day: BTreeMap<NaiveDate, usize>,
    pub rooms_used: usize,
    /// Used slots / offered slots (0.0..1.0).
    pub slot_utilization: f64,
    /// Most defenses sharing one instant.
    pub peak_parallel: usize,
    pub topics: Vec<TopicSummary>,
}

impl ScheduleKpi {
    /// Computes KPIs from a finished run.
    ///
    /// Load statistics cover every panelist with positive capacity,
    /// including those left without a panel.
    pub fn calculate(
        dataset: &Dataset,
        assignment: &PanelAssignment,
        schedule: &DefenseSchedule,
        rooms: &RoomPlan,
    ) -> Self {
        let load_by_panelist: BTreeMap<String, usize> = dataset
            .panelists()
            .iter()
            .filter(|p| p.max_panels > 0)
            .map(|p| (p.id.clone(), assignment.load(&p.id)))
            .collect();
        let loads: Vec<usize> = load_by_panelist.values().copied().collect();
        let (load_mean, load_std_dev) = mean_std(&loads);

        let total_capacity: u64 = dataset
            .panelists()
            .iter()
            .map(|p| u64::from(p.max_panels))
            .sum();

        let mut defenses_per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        let mut per_instant: BTreeMap<SlotInstant, usize> = BTreeMap::new();
        let mut used_slots = BTreeSet::new();
        for slot_id in schedule.slots.values() {
            if let Some(s) = dataset.slot_idx(slot_id) {
                let slot = &dataset.slots()[s];
                *defenses_per_day.entry(slot.date).or_default() += 1;
                *per_instant.entry(slot.instant()).or_default() += 1;
                used_slots.insert(s);
            }
        }

        Self {
            defenses: schedule.project_count(),
            panelists_used: assignment.loads().len(),
            load_min: loads.iter().copied().min().unwrap_or(0),
            load_max: loads.iter().copied().max().unwrap_or(0),
            load_mean,
            load_std_dev,
            load_by_panelist,
            capacity_utilization: ratio(assignment.seat_count() as f64, total_capacity as f64),
            days_used: defenses_per_day.len(),
            defenses_per_day,
            rooms_used: rooms.room_count,
            slot_utilization: ratio(used_slots.len() as f64, dataset.slots().len() as f64),
            peak_parallel: per_instant.values().copied().max().unwrap_or(0),
            topics: topic_summaries(dataset),
        }
    }

    /// Max − min panel load.
    pub fn load_spread(&self) -> usize {
        self.load_max - self.load_min
    }

    /// Whether the result meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_load_spread: usize, max_days: usize) -> bool {
        self.load_spread() <= max_load_spread && self.days_used <= max_days
    }
}

/// Projects and eligible panelists per topic.
pub fn topic_summaries(dataset: &Dataset) -> Vec<TopicSummary> {
    dataset
        .topics()
        .into_iter()
        .map(|topic| {
            let mut projects = Vec::new();
            let mut seats_required = 0;
            for j in dataset.projects_with_topic(topic) {
                let project = &dataset.projects()[j];
                projects.push(project.id.clone());
                seats_required += project.required_panelists;
            }
            projects.sort();
            let mut eligible_panelists: Vec<String> = dataset
                .eligible_panelists(topic)
                .map(|p| dataset.panelists()[p].id.clone())
                .collect();
            eligible_panelists.sort();
            TopicSummary {
                topic: topic.to_string(),
                projects,
                eligible_panelists,
                seats_required,
            }
        })
        .collect()
}

fn mean_std(values: &[usize]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}
