//! Seeded synthetic input generator.
//!
//! Produces [`RawTables`] shaped like a real defense season: working-day
//! dates, fixed-length slots across the day, supervisors who also sit on
//! panels, and dense but imperfect availability. The same seed always
//! yields the same tables.
//!
//! # Algorithm
//! 1. Draw projects (topic, supervisor, panel size 2 or 3)
//! 2. Draw panelist capacity and 3–6 expertise topics each
//! 3. Top up with extra high-capacity generalists while total capacity is
//!    below total seats
//! 4. Draw availability per panelist around a base rate, then force a
//!    minimum number of available panelists per slot
//! 5. Add expertise until every project has enough eligible
//!    non-supervisors

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use rand::prelude::IndexedRandom;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::models::{IndicatorRow, IndicatorTable, PanelistRow, ProjectRow, RawTables, SlotRow};

const TOPICS: [&str; 20] = [
    "NLP",
    "Finance",
    "ML",
    "Data_Science",
    "Cybersecurity",
    "Web_Development",
    "Mobile_Apps",
    "Cloud_Computing",
    "IoT",
    "Blockchain",
    "AI_Ethics",
    "Computer_Vision",
    "Robotics",
    "Game_Development",
    "Database_Systems",
    "Networking",
    "Software_Engineering",
    "Human_Computer_Interaction",
    "Distributed_Systems",
    "Quantum_Computing",
];

/// Shape of the generated season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub projects: usize,
    /// Panelists who supervise projects.
    pub supervisors: usize,
    /// Panelists who only sit on panels.
    pub extra_panelists: usize,
    pub topics: usize,
    pub start_date: NaiveDate,
    /// Weekdays from `start_date` on.
    pub working_days: usize,
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
    pub slot_minutes: u32,
    /// Probability that a project needs 3 panelists instead of 2.
    pub three_panel_ratio: f64,
    /// Inclusive range of expertise topics per panelist.
    pub expertise_per_panelist: (usize, usize),
    /// Inclusive `max_panels` range for supervisors.
    pub supervisor_capacity: (u32, u32),
    /// Inclusive `max_panels` range for other panelists.
    pub panelist_capacity: (u32, u32),
    /// Range of each panelist's base availability rate.
    pub availability: (f64, f64),
    /// Panelists forced available in every slot.
    pub min_available_per_slot: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            projects: 120,
            supervisors: 30,
            extra_panelists: 20,
            topics: 20,
            start_date: NaiveDate::from_ymd_opt(2026, 5, 11).unwrap_or_default(),
            working_days: 14,
            day_start: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            day_end: NaiveTime::from_hms_opt(17, 30, 0).unwrap_or_default(),
            slot_minutes: 30,
            three_panel_ratio: 0.3,
            expertise_per_panelist: (3, 6),
            supervisor_capacity: (5, 8),
            panelist_capacity: (4, 6),
            availability: (0.95, 1.0),
            min_available_per_slot: 10,
        }
    }
}

impl GeneratorConfig {
    /// A small season for tests and demos.
    pub fn small() -> Self {
        Self {
            projects: 8,
            supervisors: 4,
            extra_panelists: 4,
            topics: 3,
            working_days: 2,
            day_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            day_end: NaiveTime::from_hms_opt(13, 0, 0).unwrap_or_default(),
            expertise_per_panelist: (2, 3),
            min_available_per_slot: 4,
            ..Self::default()
        }
    }

    pub fn with_projects(mut self, projects: usize) -> Self {
        self.projects = projects;
        self
    }

    pub fn with_working_days(mut self, days: usize) -> Self {
        self.working_days = days;
        self
    }

    pub fn with_slot_minutes(mut self, minutes: u32) -> Self {
        self.slot_minutes = minutes;
        self
    }

    pub fn with_availability(mut self, low: f64, high: f64) -> Self {
        self.availability = (low, high);
        self
    }

    /// Working dates, skipping weekends.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::with_capacity(self.working_days);
        let mut day = self.start_date;
        while dates.len() < self.working_days {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                dates.push(day);
            }
            day += Duration::days(1);
        }
        dates
    }

    /// `"HH:MM-HH:MM"` labels of one day's slots.
    pub fn day_times(&self) -> Vec<String> {
        let mut times = Vec::new();
        if self.slot_minutes == 0 {
            return times;
        }
        let step = Duration::minutes(i64::from(self.slot_minutes));
        let mut start = self.day_start;
        loop {
            let (end, wrapped) = start.overflowing_add_signed(step);
            if wrapped != 0 || end > self.day_end {
                break;
            }
            times.push(format!("{}-{}", start.format("%H:%M"), end.format("%H:%M")));
            start = end;
        }
        times
    }
}

/// Generates synthetic seasons.
#[derive(Debug, Clone, Default)]
pub struct DatasetGenerator {
    config: GeneratorConfig,
}

impl DatasetGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generates tables for `seed`.
    pub fn generate(&self, seed: u64) -> RawTables {
        let cfg = &self.config;
        let mut rng = SmallRng::seed_from_u64(seed);

        let topics: Vec<String> = (0..cfg.topics.max(1))
            .map(|i| match TOPICS.get(i) {
                Some(name) => (*name).to_string(),
                None => format!("Topic_{:02}", i + 1),
            })
            .collect();

        let supervisors = cfg.supervisors.max(1);
        let mut panelists: Vec<PanelistRow> = (0..supervisors + cfg.extra_panelists)
            .map(|i| {
                let (lo, hi) = if i < supervisors {
                    cfg.supervisor_capacity
                } else {
                    cfg.panelist_capacity
                };
                PanelistRow {
                    panelist_id: format!("Prof_{:02}", i + 1),
                    max_panels: f64::from(rng.random_range(lo..=hi.max(lo))),
                }
            })
            .collect();

        let projects: Vec<ProjectRow> = (0..cfg.projects)
            .map(|i| {
                let topic = topics[rng.random_range(0..topics.len())].clone();
                let supervisor = panelists[rng.random_range(0..supervisors)].panelist_id.clone();
                let required = if rng.random_bool(cfg.three_panel_ratio.clamp(0.0, 1.0)) {
                    3.0
                } else {
                    2.0
                };
                ProjectRow {
                    project_id: format!("P{:03}", i + 1),
                    topic,
                    supervisor,
                    required_panelists: required,
                }
            })
            .collect();

        let (lo, hi) = cfg.expertise_per_panelist;
        let mut expertise: Vec<Vec<bool>> = panelists
            .iter()
            .map(|_| {
                let k = rng.random_range(lo..=hi.max(lo)).min(topics.len());
                pick(&mut rng, topics.len(), k)
            })
            .collect();

        // Generalists with full availability cover any capacity gap.
        let seats: f64 = projects.iter().map(|p| p.required_panelists).sum();
        let mut capacity: f64 = panelists.iter().map(|p| p.max_panels).sum();
        let mut generalists = Vec::new();
        while capacity < seats {
            let max_panels = f64::from(rng.random_range(5..=7u32));
            capacity += max_panels;
            generalists.push(panelists.len());
            panelists.push(PanelistRow {
                panelist_id: format!("Extra_{:02}", generalists.len()),
                max_panels,
            });
            let k = rng.random_range(8..=14usize).min(topics.len());
            expertise.push(pick(&mut rng, topics.len(), k));
        }

        let dates = cfg.dates();
        let times = cfg.day_times();
        let mut slots = Vec::with_capacity(dates.len() * times.len());
        for date in &dates {
            for time in &times {
                slots.push(SlotRow {
                    slot_id: format!("S{:03}", slots.len() + 1),
                    date: date.format("%Y-%m-%d").to_string(),
                    time: time.clone(),
                    room: None,
                });
            }
        }

        let (alo, ahi) = cfg.availability;
        let mut availability: Vec<Vec<bool>> = (0..panelists.len())
            .map(|p| {
                if generalists.contains(&p) {
                    return vec![true; slots.len()];
                }
                let base = if ahi > alo {
                    rng.random_range(alo..ahi)
                } else {
                    alo
                };
                (0..slots.len())
                    .map(|_| rng.random::<f64>() < base)
                    .collect()
            })
            .collect();
        for s in 0..slots.len() {
            let mut missing = cfg
                .min_available_per_slot
                .saturating_sub(availability.iter().filter(|row| row[s]).count());
            for row in availability.iter_mut() {
                if missing == 0 {
                    break;
                }
                if !row[s] {
                    row[s] = true;
                    missing -= 1;
                }
            }
        }

        for project in &projects {
            let Some(t) = topics.iter().position(|t| *t == project.topic) else {
                continue;
            };
            let needed = project.required_panelists as usize;
            let eligible = panelists
                .iter()
                .zip(&expertise)
                .filter(|(p, e)| e[t] && p.panelist_id != project.supervisor)
                .count();
            if eligible >= needed {
                continue;
            }
            let mut lacking: Vec<usize> = (0..panelists.len())
                .filter(|&p| !expertise[p][t] && panelists[p].panelist_id != project.supervisor)
                .collect();
            for _ in eligible..needed {
                if lacking.is_empty() {
                    break;
                }
                let p = lacking.swap_remove(rng.random_range(0..lacking.len()));
                expertise[p][t] = true;
            }
        }

        RawTables {
            expertise: indicator(&panelists, &topics, &expertise),
            availability: indicator(
                &panelists,
                &slots.iter().map(|s| s.slot_id.clone()).collect::<Vec<_>>(),
                &availability,
            ),
            projects,
            panelists,
            slots,
        }
    }
}

/// `k` distinct indices out of `n` as a membership mask.
fn pick<R: Rng>(rng: &mut R, n: usize, k: usize) -> Vec<bool> {
    let indices: Vec<usize> = (0..n).collect();
    let mut mask = vec![false; n];
    for &i in indices.choose_multiple(rng, k) {
        mask[i] = true;
    }
    mask
}

fn indicator(panelists: &[PanelistRow], columns: &[String], cells: &[Vec<bool>]) -> IndicatorTable {
    let mut table = IndicatorTable::with_columns(columns.iter().cloned());
    table.rows = panelists
        .iter()
        .zip(cells)
        .map(|(p, row)| IndicatorRow {
            id: p.panelist_id.clone(),
            values: row.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
        })
        .collect();
    table
}
