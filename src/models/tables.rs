//! Raw tabular input.
//!
//! Mirrors the five relations a spreadsheet reader hands over: projects,
//! panelists, panelist×topic expertise, slots, and panelist×slot
//! availability. Numeric cells are `f64` because that is how spreadsheet
//! readers deliver them; integrality and sign are checked by
//! [`crate::validation::normalize`], not here.

use serde::{Deserialize, Serialize};

/// One row of the project table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRow {
    pub project_id: String,
    pub topic: String,
    pub supervisor: String,
    pub required_panelists: f64,
}

/// One row of the panelist table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelistRow {
    pub panelist_id: String,
    pub max_panels: f64,
}

/// One row of the slot table.
///
/// `time` is kept as text (`"09:30-10:00"` or `"10-11"`) and parsed during
/// normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRow {
    pub slot_id: String,
    /// ISO date, `YYYY-MM-DD`.
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub room: Option<String>,
}

/// A 1/0 indicator matrix keyed by row identifier and column header.
///
/// Used for both panelist×topic and panelist×slot relations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorTable {
    /// Column headers (topics or slot identifiers).
    pub columns: Vec<String>,
    /// Rows, one per panelist.
    pub rows: Vec<IndicatorRow>,
}

/// One row of an indicator table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    /// Row key (panelist identifier).
    pub id: String,
    /// Cell values aligned with [`IndicatorTable::columns`].
    pub values: Vec<f64>,
}

impl IndicatorTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with the given headers and no rows.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Sets a cell, adding the row or column if missing.
    ///
    /// New cells are zero-filled.
    pub fn set(&mut self, row_id: &str, column: &str, value: f64) {
        let col = match self.columns.iter().position(|c| c == column) {
            Some(col) => col,
            None => {
                self.columns.push(column.to_string());
                for row in &mut self.rows {
                    row.values.push(0.0);
                }
                self.columns.len() - 1
            }
        };
        let width = self.columns.len();
        let row = match self.rows.iter().position(|r| r.id == row_id) {
            Some(idx) => &mut self.rows[idx],
            None => {
                self.rows.push(IndicatorRow {
                    id: row_id.to_string(),
                    values: vec![0.0; width],
                });
                let last = self.rows.len() - 1;
                &mut self.rows[last]
            }
        };
        if row.values.len() < width {
            row.values.resize(width, 0.0);
        }
        row.values[col] = value;
    }

    /// Adds a row with the given id, zero-filled, if not present.
    pub fn ensure_row(&mut self, row_id: &str) {
        if !self.rows.iter().any(|r| r.id == row_id) {
            self.rows.push(IndicatorRow {
                id: row_id.to_string(),
                values: vec![0.0; self.columns.len()],
            });
        }
    }

    /// Reads a cell. `None` if the row or column is absent.
    pub fn value(&self, row_id: &str, column: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c == column)?;
        let row = self.rows.iter().find(|r| r.id == row_id)?;
        row.values.get(col).copied()
    }

    /// Whether the table has a row for `row_id`.
    pub fn has_row(&self, row_id: &str) -> bool {
        self.rows.iter().any(|r| r.id == row_id)
    }
}

/// The complete raw input of one scheduling run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTables {
    pub projects: Vec<ProjectRow>,
    pub panelists: Vec<PanelistRow>,
    /// Panelist × topic expertise (1 = eligible).
    pub expertise: IndicatorTable,
    pub slots: Vec<SlotRow>,
    /// Panelist × slot availability (1 = can attend).
    pub availability: IndicatorTable,
}

impl RawTables {
    /// Creates empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a project row.
    pub fn with_project(
        mut self,
        project_id: impl Into<String>,
        topic: impl Into<String>,
        supervisor: impl Into<String>,
        required_panelists: u32,
    ) -> Self {
        self.projects.push(ProjectRow {
            project_id: project_id.into(),
            topic: topic.into(),
            supervisor: supervisor.into(),
            required_panelists: f64::from(required_panelists),
        });
        self
    }

    /// Adds a panelist row. Also registers the panelist in both indicator
    /// tables so an expertise-less or availability-less panelist is an
    /// explicit all-zero row.
    pub fn with_panelist(mut self, panelist_id: impl Into<String>, max_panels: u32) -> Self {
        let id = panelist_id.into();
        self.expertise.ensure_row(&id);
        self.availability.ensure_row(&id);
        self.panelists.push(PanelistRow {
            panelist_id: id,
            max_panels: f64::from(max_panels),
        });
        self
    }

    /// Marks `panelist_id` as an expert in each of `topics`.
    pub fn with_expertise(mut self, panelist_id: &str, topics: &[&str]) -> Self {
        for topic in topics {
            self.expertise.set(panelist_id, topic, 1.0);
        }
        self
    }

    /// Adds a slot row without a fixed room.
    pub fn with_slot(
        mut self,
        slot_id: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        let slot_id = slot_id.into();
        if !self.availability.columns.contains(&slot_id) {
            self.availability.columns.push(slot_id.clone());
            for row in &mut self.availability.rows {
                row.values.push(0.0);
            }
        }
        self.slots.push(SlotRow {
            slot_id,
            date: date.into(),
            time: time.into(),
            room: None,
        });
        self
    }

    /// Adds a slot row tied to a fixed room.
    pub fn with_room_slot(
        self,
        slot_id: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
        room: impl Into<String>,
    ) -> Self {
        let mut tables = self.with_slot(slot_id, date, time);
        if let Some(last) = tables.slots.last_mut() {
            last.room = Some(room.into());
        }
        tables
    }

    /// Marks `panelist_id` available in each of `slot_ids`.
    pub fn with_availability(mut self, panelist_id: &str, slot_ids: &[&str]) -> Self {
        for slot in slot_ids {
            self.availability.set(panelist_id, slot, 1.0);
        }
        self
    }

    /// Marks `panelist_id` available in every slot added so far.
    pub fn with_full_availability(mut self, panelist_id: &str) -> Self {
        let slot_ids: Vec<String> = self.slots.iter().map(|s| s.slot_id.clone()).collect();
        for slot in &slot_ids {
            self.availability.set(panelist_id, slot, 1.0);
        }
        self
    }
}
