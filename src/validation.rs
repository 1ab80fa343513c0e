//! Input normalization and validation.
//!
//! Turns [`RawTables`] into a [`Dataset`]. Every check runs; problems are
//! collected into a [`ValidationReport`] instead of stopping at the first
//! one. Detects:
//! - Duplicate IDs (projects, panelists, slots, indicator rows/columns)
//! - Unknown cross-table references (supervisors, indicator rows, slot columns)
//! - Invalid capacities and panel sizes (negative, non-integer)
//! - Indicator cells other than 0/1, ragged indicator rows
//! - Unparseable dates and time ranges
//! - Fixed rooms booked twice at overlapping times
//! - Topics with no eligible panelist, and panels larger than the
//!   eligible pool once the supervisor is excluded
//!
//! Any `Error`-severity issue fails normalization. Warnings travel with
//! the dataset.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dataset::Dataset;
use crate::models::{IndicatorTable, Panelist, Project, RawTables, TimeRange, TimeSlot};

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Categories of validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Two rows or columns share the same ID.
    DuplicateId,
    /// A table references an ID no other table defines.
    UnknownReference,
    /// Capacity or panel size is negative, fractional, or not finite.
    InvalidNumber,
    /// Indicator cell is not 0 or 1.
    InvalidIndicator,
    /// Indicator row width differs from its header.
    MalformedTable,
    /// Date is not `YYYY-MM-DD`.
    InvalidDate,
    /// Time range is unparseable or does not end after it starts.
    InvalidTimeRange,
    /// Same fixed room on two overlapping slots.
    RoomClash,
    /// No panelist has expertise in a project's topic.
    NoEligiblePanelist,
    /// Fewer eligible non-supervisor panelists than the panel size.
    InsufficientPanelists,
    /// Panelist has no row in an indicator table.
    MissingRow,
    /// Indicator column that nothing uses.
    UnusedColumn,
    /// Slots of different lengths in one dataset.
    MixedSlotDurations,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.severity, self.message)
    }
}

/// All issues found in one normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn push(&mut self, severity: Severity, kind: IssueKind, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity,
            kind,
            message: message.into(),
        });
    }

    fn error(&mut self, kind: IssueKind, message: impl Into<String>) {
        self.push(Severity::Error, kind, message);
    }

    fn warning(&mut self, kind: IssueKind, message: impl Into<String>) {
        self.push(Severity::Warning, kind, message);
    }

    fn info(&mut self, kind: IssueKind, message: impl Into<String>) {
        self.push(Severity::Info, kind, message);
    }

    /// Whether any issue is an error.
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Number of error-severity issues.
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Error-severity issues.
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    /// Whether any issue has the given kind.
    pub fn contains(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Validates raw tables and builds the indexed dataset.
///
/// # Returns
/// `Ok(dataset)` with warnings attached if no error was found,
/// `Err(report)` with every detected issue otherwise.
pub fn normalize(tables: &RawTables) -> Result<Dataset, ValidationReport> {
    let mut report = ValidationReport::default();

    let panelists = parse_panelists(tables, &mut report);
    let panelist_ids: HashSet<&str> = tables
        .panelists
        .iter()
        .map(|r| r.panelist_id.as_str())
        .collect();
    let projects = parse_projects(tables, &panelist_ids, &mut report);
    let slots = parse_slots(tables, &mut report);
    let slot_ids: HashSet<&str> = tables.slots.iter().map(|r| r.slot_id.as_str()).collect();

    let expertise = parse_indicator(
        &tables.expertise,
        "expertise",
        &panelist_ids,
        None,
        &mut report,
    );
    let availability = parse_indicator(
        &tables.availability,
        "availability",
        &panelist_ids,
        Some(&slot_ids),
        &mut report,
    );

    let used_topics: HashSet<&str> = tables.projects.iter().map(|p| p.topic.as_str()).collect();
    for column in &tables.expertise.columns {
        if !used_topics.contains(column.as_str()) {
            report.info(
                IssueKind::UnusedColumn,
                format!("Expertise topic '{column}' is not used by any project"),
            );
        }
    }

    check_room_clashes(&slots, &mut report);
    check_slot_durations(&slots, &mut report);

    if report.has_errors() {
        warn!(errors = report.error_count(), "input rejected");
        return Err(report);
    }

    let mut dataset = Dataset::from_entities(
        projects,
        panelists,
        slots,
        expertise.iter().map(|(p, t)| (p.as_str(), t.as_str())),
        availability.iter().map(|(p, s)| (p.as_str(), s.as_str())),
    );

    check_eligibility(&dataset, &mut report);

    if report.has_errors() {
        warn!(errors = report.error_count(), "input rejected");
        return Err(report);
    }

    debug!(
        projects = dataset.projects().len(),
        panelists = dataset.panelists().len(),
        slots = dataset.slots().len(),
        warnings = report.issues.len(),
        "input normalized"
    );
    dataset.set_warnings(report);
    Ok(dataset)
}

fn parse_count(value: f64) -> Option<u32> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX) {
        Some(value as u32)
    } else {
        None
    }
}

fn parse_panelists(tables: &RawTables, report: &mut ValidationReport) -> Vec<Panelist> {
    let mut seen = HashSet::new();
    let mut panelists = Vec::new();
    for row in &tables.panelists {
        if !seen.insert(row.panelist_id.as_str()) {
            report.error(
                IssueKind::DuplicateId,
                format!("Duplicate panelist ID: {}", row.panelist_id),
            );
            continue;
        }
        match parse_count(row.max_panels) {
            Some(max_panels) => panelists.push(Panelist::new(&row.panelist_id, max_panels)),
            None => report.error(
                IssueKind::InvalidNumber,
                format!(
                    "Panelist '{}' has invalid max_panels {} (expected a non-negative integer)",
                    row.panelist_id, row.max_panels
                ),
            ),
        }
    }
    panelists
}

fn parse_projects(
    tables: &RawTables,
    panelist_ids: &HashSet<&str>,
    report: &mut ValidationReport,
) -> Vec<Project> {
    let mut seen = HashSet::new();
    let mut projects = Vec::new();
    for row in &tables.projects {
        if !seen.insert(row.project_id.as_str()) {
            report.error(
                IssueKind::DuplicateId,
                format!("Duplicate project ID: {}", row.project_id),
            );
            continue;
        }
        if !panelist_ids.contains(row.supervisor.as_str()) {
            report.error(
                IssueKind::UnknownReference,
                format!(
                    "Project '{}' references unknown supervisor '{}'",
                    row.project_id, row.supervisor
                ),
            );
        }
        match parse_count(row.required_panelists).filter(|&n| n > 0) {
            Some(required) => projects.push(Project::new(
                &row.project_id,
                &row.topic,
                &row.supervisor,
                required,
            )),
            None => report.error(
                IssueKind::InvalidNumber,
                format!(
                    "Project '{}' has invalid required_panelists {} (expected a positive integer)",
                    row.project_id, row.required_panelists
                ),
            ),
        }
    }
    projects
}

fn parse_slots(tables: &RawTables, report: &mut ValidationReport) -> Vec<TimeSlot> {
    let mut seen = HashSet::new();
    let mut slots = Vec::new();
    for row in &tables.slots {
        if !seen.insert(row.slot_id.as_str()) {
            report.error(
                IssueKind::DuplicateId,
                format!("Duplicate slot ID: {}", row.slot_id),
            );
            continue;
        }
        let date = match NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                report.error(
                    IssueKind::InvalidDate,
                    format!("Slot '{}' has invalid date '{}'", row.slot_id, row.date),
                );
                None
            }
        };
        let range = match TimeRange::parse(&row.time) {
            Some(range) if range.is_well_formed() => Some(range),
            Some(_) => {
                report.error(
                    IssueKind::InvalidTimeRange,
                    format!("Slot '{}' time '{}' does not end after it starts", row.slot_id, row.time),
                );
                None
            }
            None => {
                report.error(
                    IssueKind::InvalidTimeRange,
                    format!("Slot '{}' has unparseable time '{}'", row.slot_id, row.time),
                );
                None
            }
        };
        if let (Some(date), Some(range)) = (date, range) {
            let mut slot = TimeSlot::new(&row.slot_id, date, range);
            slot.room = row
                .room
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string);
            slots.push(slot);
        }
    }
    slots
}

/// Validates an indicator table and returns its set (row, column) pairs.
fn parse_indicator(
    table: &IndicatorTable,
    name: &str,
    panelist_ids: &HashSet<&str>,
    known_columns: Option<&HashSet<&str>>,
    report: &mut ValidationReport,
) -> Vec<(String, String)> {
    let mut seen_columns = HashSet::new();
    for column in &table.columns {
        if !seen_columns.insert(column.as_str()) {
            report.error(
                IssueKind::DuplicateId,
                format!("Duplicate {name} column: {column}"),
            );
        }
        if let Some(known) = known_columns {
            if !known.contains(column.as_str()) {
                report.error(
                    IssueKind::UnknownReference,
                    format!("{name} column '{column}' is not a known slot"),
                );
            }
        }
    }

    let mut pairs = Vec::new();
    let mut seen_rows = HashSet::new();
    for row in &table.rows {
        if !seen_rows.insert(row.id.as_str()) {
            report.error(
                IssueKind::DuplicateId,
                format!("Duplicate {name} row: {}", row.id),
            );
            continue;
        }
        if !panelist_ids.contains(row.id.as_str()) {
            report.error(
                IssueKind::UnknownReference,
                format!("{name} row '{}' is not a known panelist", row.id),
            );
            continue;
        }
        if row.values.len() != table.columns.len() {
            report.error(
                IssueKind::MalformedTable,
                format!(
                    "{name} row '{}' has {} cells, header has {}",
                    row.id,
                    row.values.len(),
                    table.columns.len()
                ),
            );
            continue;
        }
        for (column, &value) in table.columns.iter().zip(&row.values) {
            if value == 1.0 {
                pairs.push((row.id.clone(), column.clone()));
            } else if value != 0.0 {
                report.error(
                    IssueKind::InvalidIndicator,
                    format!("{name} cell ({}, {column}) is {value}, expected 0 or 1", row.id),
                );
            }
        }
    }

    let mut missing: BTreeSet<&str> = panelist_ids.iter().copied().collect();
    for row in &table.rows {
        missing.remove(row.id.as_str());
    }
    for id in missing {
        report.warning(
            IssueKind::MissingRow,
            format!("Panelist '{id}' has no {name} row; treated as all zeros"),
        );
    }

    pairs
}

fn check_room_clashes(slots: &[TimeSlot], report: &mut ValidationReport) {
    let mut by_room: HashMap<&str, Vec<&TimeSlot>> = HashMap::new();
    for slot in slots {
        if let Some(room) = slot.room.as_deref() {
            by_room.entry(room).or_default().push(slot);
        }
    }
    let mut rooms: Vec<_> = by_room.into_iter().collect();
    rooms.sort_by_key(|(room, _)| *room);
    for (room, list) in rooms {
        for (i, a) in list.iter().enumerate() {
            for b in &list[i + 1..] {
                if a.instant().overlaps(&b.instant()) {
                    report.error(
                        IssueKind::RoomClash,
                        format!(
                            "Slots '{}' and '{}' overlap in fixed room '{room}'",
                            a.id, b.id
                        ),
                    );
                }
            }
        }
    }
}

fn check_slot_durations(slots: &[TimeSlot], report: &mut ValidationReport) {
    let durations: BTreeSet<i64> = slots.iter().map(TimeSlot::duration_minutes).collect();
    if durations.len() > 1 {
        let listed: Vec<String> = durations.iter().map(|d| format!("{d}min")).collect();
        report.warning(
            IssueKind::MixedSlotDurations,
            format!(
                "Slots have mixed durations ({}); the anti-fatigue threshold is applied per slot pair",
                listed.join(", ")
            ),
        );
    }
}

fn check_eligibility(dataset: &Dataset, report: &mut ValidationReport) {
    for (j, project) in dataset.projects().iter().enumerate() {
        let eligible = dataset.eligible_panelists(&project.topic).count();
        if eligible == 0 {
            report.error(
                IssueKind::NoEligiblePanelist,
                format!(
                    "Project '{}': no panelist has expertise in topic '{}'",
                    project.id, project.topic
                ),
            );
            continue;
        }
        let candidates = dataset.panel_candidates(j).len();
        if candidates < project.required_panelists as usize {
            report.error(
                IssueKind::InsufficientPanelists,
                format!(
                    "Project '{}' needs {} panelists but only {} eligible (supervisor '{}' excluded)",
                    project.id, project.required_panelists, candidates, project.supervisor
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_tables() -> RawTables {
        RawTables::new()
            .with_slot("S01", "2026-06-12", "10-11")
            .with_slot("S02", "2026-06-12", "11-12")
            .with_project("P01", "NLP", "Prof_A", 2)
            .with_project("P02", "Finance", "Prof_B", 1)
            .with_panelist("Prof_A", 3)
            .with_panelist("Prof_B", 3)
            .with_panelist("Prof_C", 2)
            .with_panelist("Prof_D", 2)
            .with_expertise("Prof_A", &["NLP"])
            .with_expertise("Prof_C", &["NLP", "Finance"])
            .with_expertise("Prof_D", &["NLP"])
            .with_full_availability("Prof_A")
            .with_full_availability("Prof_C")
            .with_availability("Prof_D", &["S02"])
    }

    #[test]
    fn test_valid_input() {
        let ds = normalize(&valid_tables()).unwrap();
        assert_eq!(ds.projects().len(), 2);
        assert_eq!(ds.panelists().len(), 4);
        assert_eq!(ds.slots().len(), 2);
        assert_eq!(ds.panel_candidates(0).len(), 2); // C, D
        assert!(!ds.warnings().has_errors());
    }

    #[test]
    fn test_duplicate_ids() {
        let mut raw = valid_tables()
            .with_project("P01", "NLP", "Prof_A", 1)
            .with_panelist("Prof_C", 1);
        raw.slots.push(raw.slots[0].clone());

        let report = normalize(&raw).unwrap_err();
        let dupes: Vec<_> = report
            .errors()
            .filter(|e| e.kind == IssueKind::DuplicateId)
            .collect();
        assert!(dupes.iter().any(|e| e.message.contains("project")));
        assert!(dupes.iter().any(|e| e.message.contains("panelist")));
        assert!(dupes.iter().any(|e| e.message.contains("slot")));
    }

    #[test]
    fn test_invalid_numbers() {
        let mut raw = valid_tables();
        raw.panelists[0].max_panels = -1.0;
        raw.panelists[1].max_panels = 2.5;
        raw.projects[0].required_panelists = 0.0;

        let report = normalize(&raw).unwrap_err();
        assert_eq!(
            report
                .errors()
                .filter(|e| e.kind == IssueKind::InvalidNumber)
                .count(),
            3
        );
    }

    #[test]
    fn test_unknown_references() {
        let mut raw = valid_tables().with_project("P03", "NLP", "Prof_X", 1);
        raw.availability.columns.push("S99".into());
        for row in &mut raw.availability.rows {
            row.values.push(0.0);
        }
        raw.expertise.set("Ghost", "NLP", 1.0);

        let report = normalize(&raw).unwrap_err();
        let unknown: Vec<_> = report
            .errors()
            .filter(|e| e.kind == IssueKind::UnknownReference)
            .collect();
        assert!(unknown.iter().any(|e| e.message.contains("Prof_X")));
        assert!(unknown.iter().any(|e| e.message.contains("S99")));
        assert!(unknown.iter().any(|e| e.message.contains("Ghost")));
    }

    #[test]
    fn test_bad_indicator_cells() {
        let mut raw = valid_tables();
        raw.expertise.set("Prof_D", "Finance", 0.5);
        raw.availability.rows[0].values.pop();

        let report = normalize(&raw).unwrap_err();
        assert!(report.contains(IssueKind::InvalidIndicator));
        assert!(report.contains(IssueKind::MalformedTable));
    }

    #[test]
    fn test_bad_dates_and_times() {
        let raw = valid_tables()
            .with_slot("S03", "12/06/2026", "10-11")
            .with_slot("S04", "2026-06-12", "noon")
            .with_slot("S05", "2026-06-12", "12:00-11:00");

        let report = normalize(&raw).unwrap_err();
        assert_eq!(
            report
                .errors()
                .filter(|e| e.kind == IssueKind::InvalidDate)
                .count(),
            1
        );
        assert_eq!(
            report
                .errors()
                .filter(|e| e.kind == IssueKind::InvalidTimeRange)
                .count(),
            2
        );
    }

    #[test]
    fn test_no_eligible_panelist() {
        let raw = valid_tables().with_project("P03", "Robotics", "Prof_A", 1);
        let report = normalize(&raw).unwrap_err();
        assert!(report
            .errors()
            .any(|e| e.kind == IssueKind::NoEligiblePanelist && e.message.contains("Robotics")));
    }

    #[test]
    fn test_supervisor_exclusion_shortfall() {
        // Only Prof_C knows Finance; a Finance project supervised by Prof_C has no one left.
        let raw = valid_tables().with_project("P03", "Finance", "Prof_C", 1);
        let report = normalize(&raw).unwrap_err();
        assert!(report
            .errors()
            .any(|e| e.kind == IssueKind::InsufficientPanelists && e.message.contains("P03")));
    }

    #[test]
    fn test_room_clash() {
        let raw = valid_tables()
            .with_room_slot("S10", "2026-06-13", "10:00-11:00", "R1")
            .with_room_slot("S11", "2026-06-13", "10:30-11:30", "R1")
            .with_room_slot("S12", "2026-06-13", "11:00-12:00", "R1");
        let report = normalize(&raw).unwrap_err();
        let clashes: Vec<_> = report
            .errors()
            .filter(|e| e.kind == IssueKind::RoomClash)
            .collect();
        assert_eq!(clashes.len(), 2); // S10/S11 and S11/S12
    }

    #[test]
    fn test_warnings_are_not_fatal() {
        let mut raw = valid_tables()
            .with_slot("S03", "2026-06-13", "09:30-10:00")
            .with_expertise("Prof_A", &["Quantum"]);
        raw.availability.rows.retain(|r| r.id != "Prof_B");

        let ds = normalize(&raw).unwrap();
        let w = ds.warnings();
        assert!(w.contains(IssueKind::MissingRow));
        assert!(w.contains(IssueKind::MixedSlotDurations));
        assert!(w.contains(IssueKind::UnusedColumn));
        assert!(!w.has_errors());
    }

    #[test]
    fn test_multiple_errors_collected() {
        let mut raw = valid_tables().with_project("P03", "Robotics", "Nobody", 1);
        raw.panelists[2].max_panels = f64::NAN;
        let report = normalize(&raw).unwrap_err();
        assert!(report.error_count() >= 2);
    }
}
