//! Panel assignment (Phase 1 solution).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Project → panel mapping.
///
/// Panels are stored sorted by panelist id so that equal assignments
/// compare and serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelAssignment {
    /// Panel members per project id.
    pub panels: BTreeMap<String, Vec<String>>,
}

impl PanelAssignment {
    /// Creates an empty assignment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the panel of a project.
    pub fn set_panel<I, S>(&mut self, project_id: impl Into<String>, panelists: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut panel: Vec<String> = panelists.into_iter().map(Into::into).collect();
        panel.sort();
        panel.dedup();
        self.panels.insert(project_id.into(), panel);
    }

    /// Builder form of [`PanelAssignment::set_panel`].
    pub fn with_panel(mut self, project_id: &str, panelists: &[&str]) -> Self {
        self.set_panel(project_id, panelists.iter().copied());
        self
    }

    /// Panel of a project (empty if unassigned).
    pub fn panel(&self, project_id: &str) -> &[String] {
        self.panels
            .get(project_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of panels a panelist sits on.
    pub fn load(&self, panelist_id: &str) -> usize {
        self.panels
            .values()
            .filter(|panel| panel.iter().any(|p| p == panelist_id))
            .count()
    }

    /// Panel count for every panelist with at least one panel.
    pub fn loads(&self) -> BTreeMap<&str, usize> {
        let mut loads = BTreeMap::new();
        for panel in self.panels.values() {
            for p in panel {
                *loads.entry(p.as_str()).or_insert(0) += 1;
            }
        }
        loads
    }

    /// Projects a panelist sits on, in project id order.
    pub fn projects_of(&self, panelist_id: &str) -> Vec<&str> {
        self.panels
            .iter()
            .filter(|(_, panel)| panel.iter().any(|p| p == panelist_id))
            .map(|(project, _)| project.as_str())
            .collect()
    }

    /// Whether two projects share at least one panelist.
    pub fn shares_panelist(&self, a: &str, b: &str) -> bool {
        let pb = self.panel(b);
        self.panel(a).iter().any(|p| pb.contains(p))
    }

    /// Total panel seats filled.
    pub fn seat_count(&self) -> usize {
        self.panels.values().map(Vec::len).sum()
    }

    /// Number of projects with a panel.
    pub fn project_count(&self) -> usize {
        self.panels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PanelAssignment {
        PanelAssignment::new()
            .with_panel("P01", &["Prof_C", "Prof_E"])
            .with_panel("P02", &["Prof_F", "Prof_C"])
            .with_panel("P03", &["Prof_A", "Prof_E"])
    }

    #[test]
    fn test_panel_sorted() {
        let a = sample();
        assert_eq!(a.panel("P02"), &["Prof_C".to_string(), "Prof_F".to_string()]);
        assert!(a.panel("P99").is_empty());
    }

    #[test]
    fn test_loads() {
        let a = sample();
        assert_eq!(a.load("Prof_C"), 2);
        assert_eq!(a.load("Prof_Z"), 0);
        let loads = a.loads();
        assert_eq!(loads["Prof_E"], 2);
        assert_eq!(loads["Prof_A"], 1);
        assert_eq!(a.seat_count(), 6);
        assert_eq!(a.project_count(), 3);
    }

    #[test]
    fn test_projects_of_and_sharing() {
        let a = sample();
        assert_eq!(a.projects_of("Prof_E"), vec!["P01", "P03"]);
        assert!(a.shares_panelist("P01", "P02"));
        assert!(!a.shares_panelist("P02", "P03"));
    }
}
