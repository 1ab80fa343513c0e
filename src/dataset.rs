//! Normalized, indexed problem data.
//!
//! A [`Dataset`] holds the typed entities of one run and the derived
//! lookups every phase reads: topic → eligible panelists and
//! panelist → available slots. Entities are addressed by their position
//! (`usize`) in the entity vectors; the id maps translate back and forth.
//!
//! A dataset is immutable once built and shared read-only by all phases.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{Panelist, Project, SlotInstant, TimeSlot};
use crate::validation::ValidationReport;

/// Typed entities plus lookups.
#[derive(Debug, Clone)]
pub struct Dataset {
    projects: Vec<Project>,
    panelists: Vec<Panelist>,
    slots: Vec<TimeSlot>,
    project_index: HashMap<String, usize>,
    panelist_index: HashMap<String, usize>,
    slot_index: HashMap<String, usize>,
    /// topic → panelist indices with expertise.
    topic_panelists: BTreeMap<String, BTreeSet<usize>>,
    /// panelist index → slot indices the panelist can attend.
    panelist_slots: Vec<BTreeSet<usize>>,
    warnings: ValidationReport,
}

impl Dataset {
    /// Builds a dataset from typed entities and relation pairs.
    ///
    /// Pairs naming an unknown panelist or slot are ignored; no other
    /// validation happens here. Use [`crate::validation::normalize`] for
    /// raw input.
    pub fn from_entities<'a, E, A>(
        projects: Vec<Project>,
        panelists: Vec<Panelist>,
        slots: Vec<TimeSlot>,
        expertise: E,
        availability: A,
    ) -> Self
    where
        E: IntoIterator<Item = (&'a str, &'a str)>,
        A: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let project_index = index_of(projects.iter().map(|p| p.id.as_str()));
        let panelist_index = index_of(panelists.iter().map(|p| p.id.as_str()));
        let slot_index = index_of(slots.iter().map(|s| s.id.as_str()));

        let mut topic_panelists: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
        for (panelist, topic) in expertise {
            if let Some(&p) = panelist_index.get(panelist) {
                topic_panelists.entry(topic.to_string()).or_default().insert(p);
            }
        }

        let mut panelist_slots = vec![BTreeSet::new(); panelists.len()];
        for (panelist, slot) in availability {
            if let (Some(&p), Some(&s)) = (panelist_index.get(panelist), slot_index.get(slot)) {
                panelist_slots[p].insert(s);
            }
        }

        Self {
            projects,
            panelists,
            slots,
            project_index,
            panelist_index,
            slot_index,
            topic_panelists,
            panelist_slots,
            warnings: ValidationReport::default(),
        }
    }

    pub(crate) fn set_warnings(&mut self, warnings: ValidationReport) {
        self.warnings = warnings;
    }

    /// Non-fatal issues found while normalizing.
    pub fn warnings(&self) -> &ValidationReport {
        &self.warnings
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn panelists(&self) -> &[Panelist] {
        &self.panelists
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn project_idx(&self, id: &str) -> Option<usize> {
        self.project_index.get(id).copied()
    }

    pub fn panelist_idx(&self, id: &str) -> Option<usize> {
        self.panelist_index.get(id).copied()
    }

    pub fn slot_idx(&self, id: &str) -> Option<usize> {
        self.slot_index.get(id).copied()
    }

    /// The `topic_to_eligible_panelists` lookup.
    pub fn topic_to_eligible_panelists(&self) -> &BTreeMap<String, BTreeSet<usize>> {
        &self.topic_panelists
    }

    /// Panelists with expertise in `topic`.
    pub fn eligible_panelists(&self, topic: &str) -> impl Iterator<Item = usize> + '_ {
        self.topic_panelists
            .get(topic)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Whether panelist `p` has expertise in `topic`.
    pub fn has_expertise(&self, p: usize, topic: &str) -> bool {
        self.topic_panelists
            .get(topic)
            .is_some_and(|set| set.contains(&p))
    }

    /// Panelists who may sit on project `j`: topic experts minus the
    /// supervisor.
    pub fn panel_candidates(&self, j: usize) -> Vec<usize> {
        let project = &self.projects[j];
        self.eligible_panelists(&project.topic)
            .filter(|&p| self.panelists[p].id != project.supervisor)
            .collect()
    }

    /// The `panelist_to_available_slots` lookup for one panelist.
    pub fn available_slots(&self, p: usize) -> &BTreeSet<usize> {
        &self.panelist_slots[p]
    }

    /// Whether panelist `p` can attend slot `s`.
    pub fn is_available(&self, p: usize, s: usize) -> bool {
        self.panelist_slots[p].contains(&s)
    }

    /// Slots grouped by instant, chronologically.
    pub fn instants(&self) -> BTreeMap<SlotInstant, Vec<usize>> {
        let mut groups: BTreeMap<SlotInstant, Vec<usize>> = BTreeMap::new();
        for (s, slot) in self.slots.iter().enumerate() {
            groups.entry(slot.instant()).or_default().push(s);
        }
        groups
    }

    /// Distinct project topics, sorted.
    pub fn topics(&self) -> BTreeSet<&str> {
        self.projects.iter().map(|p| p.topic.as_str()).collect()
    }

    /// Project indices with the given topic.
    pub fn projects_with_topic<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.projects
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.topic == topic)
            .map(|(j, _)| j)
    }
}

fn index_of<'a>(ids: impl Iterator<Item = &'a str>) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (i, id) in ids.enumerate() {
        // First occurrence wins; duplicates are rejected by validation.
        map.entry(id.to_string()).or_insert(i);
    }
    map
}
