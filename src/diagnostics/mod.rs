//! Infeasibility attribution.
//!
//! When a phase fails, the solver only says "no". The [`Diagnostician`]
//! runs cheap necessary-condition checks over the normalized data and
//! reports every one that fails, so the user learns which topic, project,
//! panelist or slot supply is short.
//!
//! Checks:
//! - topic shortfall: fewer eligible non-supervisors than a panel needs
//! - topic capacity deficit: experts' combined `max_panels` below the
//!   seats the topic's projects need
//! - global capacity deficit: all panelists' `max_panels` below all seats
//! - no common slot: a project has no slot its panel can jointly attend
//! - slot deficit: a maximum matching of projects to usable slots leaves
//!   projects unplaced
//! - panelist overbooked (Phase 2): more panels than distinct instants
//!   the panelist is available for
//!
//! Every check is a necessary condition, so a finding is a proof of
//! infeasibility. Conversely an empty finding list does not prove
//! feasibility; it is reported as [`DiagnosticKind::Unattributed`].

mod matching;

pub use matching::{max_matching, max_matching_with};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::dataset::Dataset;
use crate::models::PanelAssignment;
use crate::phase::{Phase, PhaseFailure};

/// Categories of findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    TopicShortfall,
    TopicCapacityDeficit,
    GlobalCapacityDeficit,
    NoCommonSlot,
    SlotDeficit,
    PanelistOverbooked,
    /// The solver ran out of time; the model may still be feasible.
    Inconclusive,
    /// No check explains the failure.
    Unattributed,
}

/// One attributed cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub phase: Phase,
    /// Topic, project or panelist the finding is about.
    pub subject: String,
    /// Size of the gap (seats, slots, or instants), 0 if not quantifiable.
    pub deficit: u32,
    /// Panelists involved, sorted.
    pub panelists: Vec<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.phase, self.message)
    }
}

/// Aggregate figures reported alongside the findings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticContext {
    /// Eligible panelists per project topic.
    pub eligible_by_topic: BTreeMap<String, usize>,
    /// `max_panels` minus current load per panelist.
    pub remaining_capacity: BTreeMap<String, i64>,
    /// Projects per unit of slot capacity.
    pub slot_utilization: f64,
    /// Fraction of (panelist, slot) pairs marked available.
    pub availability_density: f64,
    /// Usable slots per project.
    pub usable_slots: BTreeMap<String, usize>,
}

/// Findings for one failed phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub phase: Phase,
    pub findings: Vec<Diagnostic>,
    pub context: DiagnosticContext,
}

impl Diagnosis {
    /// Whether any finding has the given kind.
    pub fn has(&self, kind: DiagnosticKind) -> bool {
        self.findings.iter().any(|d| d.kind == kind)
    }

    /// Findings of the given kind.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.findings.iter().filter(move |d| d.kind == kind)
    }
}

/// Runs the checks against one dataset.
pub struct Diagnostician<'a> {
    dataset: &'a Dataset,
    slot_capacity: u32,
    max_parallel: Option<u32>,
}

impl<'a> Diagnostician<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            slot_capacity: 1,
            max_parallel: None,
        }
    }

    /// Sets how many projects one slot can host.
    pub fn with_slot_capacity(mut self, capacity: u32) -> Self {
        self.slot_capacity = capacity;
        self
    }

    /// Caps how many defenses one instant can host (rooms available).
    pub fn with_max_parallel_defenses(mut self, rooms: u32) -> Self {
        self.max_parallel = Some(rooms);
        self
    }

    /// Projects slot `s` can host. Fixed-room slots host one.
    fn capacity_of(&self, s: usize) -> usize {
        match self.dataset.slots()[s].room {
            Some(_) => self.slot_capacity.min(1) as usize,
            None => self.slot_capacity as usize,
        }
    }

    /// Attributes a phase failure.
    ///
    /// `assignment` is the Phase 1 result when Phase 2 failed. Slot checks
    /// use it to know exactly who must meet; without it they fall back to
    /// "enough eligible panelists available".
    pub fn diagnose(&self, failure: PhaseFailure, assignment: Option<&PanelAssignment>) -> Diagnosis {
        let phase = failure.phase();
        let mut findings = Vec::new();

        self.check_topic_shortfall(phase, &mut findings);
        self.check_topic_capacity(phase, &mut findings);
        self.check_global_capacity(phase, &mut findings);
        let usable = self.usable_slots(assignment);
        self.check_common_slots(phase, assignment, &usable, &mut findings);
        self.check_slot_supply(phase, &usable, &mut findings);
        if let Some(assignment) = assignment {
            self.check_overbooked(phase, assignment, &mut findings);
        }

        if let PhaseFailure::Timeout { .. } = failure {
            findings.push(Diagnostic {
                kind: DiagnosticKind::Inconclusive,
                phase,
                subject: phase.to_string(),
                deficit: 0,
                panelists: Vec::new(),
                message: format!("The {phase} solver ran out of time before proving (in)feasibility"),
            });
        }
        if findings.is_empty() {
            findings.push(Diagnostic {
                kind: DiagnosticKind::Unattributed,
                phase,
                subject: phase.to_string(),
                deficit: 0,
                panelists: Vec::new(),
                message: format!(
                    "No single-cause check explains the {phase} failure; the conflict involves several constraints jointly"
                ),
            });
        }

        info!(%phase, findings = findings.len(), "diagnosis complete");
        Diagnosis {
            phase,
            findings,
            context: self.context(assignment, &usable),
        }
    }

    fn ids(&self, panelists: impl IntoIterator<Item = usize>) -> Vec<String> {
        let mut ids: Vec<String> = panelists
            .into_iter()
            .map(|p| self.dataset.panelists()[p].id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn check_topic_shortfall(&self, phase: Phase, out: &mut Vec<Diagnostic>) {
        let ds = self.dataset;
        for (j, project) in ds.projects().iter().enumerate() {
            let candidates = ds.panel_candidates(j);
            let have = candidates.len() as u32;
            if have < project.required_panelists {
                out.push(Diagnostic {
                    kind: DiagnosticKind::TopicShortfall,
                    phase,
                    subject: project.topic.clone(),
                    deficit: project.required_panelists - have,
                    panelists: self.ids(candidates),
                    message: format!(
                        "Project '{}' (topic '{}') needs {} panelists but only {} eligible non-supervisors exist",
                        project.id, project.topic, project.required_panelists, have
                    ),
                });
            }
        }
    }

    fn check_topic_capacity(&self, phase: Phase, out: &mut Vec<Diagnostic>) {
        let ds = self.dataset;
        for topic in ds.topics() {
            let experts: Vec<usize> = ds.eligible_panelists(topic).collect();
            let supply: u64 = experts
                .iter()
                .map(|&p| u64::from(ds.panelists()[p].max_panels))
                .sum();
            let demand: u64 = ds
                .projects_with_topic(topic)
                .map(|j| u64::from(ds.projects()[j].required_panelists))
                .sum();
            if supply < demand {
                out.push(Diagnostic {
                    kind: DiagnosticKind::TopicCapacityDeficit,
                    phase,
                    subject: topic.to_string(),
                    deficit: saturate(demand - supply),
                    panelists: self.ids(experts),
                    message: format!(
                        "Topic '{topic}' needs {demand} panel seats but its experts offer {supply}"
                    ),
                });
            }
        }
    }

    fn check_global_capacity(&self, phase: Phase, out: &mut Vec<Diagnostic>) {
        let ds = self.dataset;
        let supply: u64 = ds.panelists().iter().map(|p| u64::from(p.max_panels)).sum();
        let demand: u64 = ds
            .projects()
            .iter()
            .map(|p| u64::from(p.required_panelists))
            .sum();
        if supply < demand {
            out.push(Diagnostic {
                kind: DiagnosticKind::GlobalCapacityDeficit,
                phase,
                subject: "all panelists".to_string(),
                deficit: saturate(demand - supply),
                panelists: Vec::new(),
                message: format!("Projects need {demand} panel seats but panelists offer {supply}"),
            });
        }
    }

    /// Panelists who must (Phase 2) or may (Phase 1) sit on project `j`.
    fn group(&self, j: usize, assignment: Option<&PanelAssignment>) -> Option<Vec<usize>> {
        match assignment {
            Some(a) => a
                .panel(&self.dataset.projects()[j].id)
                .iter()
                .map(|id| self.dataset.panelist_idx(id))
                .collect(),
            None => Some(self.dataset.panel_candidates(j)),
        }
    }

    /// Slots each project could use, by the phase's notion of "usable".
    fn usable_slots(&self, assignment: Option<&PanelAssignment>) -> Vec<Vec<usize>> {
        let ds = self.dataset;
        (0..ds.projects().len())
            .map(|j| {
                let Some(group) = self.group(j, assignment) else {
                    return Vec::new();
                };
                let needed = match assignment {
                    Some(_) => group.len(),
                    None => ds.projects()[j].required_panelists as usize,
                };
                (0..ds.slots().len())
                    .filter(|&s| group.iter().filter(|&&p| ds.is_available(p, s)).count() >= needed)
                    .collect()
            })
            .collect()
    }

    fn check_common_slots(
        &self,
        phase: Phase,
        assignment: Option<&PanelAssignment>,
        usable: &[Vec<usize>],
        out: &mut Vec<Diagnostic>,
    ) {
        let ds = self.dataset;
        for (j, project) in ds.projects().iter().enumerate() {
            if !usable[j].is_empty() {
                continue;
            }
            let group = self.group(j, assignment).unwrap_or_default();
            if assignment.is_none() && group.len() < project.required_panelists as usize {
                // Already a topic shortfall.
                continue;
            }
            let sparsest = group
                .iter()
                .map(|&p| ds.available_slots(p).len())
                .min()
                .unwrap_or(0);
            let culprits = group
                .iter()
                .copied()
                .filter(|&p| ds.available_slots(p).len() == sparsest);
            let who = match assignment {
                Some(_) => "its panel",
                None => "enough eligible panelists",
            };
            out.push(Diagnostic {
                kind: DiagnosticKind::NoCommonSlot,
                phase,
                subject: project.id.clone(),
                deficit: 1,
                panelists: self.ids(culprits),
                message: format!(
                    "Project '{}' has no slot where {who} are available together (sparsest availability: {sparsest} slot(s))",
                    project.id
                ),
            });
        }
    }

    /// Matches placeable projects into slots, and into instants when the
    /// parallel cap is set. Both are necessary conditions; the larger
    /// shortfall is reported.
    fn check_slot_supply(&self, phase: Phase, usable: &[Vec<usize>], out: &mut Vec<Diagnostic>) {
        let ds = self.dataset;
        let placeable: Vec<Vec<usize>> = usable.iter().filter(|s| !s.is_empty()).cloned().collect();
        let capacities: Vec<usize> = (0..ds.slots().len()).map(|s| self.capacity_of(s)).collect();
        let by_slot = max_matching_with(&placeable, &capacities);

        let mut matched = by_slot;
        let mut limit = format!("slot capacity {}", self.slot_capacity);
        if let Some(rooms) = self.max_parallel {
            let instants = ds.instants();
            let mut instant_of = vec![0; ds.slots().len()];
            let instant_caps: Vec<usize> = instants
                .values()
                .enumerate()
                .map(|(i, members)| {
                    for &s in members {
                        instant_of[s] = i;
                    }
                    members
                        .iter()
                        .map(|&s| capacities[s])
                        .sum::<usize>()
                        .min(rooms as usize)
                })
                .collect();
            let by_instant: Vec<Vec<usize>> = placeable
                .iter()
                .map(|slots| {
                    slots
                        .iter()
                        .map(|&s| instant_of[s])
                        .collect::<BTreeSet<_>>()
                        .into_iter()
                        .collect()
                })
                .collect();
            let parallel = max_matching_with(&by_instant, &instant_caps);
            if parallel < matched {
                matched = parallel;
                limit = format!("at most {rooms} parallel defense(s)");
            }
        }

        if matched < placeable.len() {
            let supply: BTreeSet<usize> = placeable.iter().flatten().copied().collect();
            out.push(Diagnostic {
                kind: DiagnosticKind::SlotDeficit,
                phase,
                subject: "slots".to_string(),
                deficit: saturate((placeable.len() - matched) as u64),
                panelists: Vec::new(),
                message: format!(
                    "Only {matched} of {} projects fit into usable slots ({} usable slot(s), {limit})",
                    placeable.len(),
                    supply.len(),
                ),
            });
        }
    }

    fn check_overbooked(&self, phase: Phase, assignment: &PanelAssignment, out: &mut Vec<Diagnostic>) {
        let ds = self.dataset;
        for (p, panelist) in ds.panelists().iter().enumerate() {
            let load = assignment.load(&panelist.id);
            let instants: BTreeSet<_> = ds
                .available_slots(p)
                .iter()
                .map(|&s| ds.slots()[s].instant())
                .collect();
            if load > instants.len() {
                out.push(Diagnostic {
                    kind: DiagnosticKind::PanelistOverbooked,
                    phase,
                    subject: panelist.id.clone(),
                    deficit: saturate((load - instants.len()) as u64),
                    panelists: vec![panelist.id.clone()],
                    message: format!(
                        "Panelist '{}' sits on {load} panels but is available at only {} distinct time(s)",
                        panelist.id,
                        instants.len()
                    ),
                });
            }
        }
    }

    fn context(&self, assignment: Option<&PanelAssignment>, usable: &[Vec<usize>]) -> DiagnosticContext {
        let ds = self.dataset;
        let eligible_by_topic = ds
            .topics()
            .into_iter()
            .map(|t| (t.to_string(), ds.eligible_panelists(t).count()))
            .collect();
        let remaining_capacity = ds
            .panelists()
            .iter()
            .map(|p| {
                let load = assignment.map_or(0, |a| a.load(&p.id)) as i64;
                (p.id.clone(), i64::from(p.max_panels) - load)
            })
            .collect();

        let slot_supply = (0..ds.slots().len()).map(|s| self.capacity_of(s)).sum::<usize>() as f64;
        let pairs = ds.panelists().len() * ds.slots().len();
        let available: usize = (0..ds.panelists().len())
            .map(|p| ds.available_slots(p).len())
            .sum();

        DiagnosticContext {
            eligible_by_topic,
            remaining_capacity,
            slot_utilization: ratio(ds.projects().len() as f64, slot_supply),
            availability_density: ratio(available as f64, pairs as f64),
            usable_slots: ds
                .projects()
                .iter()
                .zip(usable)
                .map(|(p, slots)| (p.id.clone(), slots.len()))
                .collect(),
        }
    }
}

fn saturate(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}
