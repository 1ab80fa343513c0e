//! Project (defense) model.
//!
//! A project is one capstone defense. It needs a panel of
//! `required_panelists` experts in its topic, never including its own
//! supervisor.

use serde::{Deserialize, Serialize};

/// A capstone project awaiting its defense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project identifier.
    pub id: String,
    /// Topic (category label) used for expertise matching.
    pub topic: String,
    /// Supervising panelist. Never sits on this project's panel.
    pub supervisor: String,
    /// Panel size (typically 2 or 3).
    pub required_panelists: u32,
}

impl Project {
    /// Creates a new project.
    pub fn new(
        id: impl Into<String>,
        topic: impl Into<String>,
        supervisor: impl Into<String>,
        required_panelists: u32,
    ) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            supervisor: supervisor.into(),
            required_panelists,
        }
    }

    /// Whether `panelist_id` supervises this project.
    #[inline]
    pub fn is_supervised_by(&self, panelist_id: &str) -> bool {
        self.supervisor == panelist_id
    }
}
