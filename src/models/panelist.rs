//! Panelist model.

use serde::{Deserialize, Serialize};

/// A faculty member who can sit on defense panels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panelist {
    /// Unique panelist identifier.
    pub id: String,
    /// Maximum number of panels this panelist may join.
    pub max_panels: u32,
}

impl Panelist {
    /// Creates a new panelist.
    pub fn new(id: impl Into<String>, max_panels: u32) -> Self {
        Self {
            id: id.into(),
            max_panels,
        }
    }
}
