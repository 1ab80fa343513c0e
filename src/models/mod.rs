//! Defense scheduling domain models.
//!
//! Provides the core data types for representing a capstone defense
//! problem (projects, panelists, slots) and its solution (panel
//! assignment, slot schedule, room plan).
//!
//! # Domain Mappings
//!
//! | u-defense | Generic scheduling | Conference | Clinic |
//! |-----------|--------------------|------------|--------|
//! | Project | Task | Talk | Appointment |
//! | Panelist | Resource (human) | Reviewer | Doctor |
//! | TimeSlot | Time bucket | Session | Shift block |
//! | Room | Secondary resource | Hall | Exam room |

mod assignment;
mod panelist;
mod project;
mod schedule;
mod slot;
mod tables;

pub use assignment::PanelAssignment;
pub use panelist::Panelist;
pub use project::Project;
pub use schedule::{DefenseSchedule, RoomPlan, ScheduledDefense};
pub use slot::{SlotInstant, TimeRange, TimeSlot};
pub use tables::{IndicatorRow, IndicatorTable, PanelistRow, ProjectRow, RawTables, SlotRow};
