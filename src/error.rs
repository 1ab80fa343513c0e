//! Error types for the defense scheduling pipeline.
//!
//! Only fatal conditions are errors. An infeasible or timed-out phase is
//! a normal outcome and is reported through
//! [`crate::pipeline::ScheduleOutcome`] with diagnostics attached.

use thiserror::Error;

use crate::validation::ValidationReport;

/// Fatal pipeline errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Input tables are malformed or inconsistent. No model was built.
    #[error("input validation failed with {} error(s)", .0.error_count())]
    Validation(ValidationReport),

    /// Two concurrent defenses ended up in the same room.
    #[error("room '{room}' double-booked at {instant}: '{first}' and '{second}'")]
    RoomingImpossible {
        room: String,
        instant: String,
        first: String,
        second: String,
    },

    /// A solver-reported solution does not satisfy the model invariants.
    #[error("solution violates invariant: {0}")]
    InvariantViolation(String),

    /// The solver backend failed without a verdict.
    #[error("solver failure: {0}")]
    Solver(String),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
