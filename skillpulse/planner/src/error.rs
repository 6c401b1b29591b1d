use thiserror::Error;

use crate::{
    storage::StorageError,
    tasks::{TaskId, MAX_DURATION_MINUTES},
};

/// Errors raised by planner operations. None of them leaves partial state
/// behind: a rejected operation keeps the previous task list and grid.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// The title was empty or whitespace.
    #[error("Please enter a task title")]
    EmptyTitle,
    /// Duration outside `1..=MAX_DURATION_MINUTES`.
    #[error("Task duration must be between 1 and {max} minutes (got {0})", max = MAX_DURATION_MINUTES)]
    InvalidDuration(u32),
    /// No task with this id on the selected date.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),
    /// No slot with this id in the grid.
    #[error("Time slot not found: {0}")]
    SlotNotFound(String),
    /// The placement would run past the end of the day.
    #[error("Not enough consecutive time slots available")]
    InsufficientSlots {
        /// Target slot.
        slot_id: String,
        /// Slots the task needs.
        needed: usize,
        /// Slots left from the target to the end of the day.
        remaining: usize,
    },
    /// A slot in the required range belongs to another task.
    #[error("Not enough consecutive time slots available")]
    SlotOccupied {
        /// First blocked slot.
        slot_id: String,
        /// Task holding it.
        occupant: TaskId,
    },
    /// Reading or writing the day failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Coarse classification used to pick how a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or a placement that does not fit.
    Validation,
    /// Lookup by id found nothing.
    NotFound,
    /// Persistence failed.
    Storage,
}

impl PlannerError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyTitle
            | Self::InvalidDuration(_)
            | Self::InsufficientSlots { .. }
            | Self::SlotOccupied { .. } => ErrorKind::Validation,
            Self::TaskNotFound(_) | Self::SlotNotFound(_) => ErrorKind::NotFound,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}
