use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::placement::slots_needed;

/// Task identifier, derived from the creation time in milliseconds.
pub type TaskId = i64;

/// Durations offered when creating a task, in minutes.
pub const DURATION_CHOICES: [u32; 5] = [15, 30, 60, 90, 120];

/// Longest duration accepted; one task may fill the whole 06:00-24:00 grid.
pub const MAX_DURATION_MINUTES: u32 = 18 * 60;

/// Default duration of a new task.
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

/// Task priority.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Must happen today.
    High,
    /// Default.
    #[default]
    Medium,
    /// Nice to have.
    Low,
}

impl Priority {
    /// Lower-case name as persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High Priority",
            Self::Medium => "Medium Priority",
            Self::Low => "Low Priority",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown priority `{other}` (expected high, medium or low)")),
        }
    }
}

/// A task planned for one day. Field names on disk follow the saved-day format
/// (`duration`, `timeSlot`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    /// Unique id within the day.
    pub id: TaskId,
    /// Title as entered, trimmed.
    pub title: String,
    /// Length in minutes.
    #[serde(rename = "duration")]
    pub duration_minutes: u32,
    /// Priority.
    #[serde(default)]
    pub priority: Priority,
    /// Id of the first slot of the placement, if scheduled.
    #[serde(rename = "timeSlot", default)]
    pub assigned_slot_id: Option<String>,
    /// Completion flag; independent of scheduling.
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    /// Creates an unscheduled, incomplete task.
    #[must_use]
    pub fn new(
        id: TaskId,
        title: impl Into<String>,
        duration_minutes: u32,
        priority: Priority,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            duration_minutes,
            priority,
            assigned_slot_id: None,
            completed: false,
        }
    }

    /// Whether the task holds slots.
    #[must_use]
    pub const fn is_scheduled(&self) -> bool {
        self.assigned_slot_id.is_some()
    }

    /// Number of consecutive slots the task needs.
    #[must_use]
    pub const fn slots_needed(&self) -> usize {
        slots_needed(self.duration_minutes)
    }
}

/// Hands out creation-time ids that stay unique even when two tasks are
/// created within the same millisecond.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdAllocator {
    last: TaskId,
}

impl IdAllocator {
    /// Makes sure future ids are larger than `id`.
    pub fn observe(&mut self, id: TaskId) {
        self.last = self.last.max(id);
    }

    /// Next id given the current time in milliseconds.
    pub fn next_at(&mut self, now_millis: TaskId) -> TaskId {
        let id = now_millis.max(self.last.saturating_add(1));
        self.last = id;
        id
    }
}

/// Counters shown above the planner.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductivityStats {
    /// All tasks of the day.
    pub total: usize,
    /// Completed tasks.
    pub completed: usize,
    /// Tasks holding slots.
    pub scheduled: usize,
    /// `completed / total` as a rounded percentage; 0 without tasks.
    pub completion_rate: u8,
}

impl ProductivityStats {
    /// Computes the counters for a task list.
    #[must_use]
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|task| task.completed).count();
        let scheduled = tasks.iter().filter(|task| task.is_scheduled()).count();
        Self {
            total,
            completed,
            scheduled,
            completion_rate: rounded_percent(completed, total),
        }
    }
}

/// `part / whole * 100` rounded half up, 0 when `whole` is 0.
#[must_use]
pub fn rounded_percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let value = (part.min(whole) * 200 + whole) / (whole * 2);
    u8::try_from(value).unwrap_or(100)
}
