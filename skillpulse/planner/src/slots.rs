use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::{
    placement::{Placement, PlacementEngine},
    tasks::{Task, TaskId},
};

/// Slot length in minutes.
pub const SLOT_MINUTES: u32 = 30;
/// First hour of the grid.
pub const DAY_START_HOUR: u32 = 6;
/// Hour at which the grid ends (exclusive).
pub const DAY_END_HOUR: u32 = 24;
/// Number of slots in one day's grid.
pub const SLOTS_PER_DAY: usize = ((DAY_END_HOUR - DAY_START_HOUR) * 60 / SLOT_MINUTES) as usize;

/// Slot id for a start time, e.g. `9-0` or `23-30`.
#[must_use]
pub fn slot_id(hour: u32, minute: u32) -> String {
    format!("{hour}-{minute}")
}

/// Twelve-hour label, e.g. `6:00 AM` or `11:30 PM`.
#[must_use]
pub fn slot_label(start: NaiveDateTime) -> String {
    start.format("%-I:%M %p").to_string()
}

/// One 30-minute interval of the daily grid.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    /// Stable id derived from hour and minute.
    pub id: String,
    /// Local start time.
    pub start_time: NaiveDateTime,
    /// Display label.
    pub label: String,
    /// False while a task occupies the slot.
    pub is_available: bool,
    /// Task holding the slot.
    pub occupying_task: Option<TaskId>,
}

/// Generates the empty grid for `date`: 36 slots from 06:00 to 24:00.
#[must_use]
pub fn generate_slots(date: NaiveDate) -> Vec<TimeSlot> {
    let midnight = date.and_time(NaiveTime::MIN);
    (DAY_START_HOUR..DAY_END_HOUR)
        .flat_map(|hour| (0..60).step_by(SLOT_MINUTES as usize).map(move |minute| (hour, minute)))
        .map(|(hour, minute)| {
            let start_time = midnight + Duration::minutes(i64::from(hour * 60 + minute));
            TimeSlot {
                id: slot_id(hour, minute),
                start_time,
                label: slot_label(start_time),
                is_available: true,
                occupying_task: None,
            }
        })
        .collect()
}

/// Slot grid of one date with occupancy derived from a task list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGrid {
    date: NaiveDate,
    slots: Vec<TimeSlot>,
}

/// Result of projecting a task list onto a fresh grid.
#[derive(Debug, Clone)]
pub struct Projection {
    /// Grid with every consistent placement applied.
    pub grid: DayGrid,
    /// Scheduled tasks that could not be placed (unknown slot, past the end
    /// of the day, or overlapping a task listed earlier).
    pub conflicts: Vec<TaskId>,
}

impl DayGrid {
    /// Empty grid for `date`.
    #[must_use]
    pub fn generate(date: NaiveDate) -> Self {
        Self {
            date,
            slots: generate_slots(date),
        }
    }

    /// Rebuilds occupancy from scratch. Tasks are applied in list order, so
    /// an earlier task wins an overlap.
    #[must_use]
    pub fn project(date: NaiveDate, tasks: &[Task]) -> Projection {
        let mut grid = Self::generate(date);
        let mut conflicts = Vec::new();
        for task in tasks {
            let Some(target) = task.assigned_slot_id.as_deref() else {
                continue;
            };
            match PlacementEngine::place(&grid, task, target) {
                Ok(Placement::Placed { start, span }) => grid.occupy(start, span, task.id),
                Ok(Placement::Unchanged) | Err(_) => conflicts.push(task.id),
            }
        }
        Projection { grid, conflicts }
    }

    /// Date of the grid.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// All slots in time order.
    #[must_use]
    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false for a generated grid.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Position of a slot id.
    #[must_use]
    pub fn index_of(&self, slot_id: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.id == slot_id)
    }

    /// Slot by id.
    #[must_use]
    pub fn slot(&self, slot_id: &str) -> Option<&TimeSlot> {
        self.slots.iter().find(|slot| slot.id == slot_id)
    }

    /// Slots not held by any task.
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_available).count()
    }

    /// Slots held by `task_id`, in time order.
    #[must_use]
    pub fn held_by(&self, task_id: TaskId) -> Vec<&TimeSlot> {
        self.slots
            .iter()
            .filter(|slot| slot.occupying_task == Some(task_id))
            .collect()
    }

    fn occupy(&mut self, start: usize, span: usize, task_id: TaskId) {
        for slot in &mut self.slots[start..start + span] {
            slot.is_available = false;
            slot.occupying_task = Some(task_id);
        }
    }
}
