use crate::{
    error::PlannerError,
    slots::{DayGrid, SLOT_MINUTES},
    tasks::Task,
};

/// Consecutive slots needed for a duration (`ceil(minutes / 30)`).
#[must_use]
pub const fn slots_needed(duration_minutes: u32) -> usize {
    duration_minutes.div_ceil(SLOT_MINUTES) as usize
}

/// Outcome of an accepted placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The task should occupy `span` slots starting at index `start`.
    Placed {
        /// Index of the target slot.
        start: usize,
        /// Number of slots.
        span: usize,
    },
    /// The target slot is already held by this task; nothing to do.
    Unchanged,
}

/// Decides whether a task fits at a target slot.
///
/// Slots the task already holds count as free: moving a task releases its
/// old range before the new one is checked, and a rejected move leaves the
/// old range untouched because nothing is mutated here.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlacementEngine;

impl PlacementEngine {
    /// Checks `task` against `grid` at `target_slot_id`.
    pub fn place(grid: &DayGrid, task: &Task, target_slot_id: &str) -> Result<Placement, PlannerError> {
        let start = grid
            .index_of(target_slot_id)
            .ok_or_else(|| PlannerError::SlotNotFound(target_slot_id.to_string()))?;
        let slots = grid.slots();
        if slots[start].occupying_task == Some(task.id) {
            return Ok(Placement::Unchanged);
        }

        let span = task.slots_needed().max(1);
        let remaining = slots.len() - start;
        if span > remaining {
            return Err(PlannerError::InsufficientSlots {
                slot_id: target_slot_id.to_string(),
                needed: span,
                remaining,
            });
        }
        if let Some(blocked) = slots[start..start + span]
            .iter()
            .find(|slot| slot.occupying_task.is_some_and(|holder| holder != task.id))
        {
            return Err(PlannerError::SlotOccupied {
                slot_id: blocked.id.clone(),
                occupant: blocked.occupying_task.unwrap_or_default(),
            });
        }
        Ok(Placement::Placed { start, span })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Priority;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn scheduled(id: i64, minutes: u32, slot: &str) -> Task {
        let mut task = Task::new(id, format!("task {id}"), minutes, Priority::Medium);
        task.assigned_slot_id = Some(slot.to_string());
        task
    }

    #[test]
    fn slot_count_rounds_up() {
        assert_eq!(slots_needed(15), 1);
        assert_eq!(slots_needed(30), 1);
        assert_eq!(slots_needed(45), 2);
        assert_eq!(slots_needed(60), 2);
        assert_eq!(slots_needed(90), 3);
        assert_eq!(slots_needed(120), 4);
    }

    #[test]
    fn fits_into_free_range() {
        let grid = DayGrid::generate(date());
        let task = Task::new(1, "Write report", 60, Priority::High);
        assert_eq!(
            PlacementEngine::place(&grid, &task, "9-0").unwrap(),
            Placement::Placed { start: 6, span: 2 }
        );
    }

    #[test]
    fn rejects_past_end_of_day() {
        let grid = DayGrid::generate(date());
        let task = Task::new(1, "Late", 120, Priority::Low);
        let err = PlacementEngine::place(&grid, &task, "23-0").unwrap_err();
        assert!(matches!(
            err,
            PlannerError::InsufficientSlots { needed: 4, remaining: 2, .. }
        ));
        assert_eq!(err.to_string(), "Not enough consecutive time slots available");
    }

    #[test]
    fn rejects_when_any_slot_is_taken() {
        let grid = DayGrid::project(date(), &[scheduled(1, 30, "10-0")]).grid;
        let task = Task::new(2, "Long", 90, Priority::Low);
        let err = PlacementEngine::place(&grid, &task, "9-0").unwrap_err();
        assert!(matches!(err, PlannerError::SlotOccupied { occupant: 1, ref slot_id } if slot_id == "10-0"));
    }

    #[test]
    fn own_slots_count_as_free_when_moving() {
        let task = scheduled(1, 60, "9-0");
        let grid = DayGrid::project(date(), std::slice::from_ref(&task)).grid;
        assert_eq!(
            PlacementEngine::place(&grid, &task, "8-30").unwrap(),
            Placement::Placed { start: 5, span: 2 }
        );
        assert_eq!(
            PlacementEngine::place(&grid, &task, "9-30").unwrap(),
            Placement::Unchanged
        );
    }

    #[test]
    fn unknown_slot_is_not_found() {
        let grid = DayGrid::generate(date());
        let task = Task::new(1, "x", 30, Priority::Low);
        assert!(matches!(
            PlacementEngine::place(&grid, &task, "25-0"),
            Err(PlannerError::SlotNotFound(id)) if id == "25-0"
        ));
    }
}
