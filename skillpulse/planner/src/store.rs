use std::collections::HashSet;

use chrono::{NaiveDate, Utc};

use crate::{
    error::PlannerError,
    placement::{Placement, PlacementEngine},
    slots::DayGrid,
    storage::{date_from_key, load_tasks, save_tasks, DayStorage},
    tasks::{IdAllocator, Priority, ProductivityStats, Task, TaskId, MAX_DURATION_MINUTES},
};

/// Tasks of the selected date plus the slot grid projected from them.
///
/// Every mutation is staged on a copy of the task list, written in full to
/// storage, and only then swapped in; the grid is re-projected afterwards and
/// never edited on its own.
#[derive(Debug)]
pub struct TaskStore<S> {
    storage: S,
    date: NaiveDate,
    tasks: Vec<Task>,
    grid: DayGrid,
    ids: IdAllocator,
    repaired: Vec<TaskId>,
}

impl<S: DayStorage> TaskStore<S> {
    /// Opens the store on `date`, loading whatever was saved for it.
    pub fn open(storage: S, date: NaiveDate) -> Result<Self, PlannerError> {
        let mut store = Self {
            storage,
            date,
            tasks: Vec::new(),
            grid: DayGrid::generate(date),
            ids: IdAllocator::default(),
            repaired: Vec::new(),
        };
        store.load(date)?;
        Ok(store)
    }

    /// Switches to another date: regenerates the grid and loads its tasks.
    pub fn select_date(&mut self, date: NaiveDate) -> Result<(), PlannerError> {
        self.load(date)
    }

    fn load(&mut self, date: NaiveDate) -> Result<(), PlannerError> {
        let mut tasks = load_tasks(&self.storage, date)?;
        // A repeated id would share slots with its first record; only the
        // first keeps its placement.
        let mut seen = HashSet::new();
        let mut repaired = Vec::new();
        for task in &mut tasks {
            if !seen.insert(task.id) && task.assigned_slot_id.take().is_some() {
                repaired.push(task.id);
            }
        }
        let projection = DayGrid::project(date, &tasks);
        for task in &mut tasks {
            if projection.conflicts.contains(&task.id) {
                task.assigned_slot_id = None;
            }
            self.ids.observe(task.id);
        }
        repaired.extend(projection.conflicts);
        self.date = date;
        self.tasks = tasks;
        self.grid = projection.grid;
        self.repaired = repaired;
        Ok(())
    }

    /// Selected date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// All tasks in creation order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Task by id.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Grid of the selected date.
    #[must_use]
    pub const fn grid(&self) -> &DayGrid {
        &self.grid
    }

    /// Backing storage.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Tasks whose saved placement was inconsistent and got unscheduled by the
    /// last load.
    #[must_use]
    pub fn repaired(&self) -> &[TaskId] {
        &self.repaired
    }

    /// Tasks waiting for a slot.
    #[must_use]
    pub fn unscheduled_tasks(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|task| !task.is_scheduled()).collect()
    }

    /// Scheduled tasks in time order.
    #[must_use]
    pub fn scheduled_tasks(&self) -> Vec<&Task> {
        let mut scheduled: Vec<(usize, &Task)> = self
            .tasks
            .iter()
            .filter_map(|task| {
                let slot = task.assigned_slot_id.as_deref()?;
                Some((self.grid.index_of(slot)?, task))
            })
            .collect();
        scheduled.sort_by_key(|(index, _)| *index);
        scheduled.into_iter().map(|(_, task)| task).collect()
    }

    /// Dates that have a saved task list, ascending.
    pub fn saved_dates(&self) -> Result<Vec<NaiveDate>, PlannerError> {
        let mut dates: Vec<NaiveDate> = self
            .storage
            .keys()?
            .iter()
            .filter_map(|key| date_from_key(key))
            .collect();
        dates.sort_unstable();
        Ok(dates)
    }

    /// Counters for the selected date.
    #[must_use]
    pub fn stats(&self) -> ProductivityStats {
        ProductivityStats::from_tasks(&self.tasks)
    }

    /// Creates an unscheduled task.
    pub fn add_task(
        &mut self,
        title: &str,
        duration_minutes: u32,
        priority: Priority,
    ) -> Result<Task, PlannerError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PlannerError::EmptyTitle);
        }
        if duration_minutes == 0 || duration_minutes > MAX_DURATION_MINUTES {
            return Err(PlannerError::InvalidDuration(duration_minutes));
        }
        let mut ids = self.ids;
        let task = Task::new(
            ids.next_at(Utc::now().timestamp_millis()),
            title,
            duration_minutes,
            priority,
        );
        let mut tasks = self.tasks.clone();
        tasks.push(task.clone());
        self.commit(tasks)?;
        self.ids = ids;
        Ok(task)
    }

    /// Removes a task, releasing its slots in the same step.
    pub fn delete_task(&mut self, id: TaskId) -> Result<Task, PlannerError> {
        let index = self.position(id)?;
        let mut tasks = self.tasks.clone();
        let removed = tasks.remove(index);
        self.commit(tasks)?;
        Ok(removed)
    }

    /// Flips the completion flag; scheduling is untouched.
    pub fn toggle_complete(&mut self, id: TaskId) -> Result<Task, PlannerError> {
        let index = self.position(id)?;
        let mut tasks = self.tasks.clone();
        tasks[index].completed = !tasks[index].completed;
        let updated = tasks[index].clone();
        self.commit(tasks)?;
        Ok(updated)
    }

    /// Places a task at `target_slot_id`, releasing any slots it held before.
    /// On rejection the task keeps its previous placement.
    pub fn schedule(
        &mut self,
        id: TaskId,
        target_slot_id: &str,
    ) -> Result<Placement, PlannerError> {
        let index = self.position(id)?;
        let placement = PlacementEngine::place(&self.grid, &self.tasks[index], target_slot_id)?;
        if placement == Placement::Unchanged {
            return Ok(placement);
        }
        let mut tasks = self.tasks.clone();
        tasks[index].assigned_slot_id = Some(target_slot_id.to_string());
        self.commit(tasks)?;
        Ok(placement)
    }

    fn position(&self, id: TaskId) -> Result<usize, PlannerError> {
        self.tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(PlannerError::TaskNotFound(id))
    }

    fn commit(&mut self, tasks: Vec<Task>) -> Result<(), PlannerError> {
        save_tasks(&self.storage, self.date, &tasks)?;
        self.grid = DayGrid::project(self.date, &tasks).grid;
        self.tasks = tasks;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        storage::{day_key, DirStorage, MemoryStorage, StorageError},
    };
    use std::sync::Arc;
    use tempfile::tempdir;

    fn jan_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn store() -> TaskStore<Arc<MemoryStorage>> {
        TaskStore::open(Arc::new(MemoryStorage::new()), jan_first()).unwrap()
    }

    fn occupancy<S: DayStorage>(store: &TaskStore<S>) -> Vec<(String, Option<TaskId>)> {
        store
            .grid()
            .slots()
            .iter()
            .map(|slot| (slot.id.clone(), slot.occupying_task))
            .collect()
    }

    #[test]
    fn add_then_schedule_write_report() {
        let mut store = store();
        let task = store.add_task("Write report", 60, Priority::High).unwrap();
        assert_eq!(store.unscheduled_tasks(), vec![&task]);

        let placement = store.schedule(task.id, "9-0").unwrap();
        assert_eq!(placement, Placement::Placed { start: 6, span: 2 });
        for id in ["9-0", "9-30"] {
            let slot = store.grid().slot(id).unwrap();
            assert!(!slot.is_available);
            assert_eq!(slot.occupying_task, Some(task.id));
        }
        assert!(store.grid().slot("10-0").unwrap().is_available);
        assert_eq!(
            store.task(task.id).unwrap().assigned_slot_id.as_deref(),
            Some("9-0")
        );
        assert!(store.unscheduled_tasks().is_empty());
    }

    #[test]
    fn empty_title_is_rejected_without_writing() {
        let mut store = store();
        let err = store.add_task("   ", 30, Priority::Medium).unwrap_err();
        assert!(matches!(err, PlannerError::EmptyTitle));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(store.tasks().is_empty());
        assert!(store.storage().load(&day_key(jan_first())).unwrap().is_none());
    }

    #[test]
    fn zero_duration_is_rejected() {
        let mut store = store();
        assert!(matches!(
            store.add_task("Nap", 0, Priority::Low),
            Err(PlannerError::InvalidDuration(0))
        ));
    }

    #[test]
    fn rejected_placement_changes_nothing() {
        let mut store = store();
        let blocker = store.add_task("Standup", 30, Priority::High).unwrap();
        store.schedule(blocker.id, "10-0").unwrap();
        let long = store.add_task("Deep work", 90, Priority::Medium).unwrap();

        let grid_before = occupancy(&store);
        let tasks_before = store.tasks().to_vec();
        let saved_before = store.storage().load(&day_key(jan_first())).unwrap();

        let err = store.schedule(long.id, "9-0").unwrap_err();
        assert_eq!(err.to_string(), "Not enough consecutive time slots available");
        assert_eq!(occupancy(&store), grid_before);
        assert_eq!(store.tasks(), tasks_before.as_slice());
        assert_eq!(
            store.storage().load(&day_key(jan_first())).unwrap(),
            saved_before
        );
    }

    #[test]
    fn late_two_hour_task_is_rejected() {
        let mut store = store();
        let task = store.add_task("Marathon", 120, Priority::Low).unwrap();
        assert!(matches!(
            store.schedule(task.id, "23-0"),
            Err(PlannerError::InsufficientSlots { .. })
        ));
        assert_eq!(store.grid().available_count(), 36);
        assert!(!store.task(task.id).unwrap().is_scheduled());
    }

    #[test]
    fn delete_releases_exactly_its_slots() {
        let mut store = store();
        let a = store.add_task("A", 60, Priority::High).unwrap();
        let b = store.add_task("B", 30, Priority::Low).unwrap();
        store.schedule(a.id, "9-0").unwrap();
        store.schedule(b.id, "10-0").unwrap();

        let before = occupancy(&store);
        store.delete_task(a.id).unwrap();
        let after = occupancy(&store);

        for ((id, was), (_, now)) in before.iter().zip(after.iter()) {
            if *was == Some(a.id) {
                assert_eq!(*now, None, "slot {id} should be released");
            } else {
                assert_eq!(was, now, "slot {id} should be untouched");
            }
        }
        assert_eq!(store.grid().slot("10-0").unwrap().occupying_task, Some(b.id));
        assert!(matches!(
            store.delete_task(a.id),
            Err(PlannerError::TaskNotFound(_))
        ));
    }

    #[test]
    fn moving_releases_old_slots_and_failed_move_keeps_them() {
        let mut store = store();
        let task = store.add_task("Study", 60, Priority::High).unwrap();
        let other = store.add_task("Gym", 60, Priority::Low).unwrap();
        store.schedule(task.id, "9-0").unwrap();
        store.schedule(other.id, "14-0").unwrap();

        // overlapping its own range is fine
        store.schedule(task.id, "8-30").unwrap();
        let held: Vec<_> = store
            .grid()
            .held_by(task.id)
            .iter()
            .map(|slot| slot.id.clone())
            .collect();
        assert_eq!(held, vec!["8-30", "9-0"]);
        assert!(store.grid().slot("9-30").unwrap().is_available);

        assert!(store.schedule(task.id, "13-30").is_err());
        assert_eq!(
            store.task(task.id).unwrap().assigned_slot_id.as_deref(),
            Some("8-30")
        );
        assert_eq!(store.grid().held_by(task.id).len(), 2);
    }

    #[test]
    fn dropping_on_own_slot_is_a_no_op() {
        let mut store = store();
        let task = store.add_task("Focus", 90, Priority::High).unwrap();
        store.schedule(task.id, "7-0").unwrap();
        let before = occupancy(&store);
        assert_eq!(store.schedule(task.id, "7-30").unwrap(), Placement::Unchanged);
        assert_eq!(store.schedule(task.id, "7-0").unwrap(), Placement::Unchanged);
        assert_eq!(occupancy(&store), before);
        assert_eq!(
            store.task(task.id).unwrap().assigned_slot_id.as_deref(),
            Some("7-0")
        );
    }

    #[test]
    fn toggle_keeps_schedule() {
        let mut store = store();
        let task = store.add_task("Review", 30, Priority::Medium).unwrap();
        store.schedule(task.id, "6-0").unwrap();
        assert!(store.toggle_complete(task.id).unwrap().completed);
        assert_eq!(store.grid().slot("6-0").unwrap().occupying_task, Some(task.id));
        assert!(!store.toggle_complete(task.id).unwrap().completed);
        assert_eq!(store.stats().scheduled, 1);
    }

    #[test]
    fn reload_reproduces_tasks_and_occupancy() {
        let dir = tempdir().unwrap();
        let storage = DirStorage::new(dir.path());
        let mut store = TaskStore::open(storage.clone(), jan_first()).unwrap();
        let a = store.add_task("Write report", 60, Priority::High).unwrap();
        let b = store.add_task("Read", 45, Priority::Low).unwrap();
        store.add_task("Inbox", 15, Priority::Medium).unwrap();
        store.schedule(a.id, "9-0").unwrap();
        store.schedule(b.id, "13-30").unwrap();
        store.toggle_complete(b.id).unwrap();

        let reloaded = TaskStore::open(storage, jan_first()).unwrap();
        assert_eq!(reloaded.tasks(), store.tasks());
        assert_eq!(occupancy(&reloaded), occupancy(&store));
        assert!(reloaded.repaired().is_empty());
    }

    #[test]
    fn switching_dates_loads_separate_lists() {
        let mut store = store();
        store.add_task("Monday task", 30, Priority::Medium).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        store.select_date(tuesday).unwrap();
        assert!(store.tasks().is_empty());
        assert_eq!(store.grid().date(), tuesday);
        store.add_task("Tuesday task", 30, Priority::Medium).unwrap();
        store.select_date(jan_first()).unwrap();
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.saved_dates().unwrap(), vec![jan_first(), tuesday]);
    }

    #[test]
    fn inconsistent_saved_day_is_repaired_on_load() {
        let storage = Arc::new(MemoryStorage::new());
        let raw = r#"[
            {"id":1,"title":"A","duration":60,"priority":"high","timeSlot":"9-0","completed":false},
            {"id":2,"title":"B","duration":30,"priority":"low","timeSlot":"9-30","completed":false},
            {"id":3,"title":"C","duration":30,"priority":"low","timeSlot":"nope","completed":true}
        ]"#;
        storage.save(&day_key(jan_first()), raw).unwrap();
        let store = TaskStore::open(Arc::clone(&storage), jan_first()).unwrap();
        assert_eq!(store.repaired(), &[2, 3]);
        assert_eq!(store.unscheduled_tasks().len(), 2);
        assert_eq!(store.grid().held_by(1).len(), 2);
        assert_eq!(store.grid().available_count(), 34);
    }

    #[test]
    fn repeated_ids_keep_only_the_first_placement() {
        let storage = Arc::new(MemoryStorage::new());
        let raw = r#"[
            {"id":7,"title":"A","duration":60,"priority":"high","timeSlot":"9-0","completed":false},
            {"id":7,"title":"A copy","duration":60,"priority":"high","timeSlot":"9-30","completed":false}
        ]"#;
        storage.save(&day_key(jan_first()), raw).unwrap();
        let store = TaskStore::open(Arc::clone(&storage), jan_first()).unwrap();
        assert_eq!(store.repaired(), &[7]);
        assert_eq!(store.tasks()[0].assigned_slot_id.as_deref(), Some("9-0"));
        assert_eq!(store.tasks()[1].assigned_slot_id, None);
        assert_eq!(store.grid().held_by(7).len(), 2);
        assert_eq!(store.grid().available_count(), 34);
    }

    #[test]
    fn ids_continue_after_loaded_ones() {
        let storage = Arc::new(MemoryStorage::new());
        let future = Utc::now().timestamp_millis() + 1_000_000;
        let raw = format!(
            r#"[{{"id":{future},"title":"A","duration":30,"priority":"high","timeSlot":null,"completed":false}}]"#
        );
        storage.save(&day_key(jan_first()), &raw).unwrap();
        let mut store = TaskStore::open(storage, jan_first()).unwrap();
        let task = store.add_task("B", 30, Priority::Low).unwrap();
        assert_eq!(task.id, future + 1);
    }

    struct ReadOnly;

    impl DayStorage for ReadOnly {
        fn load(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }
        fn save(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
        fn keys(&self) -> Result<Vec<String>, StorageError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let mut store = TaskStore::open(ReadOnly, jan_first()).unwrap();
        let err = store.add_task("Unsaved", 30, Priority::Low).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(store.tasks().is_empty());
    }
}
