use chrono::NaiveDate;
use serde_json::{json, Value};
use shared_event_bus::Notice;
use shared_logging::LogLevel;

use crate::{
    error::{ErrorKind, PlannerError},
    placement::Placement,
    storage::DayStorage,
    store::TaskStore,
    tasks::{Priority, ProductivityStats, Task, TaskId},
    telemetry::PlannerTelemetry,
};

/// Planner runtime: the task store of the selected date plus logging and
/// user notices for every operation.
#[derive(Debug)]
pub struct PlannerRuntime<S> {
    store: TaskStore<S>,
    telemetry: Option<PlannerTelemetry>,
}

impl<S: DayStorage> PlannerRuntime<S> {
    /// Wraps an opened store. Tasks repaired while loading are reported.
    #[must_use]
    pub fn new(store: TaskStore<S>, telemetry: Option<PlannerTelemetry>) -> Self {
        let runtime = Self { store, telemetry };
        runtime.report_loaded();
        runtime
    }

    /// Opens `date` from `storage`.
    pub fn open(
        storage: S,
        date: NaiveDate,
        telemetry: Option<PlannerTelemetry>,
    ) -> Result<Self, PlannerError> {
        Ok(Self::new(TaskStore::open(storage, date)?, telemetry))
    }

    /// Injects telemetry at runtime.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: PlannerTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Read access to the store.
    #[must_use]
    pub const fn store(&self) -> &TaskStore<S> {
        &self.store
    }

    /// Counters for the selected date.
    #[must_use]
    pub fn stats(&self) -> ProductivityStats {
        self.store.stats()
    }

    /// Switches the selected date.
    pub fn select_date(&mut self, date: NaiveDate) -> Result<(), PlannerError> {
        let result = self.store.select_date(date);
        match &result {
            Ok(()) => self.report_loaded(),
            Err(err) => self.reject("planner.date.select_failed", err, json!({ "date": date })),
        }
        result
    }

    /// Adds an unscheduled task.
    pub fn add_task(
        &mut self,
        title: &str,
        duration_minutes: u32,
        priority: Priority,
    ) -> Result<Task, PlannerError> {
        match self.store.add_task(title, duration_minutes, priority) {
            Ok(task) => {
                let payload = json!({
                    "task_id": task.id,
                    "duration": task.duration_minutes,
                    "priority": task.priority.as_str(),
                    "date": self.store.date(),
                });
                self.accept("planner.task.added", payload, "Task added successfully!");
                Ok(task)
            }
            Err(err) => {
                self.reject(
                    "planner.task.add_rejected",
                    &err,
                    json!({ "duration": duration_minutes }),
                );
                Err(err)
            }
        }
    }

    /// Places a task on the grid starting at `slot_id`.
    pub fn schedule(&mut self, id: TaskId, slot_id: &str) -> Result<Placement, PlannerError> {
        match self.store.schedule(id, slot_id) {
            Ok(Placement::Placed { start, span }) => {
                self.accept(
                    "planner.task.scheduled",
                    json!({ "task_id": id, "slot": slot_id, "start": start, "span": span }),
                    "Task scheduled successfully!",
                );
                Ok(Placement::Placed { start, span })
            }
            Ok(Placement::Unchanged) => {
                self.log(
                    LogLevel::Debug,
                    "planner.task.schedule_unchanged",
                    &json!({ "task_id": id, "slot": slot_id }),
                );
                Ok(Placement::Unchanged)
            }
            Err(err) => {
                self.reject(
                    "planner.task.schedule_rejected",
                    &err,
                    json!({ "task_id": id, "slot": slot_id }),
                );
                Err(err)
            }
        }
    }

    /// Deletes a task and frees its slots.
    pub fn delete_task(&mut self, id: TaskId) -> Result<Task, PlannerError> {
        match self.store.delete_task(id) {
            Ok(task) => {
                self.accept(
                    "planner.task.deleted",
                    json!({ "task_id": id, "released": task.assigned_slot_id }),
                    "Task deleted successfully!",
                );
                Ok(task)
            }
            Err(err) => {
                self.reject("planner.task.delete_rejected", &err, json!({ "task_id": id }));
                Err(err)
            }
        }
    }

    /// Flips a task between done and pending.
    pub fn toggle_complete(&mut self, id: TaskId) -> Result<Task, PlannerError> {
        match self.store.toggle_complete(id) {
            Ok(task) => {
                let message = if task.completed {
                    "Task completed!"
                } else {
                    "Task marked as incomplete"
                };
                self.accept(
                    "planner.task.toggled",
                    json!({ "task_id": id, "completed": task.completed }),
                    message,
                );
                Ok(task)
            }
            Err(err) => {
                self.reject("planner.task.toggle_rejected", &err, json!({ "task_id": id }));
                Err(err)
            }
        }
    }

    fn report_loaded(&self) {
        let date = self.store.date();
        self.log(
            LogLevel::Debug,
            "planner.date.loaded",
            &json!({ "date": date, "tasks": self.store.tasks().len() }),
        );
        let repaired = self.store.repaired();
        if !repaired.is_empty() {
            let payload = json!({ "date": date, "task_ids": repaired });
            self.log(LogLevel::Warn, "planner.date.repaired", &payload);
            self.event("planner.date.repaired", payload);
        }
    }

    fn accept(&self, event_type: &str, payload: Value, message: &str) {
        self.log(LogLevel::Info, event_type, &payload);
        self.event(event_type, payload);
        self.notify(&Notice::success(message));
    }

    fn reject(&self, event_type: &str, err: &PlannerError, mut payload: Value) {
        let level = match err.kind() {
            ErrorKind::Storage => LogLevel::Error,
            ErrorKind::Validation | ErrorKind::NotFound => LogLevel::Warn,
        };
        if let Some(fields) = payload.as_object_mut() {
            fields.insert("error".into(), json!(err.to_string()));
        }
        self.log(level, event_type, &payload);
        self.notify(&Notice::error(err.to_string()));
    }

    fn log(&self, level: LogLevel, message: &str, metadata: &Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(level, message, metadata);
        }
    }

    fn event(&self, event_type: &str, payload: Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.event(event_type, payload);
        }
    }

    fn notify(&self, notice: &Notice) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.notify(notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        storage::{day_key, MemoryStorage},
        telemetry::PlannerTelemetryBuilder,
    };
    use shared_event_bus::MemoryEventBus;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn jan_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn runtime_with_bus(
        storage: Arc<MemoryStorage>,
    ) -> (PlannerRuntime<Arc<MemoryStorage>>, Arc<MemoryEventBus>, tempfile::TempDir) {
        let temp = tempdir().unwrap();
        let bus = Arc::new(MemoryEventBus::new(64));
        let telemetry = PlannerTelemetryBuilder::new("planner-tests")
            .event_publisher(bus.clone())
            .log_path(temp.path().join("planner.log"))
            .build()
            .unwrap();
        let runtime = PlannerRuntime::open(storage, jan_first(), Some(telemetry)).unwrap();
        (runtime, bus, temp)
    }

    #[test]
    fn operations_emit_notices() {
        let (mut runtime, bus, _temp) = runtime_with_bus(Arc::new(MemoryStorage::new()));
        let task = runtime.add_task("Write report", 60, Priority::High).unwrap();
        runtime.schedule(task.id, "9-0").unwrap();
        runtime.toggle_complete(task.id).unwrap();
        runtime.toggle_complete(task.id).unwrap();
        runtime.delete_task(task.id).unwrap();

        let messages: Vec<String> = bus.notices().into_iter().map(|n| n.message).collect();
        assert_eq!(
            messages,
            vec![
                "Task added successfully!",
                "Task scheduled successfully!",
                "Task completed!",
                "Task marked as incomplete",
                "Task deleted successfully!",
            ]
        );
        assert!(bus
            .snapshot()
            .iter()
            .any(|event| event.event_type == "planner.task.scheduled"));
    }

    #[test]
    fn rejections_emit_error_notices_and_log() {
        let (mut runtime, bus, temp) = runtime_with_bus(Arc::new(MemoryStorage::new()));
        assert!(runtime.add_task("", 30, Priority::Low).is_err());
        let task = runtime.add_task("Marathon", 120, Priority::Low).unwrap();
        assert!(runtime.schedule(task.id, "23-0").is_err());

        let notices = bus.notices();
        assert_eq!(notices[0], Notice::error("Please enter a task title"));
        assert_eq!(
            notices[2],
            Notice::error("Not enough consecutive time slots available")
        );
        let log = std::fs::read_to_string(temp.path().join("planner.log")).unwrap();
        assert!(log.contains("planner.task.schedule_rejected"));
        assert_eq!(runtime.stats().scheduled, 0);
    }

    #[test]
    fn unchanged_drop_is_silent() {
        let (mut runtime, bus, _temp) = runtime_with_bus(Arc::new(MemoryStorage::new()));
        let task = runtime.add_task("Focus", 60, Priority::High).unwrap();
        runtime.schedule(task.id, "9-0").unwrap();
        let before = bus.notices().len();
        assert_eq!(runtime.schedule(task.id, "9-30").unwrap(), Placement::Unchanged);
        assert_eq!(bus.notices().len(), before);
    }

    #[test]
    fn repaired_days_are_reported() {
        let storage = Arc::new(MemoryStorage::new());
        let raw = r#"[
            {"id":1,"title":"A","duration":60,"priority":"high","timeSlot":"9-0","completed":false},
            {"id":2,"title":"B","duration":30,"priority":"low","timeSlot":"9-30","completed":false}
        ]"#;
        storage.save(&day_key(jan_first()), raw).unwrap();
        let (runtime, bus, _temp) = runtime_with_bus(storage);
        assert_eq!(runtime.store().repaired(), &[2]);
        assert!(bus
            .snapshot()
            .iter()
            .any(|event| event.event_type == "planner.date.repaired"));
    }

    #[tokio::test]
    async fn notices_are_published_inside_async_code() {
        let (mut runtime, bus, _temp) = runtime_with_bus(Arc::new(MemoryStorage::new()));
        runtime.add_task("Write report", 60, Priority::High).unwrap();
        assert_eq!(bus.notices(), vec![Notice::success("Task added successfully!")]);
        drop(runtime);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn runtime_used_before_and_inside_async_drops_cleanly() {
        let (mut runtime, bus, _temp) = std::thread::spawn(|| {
            let (mut runtime, bus, temp) = runtime_with_bus(Arc::new(MemoryStorage::new()));
            runtime.add_task("Read", 30, Priority::Low).unwrap();
            (runtime, bus, temp)
        })
        .join()
        .unwrap();
        runtime.add_task("Write", 30, Priority::Low).unwrap();
        assert_eq!(bus.notices().len(), 2);
        drop(runtime);
    }

    #[test]
    fn runtime_without_telemetry_still_works() {
        let mut runtime =
            PlannerRuntime::open(MemoryStorage::new(), jan_first(), None).unwrap();
        let task = runtime.add_task("Quiet", 30, Priority::Medium).unwrap();
        runtime.schedule(task.id, "6-0").unwrap();
        runtime
            .select_date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
            .unwrap();
        assert!(runtime.store().tasks().is_empty());
    }
}
