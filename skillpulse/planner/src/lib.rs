#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Daily time planner: a fixed grid of 30-minute slots per date, a task
//! store persisted per date, and the placement engine that binds tasks to
//! contiguous slot runs.

/// Planner error taxonomy.
pub mod error;
/// Placement engine (fit checks, release-then-place).
pub mod placement;
/// Slot grid generation and occupancy projection.
pub mod slots;
/// Key/value persistence of per-date task lists.
pub mod storage;
/// Task store for the selected date.
pub mod store;
/// Task model and id allocation.
pub mod tasks;

/// Planner runtime wiring the store to telemetry and user notices.
#[path = "../main.rs"]
pub mod orchestration_entry;
/// Telemetry helpers for the planner.
#[path = "../telemetry.rs"]
pub mod telemetry;

pub use error::{ErrorKind, PlannerError};
pub use orchestration_entry::PlannerRuntime;
pub use placement::{slots_needed, Placement, PlacementEngine};
pub use slots::{DayGrid, TimeSlot, SLOTS_PER_DAY, SLOT_MINUTES};
pub use storage::{day_key, DayStorage, DirStorage, MemoryStorage, StorageError};
pub use store::TaskStore;
pub use tasks::{Priority, ProductivityStats, Task, TaskId, DURATION_CHOICES};
pub use telemetry::{PlannerTelemetry, PlannerTelemetryBuilder};
