#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Learning catalog: session-scoped repositories for courses, lessons,
//! quizzes, forum posts and progress, seeded from bundled fixtures, plus the
//! numbers the app derives from them.

/// Catalog errors.
pub mod error;
/// Bundled seed data.
pub mod fixtures;
/// Derived numbers (progress, scoring, achievements, forum ordering).
pub mod insights;
/// Record types and the `Record` trait.
pub mod records;
/// Repository trait, in-memory repository and latency profile.
pub mod repository;
/// Entity-specific queries and the progress tracker.
pub mod services;

/// Catalog runtime wiring repositories to telemetry and notices.
#[path = "../main.rs"]
pub mod orchestration_entry;
/// Telemetry helpers for the catalog.
#[path = "../telemetry.rs"]
pub mod telemetry;

pub use error::CatalogError;
pub use fixtures::Fixtures;
pub use insights::{Achievement, CourseGroups, Grade, ProfileStats, QuizAttempt, ALL_CATEGORIES};
pub use orchestration_entry::{Catalog, Dashboard, QuizOutcome};
pub use records::{
    Course, CourseProgress, ForumPost, ForumReply, LearnerProfile, Lesson, PostDraft, Quiz,
    QuizQuestion, Record, RecordId, ReplyDraft,
};
pub use repository::{LatencyProfile, MemoryRepository, Repository};
pub use services::{ProgressTracker, DEFAULT_USER};
pub use telemetry::{CatalogTelemetry, CatalogTelemetryBuilder};
