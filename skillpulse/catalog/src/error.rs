use thiserror::Error;

/// Errors raised by catalog repositories.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No record of `kind` with `id`.
    #[error("{kind} not found")]
    NotFound {
        /// Record kind label (`Course`, `Lesson`, ...).
        kind: &'static str,
        /// Requested id.
        id: u32,
    },
    /// A lesson has no quiz attached.
    #[error("Quiz not found for this lesson")]
    QuizNotFoundForLesson(u32),
    /// A post was submitted with a blank title or body.
    #[error("Please fill in all fields")]
    IncompletePost,
    /// A reply was submitted without content.
    #[error("Please write a reply")]
    EmptyReply,
    /// Bundled fixture data failed to parse.
    #[error("invalid {name} fixture: {source}")]
    Fixture {
        /// Fixture file name.
        name: &'static str,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },
}

impl CatalogError {
    /// True for lookups that found nothing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::QuizNotFoundForLesson(_))
    }
}
