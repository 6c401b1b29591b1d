use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use shared_event_bus::Notice;
use shared_logging::LogLevel;

use crate::{
    error::CatalogError,
    fixtures::Fixtures,
    insights::{
        daily_tip, in_progress_courses, overall_progress, profile_stats, recommended_courses,
        unlocked_achievements, Achievement, Grade, ProfileStats, QuizAttempt,
    },
    records::{
        Course, CourseProgress, ForumPost, LearnerProfile, Lesson, PostDraft, Quiz, RecordId,
        ReplyDraft,
    },
    repository::{LatencyProfile, MemoryRepository, Repository},
    services::{ProgressTracker, DEFAULT_USER},
    telemetry::CatalogTelemetry,
};

/// Home screen summary.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    /// Mean completion over all courses.
    pub overall_progress: u8,
    /// Up to three started courses.
    pub in_progress: Vec<Course>,
    /// Up to three untouched courses.
    pub recommended: Vec<Course>,
    /// Profile totals.
    pub stats: ProfileStats,
    /// Earned achievements.
    pub achievements: Vec<Achievement>,
    /// Tip of the day.
    pub daily_tip: &'static str,
}

/// Result of a submitted quiz.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizOutcome {
    /// Quiz taken.
    pub quiz_id: RecordId,
    /// Right answers.
    pub correct: usize,
    /// Questions in the quiz.
    pub total: usize,
    /// Whole-percent score.
    pub score: u8,
    /// Score band.
    pub grade: Grade,
    /// Progress after recording the score.
    pub progress: CourseProgress,
}

/// All catalog repositories of one session, plus telemetry and notices.
#[derive(Debug)]
pub struct Catalog {
    courses: MemoryRepository<Course>,
    lessons: MemoryRepository<Lesson>,
    quizzes: MemoryRepository<Quiz>,
    forum: MemoryRepository<ForumPost>,
    progress: ProgressTracker,
    telemetry: Option<CatalogTelemetry>,
}

impl Catalog {
    /// Builds repositories over `fixtures`.
    #[must_use]
    pub fn new(fixtures: Fixtures, latency: LatencyProfile) -> Self {
        Self {
            courses: MemoryRepository::new(fixtures.courses, latency),
            lessons: MemoryRepository::new(fixtures.lessons, latency),
            quizzes: MemoryRepository::new(fixtures.quizzes, latency),
            forum: MemoryRepository::new(fixtures.posts, latency),
            progress: ProgressTracker::new(fixtures.progress, latency),
            telemetry: None,
        }
    }

    /// Builds repositories over the bundled fixtures.
    pub fn with_fixtures(latency: LatencyProfile) -> Result<Self, CatalogError> {
        Ok(Self::new(Fixtures::load()?, latency))
    }

    /// Injects telemetry at runtime.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: CatalogTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Course repository.
    #[must_use]
    pub const fn courses(&self) -> &MemoryRepository<Course> {
        &self.courses
    }

    /// Lesson repository.
    #[must_use]
    pub const fn lessons(&self) -> &MemoryRepository<Lesson> {
        &self.lessons
    }

    /// Quiz repository.
    #[must_use]
    pub const fn quizzes(&self) -> &MemoryRepository<Quiz> {
        &self.quizzes
    }

    /// Forum repository.
    #[must_use]
    pub const fn forum(&self) -> &MemoryRepository<ForumPost> {
        &self.forum
    }

    /// Progress of the session's learner.
    #[must_use]
    pub const fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Home screen numbers for `date`.
    pub async fn dashboard(
        &self,
        date: NaiveDate,
        profile: &LearnerProfile,
    ) -> Result<Dashboard, CatalogError> {
        let (courses, progress, posts) = tokio::join!(
            self.courses.get_all(),
            self.progress.get_all(),
            self.forum.get_all()
        );
        let (courses, posts) = (courses?, posts?);
        let stats = profile_stats(profile, &courses, &progress);
        let dashboard = Dashboard {
            overall_progress: overall_progress(&courses, &progress),
            in_progress: in_progress_courses(&courses, &progress)
                .into_iter()
                .cloned()
                .collect(),
            recommended: recommended_courses(&courses, &progress)
                .into_iter()
                .cloned()
                .collect(),
            achievements: unlocked_achievements(&stats, &progress, &posts, DEFAULT_USER),
            stats,
            daily_tip: daily_tip(date),
        };
        self.log(
            LogLevel::Debug,
            "catalog.dashboard.loaded",
            &json!({
                "courses": courses.len(),
                "overall_progress": dashboard.overall_progress,
            }),
        );
        Ok(dashboard)
    }

    /// Marks a lesson of `course_id` as watched.
    pub async fn complete_lesson(
        &self,
        course_id: RecordId,
        lesson_id: RecordId,
    ) -> Result<CourseProgress, CatalogError> {
        if let Err(err) = self.lessons.get_by_id(lesson_id).await {
            self.fail("catalog.lesson.complete_failed", &err, json!({ "lesson_id": lesson_id }))
                .await;
            return Err(err);
        }
        let progress = self.progress.mark_lesson_complete(course_id, lesson_id).await;
        let payload = json!({
            "course_id": course_id,
            "lesson_id": lesson_id,
            "completed": progress.completed_count(),
        });
        self.log(LogLevel::Info, "catalog.lesson.completed", &payload);
        self.event("catalog.lesson.completed", payload).await;
        self.notify(&Notice::success("Lesson completed! Great job!")).await;
        Ok(progress)
    }

    /// Grades `choices` against the lesson's quiz and records the score.
    pub async fn submit_quiz(
        &self,
        lesson_id: RecordId,
        choices: &[usize],
    ) -> Result<QuizOutcome, CatalogError> {
        let (quiz, lesson) = tokio::join!(
            self.quizzes.get_by_lesson_id(lesson_id),
            self.lessons.get_by_id(lesson_id)
        );
        let (quiz, lesson) = match (quiz, lesson) {
            (Ok(quiz), Ok(lesson)) => (quiz, lesson),
            (Err(err), _) | (_, Err(err)) => {
                self.fail("catalog.quiz.submit_failed", &err, json!({ "lesson_id": lesson_id }))
                    .await;
                return Err(err);
            }
        };
        let mut attempt = QuizAttempt::new(&quiz);
        for &choice in choices {
            if attempt.answer(choice).is_none() {
                break;
            }
        }
        let score = attempt.score();
        let progress = self
            .progress
            .update_quiz_score(lesson.course_id, lesson_id, score)
            .await;
        let outcome = QuizOutcome {
            quiz_id: quiz.id,
            correct: attempt.correct_count(),
            total: quiz.questions.len(),
            score,
            grade: attempt.grade(),
            progress,
        };
        let payload = json!({ "quiz_id": quiz.id, "lesson_id": lesson_id, "score": score });
        self.log(LogLevel::Info, "catalog.quiz.submitted", &payload);
        self.event("catalog.quiz.submitted", payload).await;
        self.notify(&attempt.notice()).await;
        Ok(outcome)
    }

    /// Publishes a post written by the session's learner.
    pub async fn create_post(
        &self,
        title: &str,
        content: &str,
        category: &str,
    ) -> Result<ForumPost, CatalogError> {
        if title.trim().is_empty() || content.trim().is_empty() {
            let err = CatalogError::IncompletePost;
            self.fail("catalog.forum.post_rejected", &err, json!({})).await;
            return Err(err);
        }
        let draft = PostDraft {
            user_id: DEFAULT_USER.into(),
            title: title.trim().into(),
            content: content.trim().into(),
            category: category.into(),
        };
        match self.forum.create(draft).await {
            Ok(post) => {
                let payload = json!({ "post_id": post.id, "category": post.category });
                self.log(LogLevel::Info, "catalog.forum.post_created", &payload);
                self.event("catalog.forum.post_created", payload).await;
                self.notify(&Notice::success("Post created successfully!")).await;
                Ok(post)
            }
            Err(err) => {
                self.log(
                    LogLevel::Warn,
                    "catalog.forum.post_failed",
                    &json!({ "error": err.to_string() }),
                );
                self.notify(&Notice::error("Failed to create post")).await;
                Err(err)
            }
        }
    }

    /// Upvotes a post.
    pub async fn upvote(&self, post_id: RecordId) -> Result<ForumPost, CatalogError> {
        match self.forum.upvote(post_id).await {
            Ok(post) => {
                let payload = json!({ "post_id": post_id, "upvotes": post.upvotes });
                self.log(LogLevel::Info, "catalog.forum.upvote", &payload);
                self.event("catalog.forum.upvote", payload).await;
                self.notify(&Notice::success("Post upvoted!")).await;
                Ok(post)
            }
            Err(err) => {
                self.log(
                    LogLevel::Warn,
                    "catalog.forum.upvote_failed",
                    &json!({ "post_id": post_id, "error": err.to_string() }),
                );
                self.notify(&Notice::error("Failed to upvote post")).await;
                Err(err)
            }
        }
    }

    /// Replies to a post as the session's learner.
    pub async fn reply(&self, post_id: RecordId, content: &str) -> Result<ForumPost, CatalogError> {
        if content.trim().is_empty() {
            let err = CatalogError::EmptyReply;
            self.fail("catalog.forum.reply_rejected", &err, json!({ "post_id": post_id }))
                .await;
            return Err(err);
        }
        let draft = ReplyDraft {
            user_id: DEFAULT_USER.into(),
            content: content.trim().into(),
        };
        match self.forum.add_reply(post_id, draft).await {
            Ok(post) => {
                let payload = json!({ "post_id": post_id, "replies": post.replies.len() });
                self.log(LogLevel::Info, "catalog.forum.reply", &payload);
                self.event("catalog.forum.reply", payload).await;
                Ok(post)
            }
            Err(err) => {
                self.fail("catalog.forum.reply_failed", &err, json!({ "post_id": post_id }))
                    .await;
                Err(err)
            }
        }
    }

    async fn fail(&self, event_type: &str, err: &CatalogError, mut payload: Value) {
        if let Some(fields) = payload.as_object_mut() {
            fields.insert("error".into(), json!(err.to_string()));
        }
        self.log(LogLevel::Warn, event_type, &payload);
        self.notify(&Notice::error(err.to_string())).await;
    }

    fn log(&self, level: LogLevel, message: &str, metadata: &Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(level, message, metadata);
        }
    }

    async fn event(&self, event_type: &str, payload: Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.event(event_type, payload).await;
        }
    }

    async fn notify(&self, notice: &Notice) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.notify(notice).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::CatalogTelemetryBuilder;
    use shared_event_bus::MemoryEventBus;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn catalog_with_bus() -> (Catalog, Arc<MemoryEventBus>, tempfile::TempDir) {
        let temp = tempdir().unwrap();
        let bus = Arc::new(MemoryEventBus::new(64));
        let telemetry = CatalogTelemetryBuilder::new("catalog-tests")
            .event_publisher(bus.clone())
            .log_path(temp.path().join("catalog.log"))
            .build()
            .unwrap();
        let catalog = Catalog::with_fixtures(LatencyProfile::instant())
            .unwrap()
            .with_telemetry(telemetry);
        (catalog, bus, temp)
    }

    fn jan_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn dashboard_from_fixtures() {
        let (catalog, _bus, _temp) = catalog_with_bus();
        let dashboard = catalog
            .dashboard(jan_first(), &LearnerProfile::default())
            .await
            .unwrap();
        assert_eq!(dashboard.overall_progress, 27);
        assert_eq!(dashboard.in_progress.len(), 1);
        assert_eq!(dashboard.recommended.len(), 3);
        assert_eq!(dashboard.stats.completed_lessons, 3);
        assert_eq!(dashboard.achievements.len(), 3);
        assert_eq!(dashboard.daily_tip, daily_tip(jan_first()));
    }

    #[tokio::test]
    async fn completing_lessons_moves_progress() {
        let (catalog, bus, _temp) = catalog_with_bus();
        let progress = catalog.complete_lesson(2, 4).await.unwrap();
        assert_eq!(progress.completed_lessons, vec![4]);
        assert!(catalog.complete_lesson(2, 99).await.is_err());
        assert_eq!(
            bus.notices(),
            vec![
                Notice::success("Lesson completed! Great job!"),
                Notice::error("Lesson not found"),
            ]
        );
        let dashboard = catalog
            .dashboard(jan_first(), &LearnerProfile::default())
            .await
            .unwrap();
        assert_eq!(dashboard.in_progress.len(), 2);
    }

    #[tokio::test]
    async fn quiz_submission_records_score() {
        let (catalog, bus, _temp) = catalog_with_bus();
        let outcome = catalog.submit_quiz(11, &[2, 1]).await.unwrap();
        assert_eq!(outcome.score, 100);
        assert_eq!(outcome.grade, Grade::Excellent);
        assert_eq!(outcome.progress.course_id, 4);
        assert_eq!(outcome.progress.quiz_scores.get(&11), Some(&100));

        let low = catalog.submit_quiz(4, &[0, 1, 0]).await.unwrap();
        assert_eq!(low.score, 0);
        assert!(catalog.submit_quiz(2, &[0]).await.is_err());
        assert_eq!(
            bus.notices(),
            vec![
                Notice::success("Excellent! You scored 100%"),
                Notice::warning("You scored 0%. Consider reviewing the lesson."),
                Notice::error("Quiz not found for this lesson"),
            ]
        );
    }

    #[tokio::test]
    async fn forum_flow_with_notices() {
        let (catalog, bus, temp) = catalog_with_bus();
        assert!(matches!(
            catalog.create_post("  ", "body", "general").await,
            Err(CatalogError::IncompletePost)
        ));
        let post = catalog
            .create_post("Study buddies?", "Anyone up for weekly calls?", "general")
            .await
            .unwrap();
        assert_eq!(post.id, 8);
        assert_eq!(catalog.upvote(post.id).await.unwrap().upvotes, 1);
        assert!(catalog.upvote(404).await.is_err());
        let replied = catalog.reply(2, "It gets easier with practice.").await.unwrap();
        assert_eq!(replied.replies[0].user_id, DEFAULT_USER);

        let messages: Vec<String> = bus.notices().into_iter().map(|n| n.message).collect();
        assert_eq!(
            messages,
            vec![
                "Please fill in all fields",
                "Post created successfully!",
                "Post upvoted!",
                "Failed to upvote post",
            ]
        );
        let log = std::fs::read_to_string(temp.path().join("catalog.log")).unwrap();
        assert!(log.contains("catalog.forum.upvote_failed"));

        let dashboard = catalog
            .dashboard(jan_first(), &LearnerProfile::default())
            .await
            .unwrap();
        assert!(dashboard
            .achievements
            .iter()
            .any(|achievement| achievement.id == "community-helper"));
    }

    #[tokio::test]
    async fn blank_replies_are_rejected() {
        let (catalog, bus, _temp) = catalog_with_bus();
        assert!(matches!(
            catalog.reply(2, "   ").await,
            Err(CatalogError::EmptyReply)
        ));
        assert!(catalog.forum().get_by_id(2).await.unwrap().replies.is_empty());
        assert_eq!(bus.notices(), vec![Notice::error("Please write a reply")]);

        let dashboard = catalog
            .dashboard(jan_first(), &LearnerProfile::default())
            .await
            .unwrap();
        assert!(!dashboard
            .achievements
            .iter()
            .any(|achievement| achievement.id == "community-helper"));
    }

    #[tokio::test]
    async fn sessions_do_not_share_state() {
        let first = Catalog::with_fixtures(LatencyProfile::instant()).unwrap();
        let second = Catalog::with_fixtures(LatencyProfile::instant()).unwrap();
        first.forum().delete(1).await.unwrap();
        assert_eq!(first.forum().len(), 6);
        assert_eq!(second.forum().len(), 7);
    }
}
