use chrono::Utc;
use parking_lot::RwLock;

use crate::{
    error::CatalogError,
    records::{CourseProgress, ForumPost, ForumReply, Lesson, Quiz, RecordId, ReplyDraft},
    repository::{pause, LatencyProfile, MemoryRepository},
};

/// Learner that progress records are created for.
pub const DEFAULT_USER: &str = "user_1";

impl MemoryRepository<Lesson> {
    /// Lessons of a course ordered by position.
    pub async fn get_by_course_id(&self, course_id: RecordId) -> Vec<Lesson> {
        let mut lessons = self.query(|lesson| lesson.course_id == course_id).await;
        lessons.sort_by_key(|lesson| lesson.order);
        lessons
    }
}

impl MemoryRepository<Quiz> {
    /// The quiz attached to a lesson.
    pub async fn get_by_lesson_id(&self, lesson_id: RecordId) -> Result<Quiz, CatalogError> {
        self.query(|quiz| quiz.lesson_id == lesson_id)
            .await
            .into_iter()
            .next()
            .ok_or(CatalogError::QuizNotFoundForLesson(lesson_id))
    }
}

impl MemoryRepository<ForumPost> {
    /// Posts of one category in stored order.
    pub async fn get_by_category(&self, category: &str) -> Vec<ForumPost> {
        self.query(|post| post.category == category).await
    }

    /// Adds one upvote and returns the updated post.
    pub async fn upvote(&self, id: RecordId) -> Result<ForumPost, CatalogError> {
        pause(self.latency().get).await;
        self.modify(id, |post| {
            post.upvotes += 1;
            post.clone()
        })
    }

    /// Appends a reply stamped with the current time.
    pub async fn add_reply(
        &self,
        id: RecordId,
        draft: ReplyDraft,
    ) -> Result<ForumPost, CatalogError> {
        pause(self.latency().delete).await;
        let now = Utc::now();
        self.modify(id, |post| {
            let last = post.replies.iter().map(|reply| reply.id).max().unwrap_or(0);
            post.replies.push(ForumReply {
                id: now.timestamp_millis().max(last + 1),
                user_id: draft.user_id,
                content: draft.content,
                timestamp: now,
            });
            post.clone()
        })
    }
}

/// Per-course progress of the session's learner.
#[derive(Debug)]
pub struct ProgressTracker {
    records: RwLock<Vec<CourseProgress>>,
    latency: LatencyProfile,
    user_id: String,
}

impl ProgressTracker {
    /// Tracker seeded with `records`, creating new ones for [`DEFAULT_USER`].
    #[must_use]
    pub fn new(records: Vec<CourseProgress>, latency: LatencyProfile) -> Self {
        Self {
            records: RwLock::new(records),
            latency,
            user_id: DEFAULT_USER.into(),
        }
    }

    /// Every progress record.
    pub async fn get_all(&self) -> Vec<CourseProgress> {
        pause(self.latency.get).await;
        self.records.read().clone()
    }

    /// Progress for a course, if the learner started it.
    pub async fn get_by_course_id(&self, course_id: RecordId) -> Option<CourseProgress> {
        pause(self.latency.get).await;
        self.records
            .read()
            .iter()
            .find(|progress| progress.course_id == course_id)
            .cloned()
    }

    /// Marks a lesson done; completing it twice changes only `last_accessed`.
    pub async fn mark_lesson_complete(
        &self,
        course_id: RecordId,
        lesson_id: RecordId,
    ) -> CourseProgress {
        pause(self.latency.query).await;
        self.touch(course_id, |progress| {
            if !progress.completed_lessons.contains(&lesson_id) {
                progress.completed_lessons.push(lesson_id);
            }
        })
    }

    /// Stores the latest quiz score (0 to 100) for a lesson.
    pub async fn update_quiz_score(
        &self,
        course_id: RecordId,
        lesson_id: RecordId,
        score: u8,
    ) -> CourseProgress {
        pause(self.latency.query).await;
        self.touch(course_id, |progress| {
            progress.quiz_scores.insert(lesson_id, score.min(100));
        })
    }

    fn touch(&self, course_id: RecordId, change: impl FnOnce(&mut CourseProgress)) -> CourseProgress {
        let mut records = self.records.write();
        let index = if let Some(index) = records
            .iter()
            .position(|progress| progress.course_id == course_id)
        {
            index
        } else {
            records.push(CourseProgress::started(&self.user_id, course_id));
            records.len() - 1
        };
        let progress = &mut records[index];
        change(progress);
        progress.last_accessed = Utc::now();
        progress.clone()
    }
}
