use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Numeric record id (`Id` in the JSON fixtures).
pub type RecordId = u32;

/// A catalog entity stored in a [`crate::repository::MemoryRepository`].
pub trait Record: Clone + Send + Sync + 'static {
    /// Label used in not-found messages.
    const KIND: &'static str;
    /// Fields supplied on create; the repository assigns the id.
    type Draft: Send + 'static;
    /// Partial update; `None` fields are left alone.
    type Patch: Send + 'static;

    /// Record id.
    fn id(&self) -> RecordId;
    /// Builds a record from a draft and a freshly allocated id.
    fn from_draft(id: RecordId, draft: Self::Draft) -> Self;
    /// Merges a patch into the record.
    fn apply(&mut self, patch: Self::Patch);
}

fn merge<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// A course of short lessons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    /// Course id.
    #[serde(rename = "Id")]
    pub id: RecordId,
    /// Title.
    pub title: String,
    /// Summary shown on the detail page.
    pub description: String,
    /// Category slug (`time-management`, `communication`, ...).
    pub category: String,
    /// Icon name.
    pub icon: String,
    /// Accent color.
    pub color: String,
    /// Total length in minutes.
    pub duration: u32,
    /// Number of lessons.
    pub total_lessons: u32,
    /// Instructor name.
    pub instructor: String,
}

/// Fields of a new course.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CourseDraft {
    /// Title.
    pub title: String,
    /// Summary.
    pub description: String,
    /// Category slug.
    pub category: String,
    /// Icon name.
    pub icon: String,
    /// Accent color.
    pub color: String,
    /// Total length in minutes.
    pub duration: u32,
    /// Number of lessons.
    pub total_lessons: u32,
    /// Instructor name.
    pub instructor: String,
}

/// Partial course update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CoursePatch {
    /// New title.
    pub title: Option<String>,
    /// New summary.
    pub description: Option<String>,
    /// New category.
    pub category: Option<String>,
    /// New length in minutes.
    pub duration: Option<u32>,
    /// New lesson count.
    pub total_lessons: Option<u32>,
    /// New instructor.
    pub instructor: Option<String>,
}

impl Record for Course {
    const KIND: &'static str = "Course";
    type Draft = CourseDraft;
    type Patch = CoursePatch;

    fn id(&self) -> RecordId {
        self.id
    }

    fn from_draft(id: RecordId, draft: CourseDraft) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            category: draft.category,
            icon: draft.icon,
            color: draft.color,
            duration: draft.duration,
            total_lessons: draft.total_lessons,
            instructor: draft.instructor,
        }
    }

    fn apply(&mut self, patch: CoursePatch) {
        merge(&mut self.title, patch.title);
        merge(&mut self.description, patch.description);
        merge(&mut self.category, patch.category);
        merge(&mut self.duration, patch.duration);
        merge(&mut self.total_lessons, patch.total_lessons);
        merge(&mut self.instructor, patch.instructor);
    }
}

/// One video lesson of a course.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    /// Lesson id.
    #[serde(rename = "Id")]
    pub id: RecordId,
    /// Owning course.
    pub course_id: RecordId,
    /// Title.
    pub title: String,
    /// Position within the course, starting at 1.
    pub order: u32,
    /// Length in minutes.
    pub duration: u32,
    /// Video location.
    pub video_url: String,
    /// Plain-text transcript.
    #[serde(default)]
    pub transcript: String,
}

/// Fields of a new lesson.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LessonDraft {
    /// Owning course.
    pub course_id: RecordId,
    /// Title.
    pub title: String,
    /// Position within the course.
    pub order: u32,
    /// Length in minutes.
    pub duration: u32,
    /// Video location.
    pub video_url: String,
    /// Transcript.
    pub transcript: String,
}

/// Partial lesson update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LessonPatch {
    /// New title.
    pub title: Option<String>,
    /// New position.
    pub order: Option<u32>,
    /// New length.
    pub duration: Option<u32>,
    /// New transcript.
    pub transcript: Option<String>,
}

impl Record for Lesson {
    const KIND: &'static str = "Lesson";
    type Draft = LessonDraft;
    type Patch = LessonPatch;

    fn id(&self) -> RecordId {
        self.id
    }

    fn from_draft(id: RecordId, draft: LessonDraft) -> Self {
        Self {
            id,
            course_id: draft.course_id,
            title: draft.title,
            order: draft.order,
            duration: draft.duration,
            video_url: draft.video_url,
            transcript: draft.transcript,
        }
    }

    fn apply(&mut self, patch: LessonPatch) {
        merge(&mut self.title, patch.title);
        merge(&mut self.order, patch.order);
        merge(&mut self.duration, patch.duration);
        merge(&mut self.transcript, patch.transcript);
    }
}

/// Multiple-choice question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    /// Prompt.
    pub question: String,
    /// Answer options.
    pub options: Vec<String>,
    /// Index of the right option.
    pub correct_answer: usize,
    /// Shown after answering.
    #[serde(default)]
    pub explanation: String,
}

impl QuizQuestion {
    /// Whether `choice` is the right option.
    #[must_use]
    pub const fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct_answer
    }
}

/// Quiz attached to a lesson.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    /// Quiz id.
    #[serde(rename = "Id")]
    pub id: RecordId,
    /// Lesson the quiz checks.
    pub lesson_id: RecordId,
    /// Title.
    pub title: String,
    /// Questions in order.
    pub questions: Vec<QuizQuestion>,
}

/// Fields of a new quiz.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizDraft {
    /// Lesson the quiz checks.
    pub lesson_id: RecordId,
    /// Title.
    pub title: String,
    /// Questions.
    pub questions: Vec<QuizQuestion>,
}

/// Partial quiz update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizPatch {
    /// New title.
    pub title: Option<String>,
    /// Replacement questions.
    pub questions: Option<Vec<QuizQuestion>>,
}

impl Record for Quiz {
    const KIND: &'static str = "Quiz";
    type Draft = QuizDraft;
    type Patch = QuizPatch;

    fn id(&self) -> RecordId {
        self.id
    }

    fn from_draft(id: RecordId, draft: QuizDraft) -> Self {
        Self {
            id,
            lesson_id: draft.lesson_id,
            title: draft.title,
            questions: draft.questions,
        }
    }

    fn apply(&mut self, patch: QuizPatch) {
        merge(&mut self.title, patch.title);
        merge(&mut self.questions, patch.questions);
    }
}

/// Reply under a forum post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ForumReply {
    /// Creation-time id in milliseconds.
    pub id: i64,
    /// Author.
    pub user_id: String,
    /// Body.
    pub content: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

/// Fields of a new reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReplyDraft {
    /// Author.
    pub user_id: String,
    /// Body.
    pub content: String,
}

/// Community forum post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ForumPost {
    /// Post id.
    #[serde(rename = "Id")]
    pub id: RecordId,
    /// Author.
    pub user_id: String,
    /// Title.
    pub title: String,
    /// Body.
    pub content: String,
    /// Category slug.
    pub category: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Upvote count.
    #[serde(default)]
    pub upvotes: u32,
    /// Replies, oldest first.
    #[serde(default)]
    pub replies: Vec<ForumReply>,
}

/// Fields of a new post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    /// Author.
    pub user_id: String,
    /// Title.
    pub title: String,
    /// Body.
    pub content: String,
    /// Category slug.
    pub category: String,
}

/// Partial post update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    /// New title.
    pub title: Option<String>,
    /// New body.
    pub content: Option<String>,
    /// New category.
    pub category: Option<String>,
}

impl Record for ForumPost {
    const KIND: &'static str = "Post";
    type Draft = PostDraft;
    type Patch = PostPatch;

    fn id(&self) -> RecordId {
        self.id
    }

    fn from_draft(id: RecordId, draft: PostDraft) -> Self {
        Self {
            id,
            user_id: draft.user_id,
            title: draft.title,
            content: draft.content,
            category: draft.category,
            timestamp: Utc::now(),
            upvotes: 0,
            replies: Vec::new(),
        }
    }

    fn apply(&mut self, patch: PostPatch) {
        merge(&mut self.title, patch.title);
        merge(&mut self.content, patch.content);
        merge(&mut self.category, patch.category);
    }
}

/// Progress of one learner through one course.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    /// Learner.
    pub user_id: String,
    /// Course.
    pub course_id: RecordId,
    /// Finished lesson ids, in completion order, without duplicates.
    #[serde(default)]
    pub completed_lessons: Vec<RecordId>,
    /// Latest quiz score per lesson id, in the order first recorded.
    #[serde(default)]
    pub quiz_scores: IndexMap<RecordId, u8>,
    /// Last time the record changed.
    pub last_accessed: DateTime<Utc>,
}

impl CourseProgress {
    /// Empty progress for `course_id`.
    #[must_use]
    pub fn started(user_id: impl Into<String>, course_id: RecordId) -> Self {
        Self {
            user_id: user_id.into(),
            course_id,
            completed_lessons: Vec::new(),
            quiz_scores: IndexMap::new(),
            last_accessed: Utc::now(),
        }
    }

    /// Number of finished lessons.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed_lessons.len()
    }
}

/// Onboarding answers plus streak, input to profile stats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LearnerProfile {
    /// Display name.
    pub name: String,
    /// `student` or `professional`.
    pub user_type: String,
    /// Preferred lesson length in minutes (`5`, `15`, `30`).
    pub preferred_duration: String,
    /// Focus areas picked during onboarding.
    pub goals: Vec<String>,
    /// Sign-up time.
    pub join_date: Option<DateTime<Utc>>,
    /// Consecutive learning days.
    pub streak: u32,
}

impl Default for LearnerProfile {
    fn default() -> Self {
        Self {
            name: "Learner".into(),
            user_type: "student".into(),
            preferred_duration: "15".into(),
            goals: Vec::new(),
            join_date: None,
            streak: 0,
        }
    }
}
