//! Numbers derived from catalog records: progress percentages, course
//! grouping and search, quiz scoring, profile stats, achievements, forum
//! ordering and the daily tip.

use std::cmp::Reverse;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use shared_event_bus::Notice;

use crate::records::{Course, CourseProgress, ForumPost, LearnerProfile, Quiz, QuizQuestion};

/// Category filter value that keeps everything.
pub const ALL_CATEGORIES: &str = "all";

/// Tips rotated on the home screen, one per day.
pub const DAILY_TIPS: [&str; 8] = [
    "Start your day with a 5-minute reflection on your communication goals.",
    "Practice active listening in your next conversation.",
    "Set three priority tasks for today using the 80/20 rule.",
    "Take a moment to check your posture and body language.",
    "Review your weekly budget and track one expense category.",
    "Practice speaking clearly and confidently in front of a mirror.",
    "Use the Pomodoro technique for your most challenging task today.",
    "Ask yourself: 'What's the most important thing I can do right now?'",
];

#[allow(clippy::cast_precision_loss)]
fn ratio_percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 100.0).min(100.0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn unrounded_course_percent(course: &Course, progress: &[CourseProgress]) -> f64 {
    progress
        .iter()
        .find(|record| record.course_id == course.id)
        .map_or(0.0, |record| {
            ratio_percent(record.completed_count(), course.total_lessons as usize)
        })
}

fn matches_search(haystacks: &[&str], search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    needle.is_empty()
        || haystacks
            .iter()
            .any(|haystack| haystack.to_lowercase().contains(&needle))
}

fn in_category(category: &str, wanted: &str) -> bool {
    wanted == ALL_CATEGORIES || category == wanted
}

/// Completed share of a course's lessons, rounded to a whole percent.
#[must_use]
pub fn course_progress_percent(course: &Course, progress: &[CourseProgress]) -> u8 {
    round_percent(unrounded_course_percent(course, progress))
}

/// Mean completion over every course, untouched courses counting as 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn overall_progress(courses: &[Course], progress: &[CourseProgress]) -> u8 {
    if courses.is_empty() {
        return 0;
    }
    let total: f64 = courses
        .iter()
        .map(|course| unrounded_course_percent(course, progress))
        .sum();
    round_percent(total / courses.len() as f64)
}

/// Courses split by completion state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseGroups<'a> {
    /// Started but not finished.
    pub in_progress: Vec<&'a Course>,
    /// Every lesson done.
    pub completed: Vec<&'a Course>,
    /// Nothing done yet.
    pub not_started: Vec<&'a Course>,
}

/// Splits `courses` into in-progress, completed and not-started groups.
#[must_use]
pub fn group_by_progress<'a>(
    courses: &[&'a Course],
    progress: &[CourseProgress],
) -> CourseGroups<'a> {
    let mut groups = CourseGroups::default();
    for &course in courses {
        match course_progress_percent(course, progress) {
            0 => groups.not_started.push(course),
            100 => groups.completed.push(course),
            _ => groups.in_progress.push(course),
        }
    }
    groups
}

/// Courses in `category` (or all) whose title or category contains `search`.
#[must_use]
pub fn filter_courses<'a>(courses: &'a [Course], category: &str, search: &str) -> Vec<&'a Course> {
    courses
        .iter()
        .filter(|course| in_category(&course.category, category))
        .filter(|course| matches_search(&[course.title.as_str(), course.category.as_str()], search))
        .collect()
}

/// First three started, unfinished courses.
#[must_use]
pub fn in_progress_courses<'a>(courses: &'a [Course], progress: &[CourseProgress]) -> Vec<&'a Course> {
    courses
        .iter()
        .filter(|course| {
            let percent = course_progress_percent(course, progress);
            percent > 0 && percent < 100
        })
        .take(3)
        .collect()
}

/// First three courses with no progress.
#[must_use]
pub fn recommended_courses<'a>(courses: &'a [Course], progress: &[CourseProgress]) -> Vec<&'a Course> {
    courses
        .iter()
        .filter(|course| course_progress_percent(course, progress) == 0)
        .take(3)
        .collect()
}

/// Quiz result band.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Grade {
    /// 80 and above.
    Excellent,
    /// 60 to 79.
    Good,
    /// Below 60.
    KeepLearning,
}

impl Grade {
    /// Band for a percentage score.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        if score >= 80 {
            Self::Excellent
        } else if score >= 60 {
            Self::Good
        } else {
            Self::KeepLearning
        }
    }

    /// Heading shown with the result.
    #[must_use]
    pub const fn headline(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent!",
            Self::Good => "Good Job!",
            Self::KeepLearning => "Keep Learning!",
        }
    }
}

/// One pass through a quiz, answered question by question.
#[derive(Debug, Clone)]
pub struct QuizAttempt<'q> {
    quiz: &'q Quiz,
    answers: Vec<bool>,
}

impl<'q> QuizAttempt<'q> {
    /// Starts at the first question.
    #[must_use]
    pub const fn new(quiz: &'q Quiz) -> Self {
        Self {
            quiz,
            answers: Vec::new(),
        }
    }

    /// Quiz being taken.
    #[must_use]
    pub const fn quiz(&self) -> &'q Quiz {
        self.quiz
    }

    /// Question waiting for an answer.
    #[must_use]
    pub fn current_question(&self) -> Option<&'q QuizQuestion> {
        self.quiz.questions.get(self.answers.len())
    }

    /// Answers the current question; `None` once every question is answered.
    pub fn answer(&mut self, choice: usize) -> Option<bool> {
        let correct = self.current_question()?.is_correct(choice);
        self.answers.push(correct);
        Some(correct)
    }

    /// Whether every question has an answer.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.answers.len() >= self.quiz.questions.len()
    }

    /// Right answers so far.
    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.answers.iter().filter(|correct| **correct).count()
    }

    /// Right answers over all questions, as a whole percent.
    #[must_use]
    pub fn score(&self) -> u8 {
        round_percent(ratio_percent(
            self.correct_count(),
            self.quiz.questions.len(),
        ))
    }

    /// Band of the current score.
    #[must_use]
    pub fn grade(&self) -> Grade {
        Grade::from_score(self.score())
    }

    /// Notice announcing the score.
    #[must_use]
    pub fn notice(&self) -> Notice {
        let score = self.score();
        match self.grade() {
            Grade::Excellent => Notice::success(format!("Excellent! You scored {score}%")),
            Grade::Good => Notice::success(format!("Good job! You scored {score}%")),
            Grade::KeepLearning => Notice::warning(format!(
                "You scored {score}%. Consider reviewing the lesson."
            )),
        }
    }

    /// Clears every answer.
    pub fn retake(&mut self) {
        self.answers.clear();
    }
}

/// Totals shown on the profile screen.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    /// Courses in the catalog.
    pub total_courses: usize,
    /// Courses with every lesson done.
    pub completed_courses: usize,
    /// Lessons across all courses.
    pub total_lessons: usize,
    /// Lessons done across all courses.
    pub completed_lessons: usize,
    /// Completed lessons over total lessons, whole percent.
    pub overall_progress: u8,
    /// Sign-up time (falls back to now).
    pub join_date: DateTime<Utc>,
    /// Consecutive learning days.
    pub streak: u32,
}

/// Computes profile totals.
#[must_use]
pub fn profile_stats(
    profile: &LearnerProfile,
    courses: &[Course],
    progress: &[CourseProgress],
) -> ProfileStats {
    let completed_courses = progress
        .iter()
        .filter(|record| {
            courses
                .iter()
                .find(|course| course.id == record.course_id)
                .is_some_and(|course| record.completed_count() == course.total_lessons as usize)
        })
        .count();
    let total_lessons = courses
        .iter()
        .map(|course| course.total_lessons as usize)
        .sum();
    let completed_lessons = progress.iter().map(CourseProgress::completed_count).sum();
    ProfileStats {
        total_courses: courses.len(),
        completed_courses,
        total_lessons,
        completed_lessons,
        overall_progress: round_percent(ratio_percent(completed_lessons, total_lessons)),
        join_date: profile.join_date.unwrap_or_else(Utc::now),
        streak: profile.streak,
    }
}

/// Badge earned through learning activity.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Achievement {
    /// Stable id.
    pub id: &'static str,
    /// Title.
    pub title: &'static str,
    /// How to earn it.
    pub description: &'static str,
    /// Icon name.
    pub icon: &'static str,
}

/// Every achievement, in display order.
pub const ACHIEVEMENTS: [Achievement; 5] = [
    Achievement {
        id: "first-lesson",
        title: "First Steps",
        description: "Complete your first lesson",
        icon: "Play",
    },
    Achievement {
        id: "course-complete",
        title: "Course Master",
        description: "Complete a full course",
        icon: "BookOpen",
    },
    Achievement {
        id: "quiz-ace",
        title: "Quiz Ace",
        description: "Score 100% on a quiz",
        icon: "Trophy",
    },
    Achievement {
        id: "streak-week",
        title: "Consistent Learner",
        description: "Learn for 7 days straight",
        icon: "Calendar",
    },
    Achievement {
        id: "community-helper",
        title: "Community Helper",
        description: "Help others in the community",
        icon: "Users",
    },
];

/// Achievements `user_id` has earned.
#[must_use]
pub fn unlocked_achievements(
    stats: &ProfileStats,
    progress: &[CourseProgress],
    posts: &[ForumPost],
    user_id: &str,
) -> Vec<Achievement> {
    let aced = progress
        .iter()
        .any(|record| record.quiz_scores.values().any(|score| *score == 100));
    let helped = posts
        .iter()
        .flat_map(|post| &post.replies)
        .any(|reply| reply.user_id == user_id && !reply.content.trim().is_empty());
    ACHIEVEMENTS
        .into_iter()
        .filter(|achievement| match achievement.id {
            "first-lesson" => stats.completed_lessons > 0,
            "course-complete" => stats.completed_courses > 0,
            "quiz-ace" => aced,
            "streak-week" => stats.streak >= 7,
            "community-helper" => helped,
            _ => false,
        })
        .collect()
}

/// Posts in `category` (or all) matching `search` in title or body, most
/// upvoted first, newest first among ties.
#[must_use]
pub fn filter_posts<'a>(posts: &'a [ForumPost], category: &str, search: &str) -> Vec<&'a ForumPost> {
    let mut filtered: Vec<&ForumPost> = posts
        .iter()
        .filter(|post| in_category(&post.category, category))
        .filter(|post| matches_search(&[post.title.as_str(), post.content.as_str()], search))
        .collect();
    filtered.sort_by_key(|post| (Reverse(post.upvotes), Reverse(post.timestamp)));
    filtered
}

/// Up to five upvoted posts, most upvoted first.
#[must_use]
pub fn trending_posts(posts: &[ForumPost]) -> Vec<&ForumPost> {
    let mut upvoted: Vec<&ForumPost> = posts.iter().filter(|post| post.upvotes > 0).collect();
    upvoted.sort_by_key(|post| Reverse(post.upvotes));
    upvoted.truncate(5);
    upvoted
}

/// Sum of upvotes over `posts`.
#[must_use]
pub fn total_upvotes(posts: &[ForumPost]) -> u32 {
    posts.iter().map(|post| post.upvotes).sum()
}

/// Tip of the day, rotating by day of year.
#[must_use]
pub fn daily_tip(date: NaiveDate) -> &'static str {
    DAILY_TIPS[date.ordinal() as usize % DAILY_TIPS.len()]
}
