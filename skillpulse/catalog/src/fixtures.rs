use serde::de::DeserializeOwned;

use crate::{
    error::CatalogError,
    records::{Course, CourseProgress, ForumPost, Lesson, Quiz},
};

const COURSES: &str = include_str!("../fixtures/courses.json");
const LESSONS: &str = include_str!("../fixtures/lessons.json");
const QUIZZES: &str = include_str!("../fixtures/quizzes.json");
const FORUM: &str = include_str!("../fixtures/forum.json");
const PROGRESS: &str = include_str!("../fixtures/progress.json");

fn parse<T: DeserializeOwned>(name: &'static str, raw: &str) -> Result<Vec<T>, CatalogError> {
    serde_json::from_str(raw).map_err(|source| CatalogError::Fixture { name, source })
}

/// Bundled seed data, parsed fresh for every session.
#[derive(Debug, Clone)]
pub struct Fixtures {
    /// Courses.
    pub courses: Vec<Course>,
    /// Lessons of all courses.
    pub lessons: Vec<Lesson>,
    /// Lesson quizzes.
    pub quizzes: Vec<Quiz>,
    /// Forum posts with replies.
    pub posts: Vec<ForumPost>,
    /// Progress of the default learner.
    pub progress: Vec<CourseProgress>,
}

impl Fixtures {
    /// Parses the bundled JSON files.
    pub fn load() -> Result<Self, CatalogError> {
        Ok(Self {
            courses: parse("courses", COURSES)?,
            lessons: parse("lessons", LESSONS)?,
            quizzes: parse("quizzes", QUIZZES)?,
            posts: parse("forum", FORUM)?,
            progress: parse("progress", PROGRESS)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_fixtures_are_consistent() {
        let fixtures = Fixtures::load().unwrap();
        assert_eq!(fixtures.courses.len(), 5);
        for course in &fixtures.courses {
            let lessons = fixtures
                .lessons
                .iter()
                .filter(|lesson| lesson.course_id == course.id)
                .count();
            assert_eq!(lessons, course.total_lessons as usize, "{}", course.title);
        }
        for quiz in &fixtures.quizzes {
            assert!(fixtures.lessons.iter().any(|lesson| lesson.id == quiz.lesson_id));
            for question in &quiz.questions {
                assert!(question.correct_answer < question.options.len());
            }
        }
        assert!(fixtures.progress.iter().all(|p| p.user_id == "user_1"));
    }

    #[test]
    fn bad_fixture_is_reported_by_name() {
        let err = parse::<Course>("courses", "[{").unwrap_err();
        assert!(err.to_string().starts_with("invalid courses fixture"));
    }
}
