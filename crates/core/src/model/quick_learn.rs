use serde::{Deserialize, Serialize};

use crate::error::ContentError;
use crate::model::assessment::{Score, Submission, Test};
use crate::model::course::check_score;
use crate::model::ids::{LessonNumber, UserId};
use crate::model::lesson::{Lesson, validate_lessons};
use crate::model::progress::{
    ProgressError, StaleAggregate, answer_knowledge_check, completed_lessons, find_lesson_mut,
    record_attempt,
};
use crate::model::question::{Grade, MatchPolicy, Response};
use crate::model::text::require_text;
use crate::model::wire::{is_zero, null_as_default};

/// A short single-topic course: flat lessons plus one assessment.
///
/// The cached `completed_count` is the number of completed lessons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickLearn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub level: String,
    #[serde(default)]
    pub estimated_duration_minutes: u32,
    lessons: Vec<Lesson>,
    pub assessment: Test,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_count: Option<u32>,
    #[serde(default, skip_serializing_if = "is_zero")]
    assessment_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    best_test_score: Option<u8>,
}

impl QuickLearn {
    #[must_use]
    pub fn new(title: impl Into<String>, lessons: Vec<Lesson>, assessment: Test) -> Self {
        let mut quick_learn = Self {
            user_id: None,
            title: title.into(),
            description: String::new(),
            level: String::new(),
            estimated_duration_minutes: 0,
            lessons,
            assessment,
            created_at: None,
            last_accessed: None,
            completed_count: None,
            assessment_attempts: 0,
            best_test_score: None,
        };
        quick_learn.refresh_aggregates();
        quick_learn
    }

    /// # Errors
    ///
    /// Returns the first structural violation found.
    pub fn validate(&self) -> Result<(), ContentError> {
        require_text(&self.title, "quick learn", "title")?;
        validate_lessons(&self.lessons, "quick learn")?;
        self.assessment.validate("assessment")?;
        check_score("quick learn", "best_test_score", self.best_test_score)
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    #[must_use]
    pub fn completed_count(&self) -> u32 {
        self.completed_count.unwrap_or(0)
    }

    #[must_use]
    pub fn assessment_attempts(&self) -> u32 {
        self.assessment_attempts
    }

    #[must_use]
    pub fn best_test_score(&self) -> Option<u8> {
        self.best_test_score
    }

    pub fn refresh_aggregates(&mut self) -> Vec<StaleAggregate> {
        self.recount().into_iter().collect()
    }

    /// # Errors
    ///
    /// Returns `ProgressError::LessonNotFound` for an unknown lesson.
    pub fn open_lesson(&mut self, lesson: LessonNumber) -> Result<(), ProgressError> {
        find_lesson_mut(&mut self.lessons, lesson)?.open();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ProgressError::LessonNotFound` for an unknown lesson.
    pub fn mark_lesson_read(&mut self, lesson: LessonNumber) -> Result<(), ProgressError> {
        find_lesson_mut(&mut self.lessons, lesson)?.complete();
        self.recount();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ProgressError` for an unknown lesson or a mis-shaped response.
    pub fn answer_knowledge_check(
        &mut self,
        lesson: LessonNumber,
        response: &Response,
        policy: MatchPolicy,
    ) -> Result<Grade, ProgressError> {
        let grade = answer_knowledge_check(find_lesson_mut(&mut self.lessons, lesson)?, response, policy)?;
        self.recount();
        Ok(grade)
    }

    /// Scores the assessment and records the attempt.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::ShapeMismatch` for a mis-shaped answer.
    pub fn record_assessment(&mut self, submission: &Submission, policy: MatchPolicy) -> Result<Score, ProgressError> {
        let score = self.assessment.score(submission, policy)?;
        record_attempt(&mut self.assessment_attempts, &mut self.best_test_score, &score);
        Ok(score)
    }

    fn recount(&mut self) -> Option<StaleAggregate> {
        let recomputed = completed_lessons(&self.lessons);
        let stale = StaleAggregate::check("quick learn", "completed_count", self.completed_count, recomputed);
        self.completed_count = Some(recomputed);
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::Question;

    fn quick_learn() -> QuickLearn {
        let lessons = (1..=3)
            .map(|n| {
                Lesson::new(
                    LessonNumber::new(n),
                    format!("Step {n}"),
                    Question::fill_in_the_blank("cargo ___", vec![], "build").unwrap(),
                )
            })
            .collect();
        QuickLearn::new(
            "Cargo basics",
            lessons,
            Test {
                title: "Wrap up".into(),
                instructions: String::new(),
                questions: vec![Question::true_or_false("cargo is a build tool", true).unwrap()],
            },
        )
    }

    #[test]
    fn completed_count_tracks_lessons() {
        let mut q = quick_learn();
        assert_eq!(q.completed_count(), 0);
        q.answer_knowledge_check(LessonNumber::new(1), &Response::text("run"), MatchPolicy::default())
            .unwrap();
        q.mark_lesson_read(LessonNumber::new(3)).unwrap();
        q.open_lesson(LessonNumber::new(2)).unwrap();
        assert_eq!(q.completed_count(), 2);
        assert!(q.refresh_aggregates().is_empty());
    }

    #[test]
    fn unknown_lesson_is_reported() {
        let mut q = quick_learn();
        assert_eq!(
            q.mark_lesson_read(LessonNumber::new(9)),
            Err(ProgressError::LessonNotFound(LessonNumber::new(9)))
        );
    }

    #[test]
    fn assessment_attempts_keep_best_score() {
        let mut q = quick_learn();
        q.record_assessment(&Submission::new(vec![Some(Response::Boolean(true))]), MatchPolicy::default())
            .unwrap();
        q.record_assessment(&Submission::new(vec![Some(Response::Boolean(false))]), MatchPolicy::default())
            .unwrap();
        assert_eq!(q.assessment_attempts(), 2);
        assert_eq!(q.best_test_score(), Some(100));
    }

    #[test]
    fn stale_count_from_payload_is_corrected() {
        let mut q = quick_learn();
        q.completed_count = Some(3);
        let stale = q.refresh_aggregates();
        assert_eq!(stale.len(), 1);
        assert_eq!(q.completed_count(), 0);
    }

    #[test]
    fn optional_instructions_are_accepted() {
        let json = serde_json::json!({
            "title": "Q",
            "description": "d",
            "level": "beginner",
            "estimated_duration_minutes": 60,
            "lessons": [],
            "assessment": {"title": "A", "questions": [{"question": "q", "answer_choices": ["a", "b"], "answer": "a"}]}
        });
        let q: QuickLearn = serde_json::from_value(json).unwrap();
        assert!(q.validate().is_ok());
        assert_eq!(q.assessment.instructions, "");
    }
}
