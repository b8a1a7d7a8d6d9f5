use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ContentError;
use crate::model::assessment::{Score, Submission, Test};
use crate::model::ids::{LessonNumber, UnitNumber, UserId};
use crate::model::lesson::{Lesson, validate_lessons};
use crate::model::progress::{
    ProgressError, StaleAggregate, answer_knowledge_check, completed_lessons, find_lesson_mut,
    record_attempt,
};
use crate::model::question::{Grade, MatchPolicy, Response};
use crate::model::text::{child_location, require_text};
use crate::model::wire::{is_zero, lenient_bool, null_as_default};

//
// ─── UNIT ──────────────────────────────────────────────────────────────────────
//

/// A course unit: ordered lessons plus a unit test.
///
/// `completed` is a cache over the lesson statuses and test attempts; it is
/// written only by recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub unit_number: UnitNumber,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    lessons: Vec<Lesson>,
    pub unit_test: Test,
    #[serde(
        default,
        deserialize_with = "lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    completed: Option<bool>,
    #[serde(default, skip_serializing_if = "is_zero")]
    unit_test_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    best_test_score: Option<u8>,
}

impl Unit {
    #[must_use]
    pub fn new(unit_number: UnitNumber, title: impl Into<String>, lessons: Vec<Lesson>, unit_test: Test) -> Self {
        let mut unit = Self {
            unit_number,
            title: title.into(),
            description: String::new(),
            lessons,
            unit_test,
            completed: None,
            unit_test_attempts: 0,
            best_test_score: None,
        };
        unit.recompute();
        unit
    }

    /// Cached completion flag; `false` if never computed.
    #[must_use]
    pub fn completed(&self) -> bool {
        self.completed.unwrap_or(false)
    }

    #[must_use]
    pub fn unit_test_attempts(&self) -> u32 {
        self.unit_test_attempts
    }

    #[must_use]
    pub fn best_test_score(&self) -> Option<u8> {
        self.best_test_score
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    #[must_use]
    pub fn completed_lessons(&self) -> u32 {
        completed_lessons(&self.lessons)
    }

    /// Complete when every lesson is complete and the unit test was attempted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unit_test_attempts > 0 && self.lessons.iter().all(Lesson::is_complete)
    }

    fn recompute(&mut self) -> Option<StaleAggregate> {
        let recomputed = self.is_complete();
        let stale = StaleAggregate::check(self.location(), "completed", self.completed, recomputed);
        self.completed = Some(recomputed);
        stale
    }

    fn location(&self) -> String {
        format!("unit {}", self.unit_number)
    }

    fn validate(&self) -> Result<(), ContentError> {
        let location = self.location();
        require_text(&self.title, &location, "title")?;
        validate_lessons(&self.lessons, &location)?;
        self.unit_test
            .validate(&child_location(&location, "unit test"))?;
        check_score(&location, "best_test_score", self.best_test_score)
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// A generated course and the learner's progress through it.
///
/// Progress changes only through the methods below; each one recomputes the
/// touched unit's `completed` flag and then `completed_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub estimated_duration_hours_per_week: u32,
    #[serde(default)]
    pub estimated_number_of_weeks: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub prerequisites: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub level: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub depth: String,
    units: Vec<Unit>,
    pub final_exam: Test,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_draft: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_count: Option<u32>,
    #[serde(default, skip_serializing_if = "is_zero")]
    final_exam_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    best_final_exam_score: Option<u8>,
}

impl Course {
    #[must_use]
    pub fn new(title: impl Into<String>, units: Vec<Unit>, final_exam: Test) -> Self {
        let mut course = Self {
            user_id: None,
            title: title.into(),
            description: String::new(),
            estimated_duration_hours_per_week: 0,
            estimated_number_of_weeks: 0,
            prerequisites: Vec::new(),
            level: String::new(),
            depth: String::new(),
            units,
            final_exam,
            is_draft: None,
            created_at: None,
            last_accessed: None,
            completed_count: None,
            final_exam_attempts: 0,
            best_final_exam_score: None,
        };
        course.refresh_aggregates();
        course
    }

    /// Check every structural invariant of the course.
    ///
    /// # Errors
    ///
    /// Returns the first violation, located by unit, lesson and question.
    pub fn validate(&self) -> Result<(), ContentError> {
        require_text(&self.title, "course", "title")?;

        let mut seen = HashSet::with_capacity(self.units.len());
        for unit in &self.units {
            if unit.unit_number.value() == 0 {
                return Err(ContentError::InvalidUnitNumber {
                    location: unit.location(),
                });
            }
            if !seen.insert(unit.unit_number) {
                return Err(ContentError::DuplicateUnitNumber {
                    location: "course".to_string(),
                    number: unit.unit_number,
                });
            }
            unit.validate()?;
        }

        self.final_exam.validate("final exam")?;
        check_score("course", "best_final_exam_score", self.best_final_exam_score)
    }

    /// Number of complete units, as last recomputed.
    #[must_use]
    pub fn completed_count(&self) -> u32 {
        self.completed_count.unwrap_or(0)
    }

    #[must_use]
    pub fn final_exam_attempts(&self) -> u32 {
        self.final_exam_attempts
    }

    #[must_use]
    pub fn best_final_exam_score(&self) -> Option<u8> {
        self.best_final_exam_score
    }

    /// Units as generated, in payload order.
    #[must_use]
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    #[must_use]
    pub fn unit(&self, number: UnitNumber) -> Option<&Unit> {
        self.units.iter().find(|unit| unit.unit_number == number)
    }

    /// Units in `unit_number` order.
    #[must_use]
    pub fn ordered_units(&self) -> Vec<&Unit> {
        let mut units: Vec<&Unit> = self.units.iter().collect();
        units.sort_by_key(|unit| unit.unit_number);
        units
    }

    /// Recompute every cached aggregate from the leaf facts.
    ///
    /// Returns one diagnostic per cached value that disagreed.
    pub fn refresh_aggregates(&mut self) -> Vec<StaleAggregate> {
        let mut stale: Vec<StaleAggregate> = self.units.iter_mut().filter_map(Unit::recompute).collect();
        stale.extend(self.recount());
        stale
    }

    /// Marks a lesson in progress.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the unit or lesson does not exist.
    pub fn open_lesson(&mut self, unit: UnitNumber, lesson: LessonNumber) -> Result<(), ProgressError> {
        self.with_lesson(unit, lesson, |lesson| {
            lesson.open();
            Ok(())
        })
    }

    /// Marks a lesson completed without answering its knowledge check.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the unit or lesson does not exist.
    pub fn mark_lesson_read(&mut self, unit: UnitNumber, lesson: LessonNumber) -> Result<(), ProgressError> {
        self.with_lesson(unit, lesson, |lesson| {
            lesson.complete();
            Ok(())
        })
    }

    /// Grades a lesson's knowledge check and completes the lesson.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` for unknown numbers or a mis-shaped response;
    /// the course is unchanged in both cases.
    pub fn answer_knowledge_check(
        &mut self,
        unit: UnitNumber,
        lesson: LessonNumber,
        response: &Response,
        policy: MatchPolicy,
    ) -> Result<Grade, ProgressError> {
        self.with_lesson(unit, lesson, |lesson| answer_knowledge_check(lesson, response, policy))
    }

    /// Scores a unit test submission and records the attempt.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` for an unknown unit or a mis-shaped answer.
    pub fn record_unit_test(
        &mut self,
        unit: UnitNumber,
        submission: &Submission,
        policy: MatchPolicy,
    ) -> Result<Score, ProgressError> {
        let target = self.unit_mut(unit)?;
        let score = target.unit_test.score(submission, policy)?;
        record_attempt(&mut target.unit_test_attempts, &mut target.best_test_score, &score);
        target.recompute();
        self.recount();
        Ok(score)
    }

    /// Scores a final exam submission and records the attempt.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::ShapeMismatch` for a mis-shaped answer.
    pub fn record_final_exam(&mut self, submission: &Submission, policy: MatchPolicy) -> Result<Score, ProgressError> {
        let score = self.final_exam.score(submission, policy)?;
        record_attempt(&mut self.final_exam_attempts, &mut self.best_final_exam_score, &score);
        Ok(score)
    }

    fn unit_mut(&mut self, number: UnitNumber) -> Result<&mut Unit, ProgressError> {
        self.units
            .iter_mut()
            .find(|unit| unit.unit_number == number)
            .ok_or(ProgressError::UnitNotFound(number))
    }

    fn with_lesson<T>(
        &mut self,
        unit: UnitNumber,
        lesson: LessonNumber,
        apply: impl FnOnce(&mut Lesson) -> Result<T, ProgressError>,
    ) -> Result<T, ProgressError> {
        let target = self.unit_mut(unit)?;
        let result = apply(find_lesson_mut(&mut target.lessons, lesson)?)?;
        target.recompute();
        self.recount();
        Ok(result)
    }

    fn recount(&mut self) -> Option<StaleAggregate> {
        let count = self.units.iter().filter(|unit| unit.completed()).count();
        let recomputed = u32::try_from(count).unwrap_or(u32::MAX);
        let stale = StaleAggregate::check("course", "completed_count", self.completed_count, recomputed);
        self.completed_count = Some(recomputed);
        stale
    }
}

pub(crate) fn check_score(location: &str, field: &'static str, score: Option<u8>) -> Result<(), ContentError> {
    match score {
        Some(value) if value > 100 => Err(ContentError::InvalidScore {
            location: location.to_string(),
            field,
            value,
        }),
        _ => Ok(()),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::lesson::LessonStatus;
    use crate::model::question::{Question, Verdict};

    fn test_with(question: Question) -> Test {
        Test {
            title: "Check".into(),
            instructions: String::new(),
            questions: vec![question],
        }
    }

    fn lesson(number: u32) -> Lesson {
        Lesson::new(
            LessonNumber::new(number),
            format!("Lesson {number}"),
            Question::multiple_choice("Pick a", vec!["a".into(), "b".into()], "a").unwrap(),
        )
    }

    fn unit(number: u32, lessons: u32) -> Unit {
        Unit::new(
            UnitNumber::new(number),
            format!("Unit {number}"),
            (1..=lessons).map(lesson).collect(),
            test_with(Question::true_or_false("Done?", true).unwrap()),
        )
    }

    fn course() -> Course {
        Course::new(
            "Rust",
            vec![unit(1, 2), unit(2, 1)],
            test_with(Question::short_answer("Summarize", "Ownership").unwrap()),
        )
    }

    fn pass() -> Submission {
        Submission::new(vec![Some(Response::Boolean(true))])
    }

    const U1: UnitNumber = UnitNumber::new(1);

    #[test]
    fn unit_completes_after_lessons_and_test() {
        let mut c = course();
        assert!(!c.unit(U1).unwrap().completed());

        for n in [1, 2] {
            c.answer_knowledge_check(U1, LessonNumber::new(n), &Response::text("b"), MatchPolicy::default())
                .unwrap();
        }
        assert!(!c.unit(U1).unwrap().completed());
        assert_eq!(c.completed_count(), 0);

        c.record_unit_test(U1, &pass(), MatchPolicy::default()).unwrap();
        assert!(c.unit(U1).unwrap().completed());
        assert_eq!(c.completed_count(), 1);
    }

    #[test]
    fn test_first_then_lessons_also_completes() {
        let mut c = course();
        let u2 = UnitNumber::new(2);
        c.record_unit_test(u2, &Submission::default(), MatchPolicy::default()).unwrap();
        assert!(!c.unit(u2).unwrap().completed());
        c.mark_lesson_read(u2, LessonNumber::new(1)).unwrap();
        assert!(c.unit(u2).unwrap().completed());
        assert_eq!(c.unit(u2).unwrap().unit_test_attempts(), 1);
        assert_eq!(c.unit(u2).unwrap().best_test_score(), Some(0));
    }

    #[test]
    fn lessonless_unit_completes_on_test_attempt() {
        let mut c = Course::new(
            "Tiny",
            vec![unit(1, 0)],
            test_with(Question::true_or_false("ok", true).unwrap()),
        );
        assert!(!c.unit(U1).unwrap().completed());
        c.record_unit_test(U1, &pass(), MatchPolicy::default()).unwrap();
        assert_eq!(c.completed_count(), 1);
    }

    #[test]
    fn knowledge_check_returns_grade_and_completes_on_wrong_answer() {
        let mut c = course();
        let grade = c
            .answer_knowledge_check(U1, LessonNumber::new(1), &Response::text("b"), MatchPolicy::default())
            .unwrap();
        assert_eq!(grade.verdict, Verdict::Incorrect);
        assert_eq!(grade.canonical_answer, "a");
        let status = c.unit(U1).unwrap().lessons()[0].status();
        assert_eq!(status, Some(LessonStatus::Completed));
    }

    #[test]
    fn views_track_progress_made_through_methods() {
        let mut c = course();
        assert_eq!(c.units().len(), 2);
        assert_eq!(c.units()[0].lessons().len(), 2);

        c.mark_lesson_read(U1, LessonNumber::new(1)).unwrap();
        c.mark_lesson_read(U1, LessonNumber::new(2)).unwrap();
        c.record_unit_test(U1, &pass(), MatchPolicy::default()).unwrap();

        let unit = &c.units()[0];
        assert!(unit.lessons().iter().all(Lesson::is_complete));
        assert!(unit.completed());
        let recounted = c.units().iter().filter(|u| u.is_complete()).count() as u32;
        assert_eq!(c.completed_count(), recounted);
    }

    #[test]
    fn failed_mutations_change_nothing() {
        let mut c = course();
        let before = c.clone();
        assert_eq!(
            c.open_lesson(UnitNumber::new(9), LessonNumber::new(1)),
            Err(ProgressError::UnitNotFound(UnitNumber::new(9)))
        );
        assert_eq!(
            c.mark_lesson_read(U1, LessonNumber::new(7)),
            Err(ProgressError::LessonNotFound(LessonNumber::new(7)))
        );
        let mismatch =
            c.answer_knowledge_check(U1, LessonNumber::new(1), &Response::Boolean(true), MatchPolicy::default());
        assert!(matches!(mismatch, Err(ProgressError::ShapeMismatch(_))));
        let bad_test = c.record_unit_test(U1, &Submission::new(vec![Some(Response::text("yes"))]), MatchPolicy::default());
        assert!(bad_test.is_err());
        assert_eq!(c, before);
    }

    #[test]
    fn open_lesson_sets_in_progress() {
        let mut c = course();
        c.open_lesson(U1, LessonNumber::new(2)).unwrap();
        assert_eq!(c.unit(U1).unwrap().lessons[1].status(), Some(LessonStatus::InProgress));
    }

    #[test]
    fn final_exam_tracks_best_score_and_pending() {
        let mut c = course();
        let pending = c
            .record_final_exam(&Submission::new(vec![Some(Response::text("moves"))]), MatchPolicy::default())
            .unwrap();
        assert_eq!(pending.pending_count, 1);
        assert_eq!(c.best_final_exam_score(), None);

        let graded = Submission::new(vec![Some(Response::text("moves"))]).with_verdict(0, true);
        c.record_final_exam(&graded, MatchPolicy::default()).unwrap();
        assert_eq!(c.final_exam_attempts(), 2);
        assert_eq!(c.best_final_exam_score(), Some(100));
    }

    #[test]
    fn refresh_reports_and_fixes_stale_caches() {
        let mut c = course();
        c.completed_count = Some(2);
        c.units[1].completed = Some(true);
        let stale = c.refresh_aggregates();
        assert_eq!(stale.len(), 2);
        assert_eq!(stale[0].location, "unit 2");
        assert_eq!(stale[1].field, "completed_count");
        assert_eq!(c.completed_count(), 0);
        assert!(c.refresh_aggregates().is_empty());
    }

    #[test]
    fn duplicate_units_are_malformed() {
        let c = Course::new(
            "Dup",
            vec![unit(1, 1), unit(1, 1)],
            test_with(Question::true_or_false("ok", true).unwrap()),
        );
        assert!(matches!(c.validate(), Err(ContentError::DuplicateUnitNumber { .. })));
    }

    #[test]
    fn knowledge_check_violations_are_located() {
        let mut c = course();
        c.units[1].lessons[0].knowledge_check = Question::MultipleChoice {
            question: "Pick".into(),
            answer_choices: vec!["x".into()],
            answer: "y".into(),
        };
        assert_eq!(
            c.validate().unwrap_err().to_string(),
            "unit 2, lesson 1, knowledge check: answer \"y\" is not one of the answer choices"
        );
    }

    #[test]
    fn ordered_units_sort_by_number() {
        let c = Course::new(
            "Order",
            vec![unit(3, 0), unit(1, 0)],
            test_with(Question::true_or_false("ok", true).unwrap()),
        );
        let numbers: Vec<u32> = c.ordered_units().iter().map(|u| u.unit_number.value()).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[test]
    fn stringly_completed_flag_is_read() {
        let json = serde_json::json!({
            "unit_number": 1,
            "title": "U",
            "description": "",
            "lessons": [],
            "unit_test": {"title": "T", "questions": [{"question": "q", "answer": true}]},
            "completed": "true"
        });
        let mut u: Unit = serde_json::from_value(json).unwrap();
        assert!(u.completed());
        assert!(u.recompute().is_some());
    }
}
