use std::fmt;

use thiserror::Error;

use crate::model::assessment::Score;
use crate::model::ids::{LessonNumber, UnitNumber};
use crate::model::lesson::Lesson;
use crate::model::question::{Grade, MatchPolicy, Response, ShapeMismatch};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// A progress mutation could not be applied. Nothing was changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("unit {0} not found")]
    UnitNotFound(UnitNumber),

    #[error("lesson {0} not found")]
    LessonNotFound(LessonNumber),

    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatch),
}

//
// ─── DIAGNOSTICS ───────────────────────────────────────────────────────────────
//

/// A cached aggregate disagreed with its from-scratch recomputation.
///
/// The recomputed value has already replaced the cache when this is reported.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{location}: cached {field} was {cached}, recomputed {recomputed}")]
pub struct StaleAggregate {
    pub location: String,
    pub field: &'static str,
    pub cached: String,
    pub recomputed: String,
}

impl StaleAggregate {
    /// Compares a cached value with its recomputation; unset caches are not stale.
    pub(crate) fn check<T>(
        location: impl Into<String>,
        field: &'static str,
        cached: Option<T>,
        recomputed: T,
    ) -> Option<Self>
    where
        T: PartialEq + fmt::Display,
    {
        match cached {
            Some(cached) if cached != recomputed => Some(Self {
                location: location.into(),
                field,
                cached: cached.to_string(),
                recomputed: recomputed.to_string(),
            }),
            _ => None,
        }
    }
}

//
// ─── ATTEMPTS ──────────────────────────────────────────────────────────────────
//

/// Records one attempt of an assessment and raises the high-water mark.
///
/// An all-pending score counts as an attempt but carries no percent.
pub(crate) fn record_attempt(attempts: &mut u32, best_score: &mut Option<u8>, score: &Score) {
    *attempts = attempts.saturating_add(1);
    if let Some(percent) = score.percent_if_scored() {
        *best_score = Some(best_score.map_or(percent, |best| best.max(percent)));
    }
}

//
// ─── LESSON HELPERS ────────────────────────────────────────────────────────────
//

pub(crate) fn find_lesson_mut(
    lessons: &mut [Lesson],
    number: LessonNumber,
) -> Result<&mut Lesson, ProgressError> {
    lessons
        .iter_mut()
        .find(|lesson| lesson.lesson_number == number)
        .ok_or(ProgressError::LessonNotFound(number))
}

/// Grades the knowledge check and completes the lesson on any verdict.
///
/// A shape mismatch leaves the lesson untouched.
pub(crate) fn answer_knowledge_check(
    lesson: &mut Lesson,
    response: &Response,
    policy: MatchPolicy,
) -> Result<Grade, ProgressError> {
    let grade = lesson.knowledge_check.grade_with(response, policy)?;
    lesson.complete();
    Ok(grade)
}

pub(crate) fn completed_lessons(lessons: &[Lesson]) -> u32 {
    let count = lessons.iter().filter(|lesson| lesson.is_complete()).count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::assessment::{QuestionResult, Score};

    fn score(correct: u32, total: u32, pending: u32) -> Score {
        Score {
            correct_count: correct,
            total_count: total,
            pending_count: pending,
            per_question: Vec::<QuestionResult>::new(),
        }
    }

    #[test]
    fn best_score_is_a_high_water_mark() {
        let mut attempts = 0;
        let mut best = None;
        record_attempt(&mut attempts, &mut best, &score(3, 4, 0));
        record_attempt(&mut attempts, &mut best, &score(1, 4, 0));
        assert_eq!(attempts, 2);
        assert_eq!(best, Some(75));
    }

    #[test]
    fn all_pending_attempt_keeps_best_unset() {
        let mut attempts = 0;
        let mut best = None;
        record_attempt(&mut attempts, &mut best, &score(0, 0, 2));
        assert_eq!(attempts, 1);
        assert_eq!(best, None);
    }

    #[test]
    fn unset_cache_is_not_stale() {
        assert!(StaleAggregate::check("course", "completed_count", None, 2).is_none());
        assert!(StaleAggregate::check("course", "completed_count", Some(2), 2).is_none());
        let stale = StaleAggregate::check("course", "completed_count", Some(5), 2).unwrap();
        assert_eq!(stale.to_string(), "course: cached completed_count was 5, recomputed 2");
    }
}
