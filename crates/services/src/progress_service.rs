use std::sync::Arc;

use luminous_core::model::{
    ContentId, Course, Grade, LessonNumber, MatchPolicy, QuickLearn, Response, Score, Submission,
    UnitNumber, UserId,
};
use storage::repository::{ContentRepository, Document};

use crate::Clock;
use crate::error::ProgressServiceError;

/// Applies learner progress to stored courses and quick learns.
///
/// Every operation mutates a copy, persists it, and only then replaces the
/// caller's value. A failed write leaves the caller's value untouched.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    policy: MatchPolicy,
    courses: Arc<dyn ContentRepository<Course>>,
    quick_learns: Arc<dyn ContentRepository<QuickLearn>>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        policy: MatchPolicy,
        courses: Arc<dyn ContentRepository<Course>>,
        quick_learns: Arc<dyn ContentRepository<QuickLearn>>,
    ) -> Self {
        Self {
            clock,
            policy,
            courses,
            quick_learns,
        }
    }

    #[must_use]
    pub fn match_policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Mark a not-started lesson as in progress.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Progress` for unknown units or lessons.
    /// Returns `ProgressServiceError::Storage` if persistence fails.
    pub async fn open_lesson(
        &self,
        owner: &UserId,
        id: ContentId,
        course: &mut Course,
        unit: UnitNumber,
        lesson: LessonNumber,
    ) -> Result<(), ProgressServiceError> {
        let mut next = course.clone();
        next.open_lesson(unit, lesson)?;
        self.commit_course(owner, id, course, next).await
    }

    /// Complete a lesson without answering its knowledge check.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Progress` for unknown units or lessons.
    /// Returns `ProgressServiceError::Storage` if persistence fails.
    pub async fn mark_lesson_read(
        &self,
        owner: &UserId,
        id: ContentId,
        course: &mut Course,
        unit: UnitNumber,
        lesson: LessonNumber,
    ) -> Result<(), ProgressServiceError> {
        let mut next = course.clone();
        next.mark_lesson_read(unit, lesson)?;
        self.commit_course(owner, id, course, next).await
    }

    /// Grade a knowledge-check answer; answering completes the lesson.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Progress` for unknown units or lessons
    /// and for responses of the wrong shape.
    /// Returns `ProgressServiceError::Storage` if persistence fails.
    pub async fn answer_knowledge_check(
        &self,
        owner: &UserId,
        id: ContentId,
        course: &mut Course,
        unit: UnitNumber,
        lesson: LessonNumber,
        response: &Response,
    ) -> Result<Grade, ProgressServiceError> {
        let mut next = course.clone();
        let grade = next.answer_knowledge_check(unit, lesson, response, self.policy)?;
        self.commit_course(owner, id, course, next).await?;
        Ok(grade)
    }

    /// Score a unit test attempt and record it on the unit.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Progress` for unknown units and
    /// mis-shaped answers.
    /// Returns `ProgressServiceError::Storage` if persistence fails.
    pub async fn submit_unit_test(
        &self,
        owner: &UserId,
        id: ContentId,
        course: &mut Course,
        unit: UnitNumber,
        submission: &Submission,
    ) -> Result<Score, ProgressServiceError> {
        let mut next = course.clone();
        let score = next.record_unit_test(unit, submission, self.policy)?;
        self.commit_course(owner, id, course, next).await?;
        Ok(score)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Progress` for mis-shaped answers.
    /// Returns `ProgressServiceError::Storage` if persistence fails.
    pub async fn submit_final_exam(
        &self,
        owner: &UserId,
        id: ContentId,
        course: &mut Course,
        submission: &Submission,
    ) -> Result<Score, ProgressServiceError> {
        let mut next = course.clone();
        let score = next.record_final_exam(submission, self.policy)?;
        self.commit_course(owner, id, course, next).await?;
        Ok(score)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Progress` for unknown lessons.
    /// Returns `ProgressServiceError::Storage` if persistence fails.
    pub async fn open_quick_lesson(
        &self,
        owner: &UserId,
        id: ContentId,
        quick_learn: &mut QuickLearn,
        lesson: LessonNumber,
    ) -> Result<(), ProgressServiceError> {
        let mut next = quick_learn.clone();
        next.open_lesson(lesson)?;
        self.commit_quick_learn(owner, id, quick_learn, next).await
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Progress` for unknown lessons.
    /// Returns `ProgressServiceError::Storage` if persistence fails.
    pub async fn mark_quick_lesson_read(
        &self,
        owner: &UserId,
        id: ContentId,
        quick_learn: &mut QuickLearn,
        lesson: LessonNumber,
    ) -> Result<(), ProgressServiceError> {
        let mut next = quick_learn.clone();
        next.mark_lesson_read(lesson)?;
        self.commit_quick_learn(owner, id, quick_learn, next).await
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Progress` for unknown lessons and
    /// mis-shaped responses.
    /// Returns `ProgressServiceError::Storage` if persistence fails.
    pub async fn answer_quick_knowledge_check(
        &self,
        owner: &UserId,
        id: ContentId,
        quick_learn: &mut QuickLearn,
        lesson: LessonNumber,
        response: &Response,
    ) -> Result<Grade, ProgressServiceError> {
        let mut next = quick_learn.clone();
        let grade = next.answer_knowledge_check(lesson, response, self.policy)?;
        self.commit_quick_learn(owner, id, quick_learn, next).await?;
        Ok(grade)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Progress` for mis-shaped answers.
    /// Returns `ProgressServiceError::Storage` if persistence fails.
    pub async fn submit_quick_assessment(
        &self,
        owner: &UserId,
        id: ContentId,
        quick_learn: &mut QuickLearn,
        submission: &Submission,
    ) -> Result<Score, ProgressServiceError> {
        let mut next = quick_learn.clone();
        let score = next.record_assessment(submission, self.policy)?;
        self.commit_quick_learn(owner, id, quick_learn, next).await?;
        Ok(score)
    }

    async fn commit_course(
        &self,
        owner: &UserId,
        id: ContentId,
        current: &mut Course,
        mut next: Course,
    ) -> Result<(), ProgressServiceError> {
        next.last_accessed = Some(self.clock.timestamp());
        persist(self.courses.as_ref(), owner, id, &next).await?;
        tracing::debug!(%id, completed_count = next.completed_count(), "course progress saved");
        *current = next;
        Ok(())
    }

    async fn commit_quick_learn(
        &self,
        owner: &UserId,
        id: ContentId,
        current: &mut QuickLearn,
        mut next: QuickLearn,
    ) -> Result<(), ProgressServiceError> {
        next.last_accessed = Some(self.clock.timestamp());
        persist(self.quick_learns.as_ref(), owner, id, &next).await?;
        tracing::debug!(%id, completed_count = next.completed_count(), "quick learn progress saved");
        *current = next;
        Ok(())
    }
}

async fn persist<T: Document>(
    repo: &dyn ContentRepository<T>,
    owner: &UserId,
    id: ContentId,
    document: &T,
) -> Result<(), ProgressServiceError> {
    repo.upsert(owner, id, document).await.map_err(|err| {
        tracing::error!(kind = T::KIND.as_str(), %id, error = %err, "progress not saved; change discarded");
        ProgressServiceError::Storage(err)
    })
}
