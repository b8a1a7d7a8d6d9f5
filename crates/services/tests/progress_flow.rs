use std::sync::Arc;

use async_trait::async_trait;

use luminous_core::model::{
    ContentId, Course, LessonNumber, LessonStatus, MatchPolicy, QuickLearn, Response, Submission,
    UnitNumber, UserId, Verdict,
};
use luminous_core::time::fixed_clock;
use services::{AppServices, ProgressService, ProgressServiceError, ServicesConfig};
use storage::repository::{ContentRepository, InMemoryRepository, StorageError, Stored};

const COURSE: &str = include_str!("fixtures/course.json");

fn owner() -> UserId {
    UserId::new("learner-1").unwrap()
}

/// Reads from memory, refuses every write.
struct ReadOnlyCourses {
    inner: InMemoryRepository<Course>,
}

#[async_trait]
impl ContentRepository<Course> for ReadOnlyCourses {
    async fn upsert(&self, _owner: &UserId, _id: ContentId, _document: &Course) -> Result<(), StorageError> {
        Err(StorageError::Connection("database is read-only".into()))
    }

    async fn get(&self, owner: &UserId, id: ContentId) -> Result<Course, StorageError> {
        self.inner.get(owner, id).await
    }

    async fn list(&self, owner: &UserId) -> Result<Vec<Stored<Course>>, StorageError> {
        self.inner.list(owner).await
    }

    async fn delete(&self, owner: &UserId, id: ContentId) -> Result<(), StorageError> {
        self.inner.delete(owner, id).await
    }
}

#[tokio::test]
async fn learner_completes_a_course() {
    let services = AppServices::in_memory(ServicesConfig::default(), fixed_clock());
    let id = services
        .content()
        .ingest_json::<Course>(&owner(), COURSE)
        .await
        .unwrap()
        .id;
    let mut course: Course = services.content().load(&owner(), id).await.unwrap();
    let progress = services.progress();
    let unit = UnitNumber::new(1);

    progress
        .open_lesson(&owner(), id, &mut course, unit, LessonNumber::new(1))
        .await
        .unwrap();
    let grade = progress
        .answer_knowledge_check(&owner(), id, &mut course, unit, LessonNumber::new(1), &Response::text("spawn"))
        .await
        .unwrap();
    assert_eq!(grade.verdict, Verdict::Incorrect);
    assert_eq!(grade.canonical_answer, "poll");
    progress
        .mark_lesson_read(&owner(), id, &mut course, unit, LessonNumber::new(2))
        .await
        .unwrap();
    assert!(!course.unit(unit).unwrap().completed());

    let score = progress
        .submit_unit_test(
            &owner(),
            id,
            &mut course,
            unit,
            &Submission::new(vec![Some(Response::text("lazy")), Some(Response::text("it moves"))]),
        )
        .await
        .unwrap();
    assert_eq!((score.correct_count, score.total_count, score.pending_count), (1, 1, 1));
    assert!(course.unit(unit).unwrap().completed());
    assert_eq!(course.completed_count(), 1);

    let exam = progress
        .submit_final_exam(&owner(), id, &mut course, &Submission::new(vec![None]))
        .await
        .unwrap();
    assert_eq!(exam.percent(), 0);
    assert_eq!(course.final_exam_attempts(), 1);
    assert_eq!(course.best_final_exam_score(), Some(0));

    let reloaded: Course = services.content().load(&owner(), id).await.unwrap();
    assert_eq!(reloaded.completed_count(), 1);
    assert_eq!(
        reloaded.unit(unit).unwrap().lessons()[0].status(),
        Some(LessonStatus::Completed)
    );
}

#[tokio::test]
async fn failed_write_leaves_the_course_as_it_was() {
    let inner = InMemoryRepository::<Course>::new();
    let id = ContentId::generate();
    let course: Course = serde_json::from_str(COURSE).unwrap();
    inner.upsert(&owner(), id, &course).await.unwrap();

    let service = ProgressService::new(
        fixed_clock(),
        MatchPolicy::default(),
        Arc::new(ReadOnlyCourses { inner: inner.clone() }),
        Arc::new(InMemoryRepository::<QuickLearn>::new()),
    );

    let mut working = inner.get(&owner(), id).await.unwrap();
    let before = working.clone();
    let err = service
        .mark_lesson_read(&owner(), id, &mut working, UnitNumber::new(1), LessonNumber::new(1))
        .await
        .unwrap_err();

    assert!(matches!(err, ProgressServiceError::Storage(StorageError::Connection(_))));
    assert_eq!(working, before);
    assert_eq!(inner.get(&owner(), id).await.unwrap(), before);
}

#[tokio::test]
async fn quick_learn_assessment_tracks_best_score() {
    let services = AppServices::in_memory(ServicesConfig::default(), fixed_clock());
    let payload = r#"{
        "title": "Iterators",
        "lessons": [{
            "lesson_number": 1,
            "title": "Adapters",
            "knowledge_check": {"question": "map is lazy", "answer": true}
        }],
        "assessment": {
            "title": "Check",
            "questions": [
                {"question": "collect consumes", "answer": true},
                {"question": "iter() takes ownership", "answer": false}
            ]
        }
    }"#;
    let stored = services.content().ingest_json::<QuickLearn>(&owner(), payload).await.unwrap();
    let (id, mut quick) = (stored.id, stored.document);
    let progress = services.progress();

    progress
        .answer_quick_knowledge_check(&owner(), id, &mut quick, LessonNumber::new(1), &Response::Boolean(true))
        .await
        .unwrap();
    assert_eq!(quick.completed_count(), 1);

    for answers in [vec![true, true], vec![true, false], vec![false, true]] {
        let submission = Submission::new(answers.into_iter().map(|a| Some(Response::Boolean(a))).collect());
        progress
            .submit_quick_assessment(&owner(), id, &mut quick, &submission)
            .await
            .unwrap();
    }
    assert_eq!(quick.assessment_attempts(), 3);
    assert_eq!(quick.best_test_score(), Some(100));
}
