use luminous_core::ContentError;
use luminous_core::model::{
    ContentId, Course, FlashcardSet, QuestionKind, Syllabus, UnitNumber, UserId,
};
use luminous_core::time::fixed_clock;
use services::{AppServices, ContentServiceError, ServicesConfig};
use storage::repository::{ContentRepository, Storage};

const COURSE: &str = include_str!("fixtures/course.json");
const FLASHCARDS: &str = include_str!("fixtures/flashcards.json");

fn owner() -> UserId {
    UserId::new("learner-1").unwrap()
}

fn services() -> AppServices {
    AppServices::in_memory(ServicesConfig::default(), fixed_clock())
}

#[tokio::test]
async fn generated_course_is_admitted_with_fresh_aggregates() {
    let services = services();
    let stored = services
        .content()
        .ingest_json::<Course>(&owner(), COURSE)
        .await
        .unwrap();

    let course = &stored.document;
    assert_eq!(course.completed_count(), 0);
    assert_eq!(course.user_id, Some(owner()));
    assert_eq!(course.created_at.as_deref(), Some("2023-11-14T22:13:20Z"));

    let unit = course.unit(UnitNumber::new(1)).unwrap();
    assert!(!unit.completed());
    assert_eq!(unit.lessons()[0].additional_resources[0].title, "The async book");
    assert_eq!(unit.lessons()[0].duration_in_min, "15");
    assert_eq!(unit.lessons()[1].knowledge_check.kind(), QuestionKind::TrueOrFalse);
    assert_eq!(course.final_exam.instructions, "Everything");

    let listed = services.content().list::<Course>(&owner()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, stored.id);
}

#[tokio::test]
async fn loading_a_stale_stored_course_repairs_its_aggregates() {
    let storage = Storage::in_memory();
    let services = AppServices::with_storage(ServicesConfig::default(), fixed_clock(), storage.clone());

    // Written behind the service's back, still claiming one completed unit.
    let stale: Course = serde_json::from_str(COURSE).unwrap();
    assert_eq!(stale.completed_count(), 1);
    let id = ContentId::generate();
    storage.courses.upsert(&owner(), id, &stale).await.unwrap();

    let loaded: Course = services.content().load(&owner(), id).await.unwrap();
    let recounted = loaded.units().iter().filter(|u| u.is_complete()).count() as u32;
    assert_eq!(recounted, 0);
    assert_eq!(loaded.completed_count(), recounted);

    let persisted = storage.courses.get(&owner(), id).await.unwrap();
    assert_eq!(persisted.completed_count(), 0);
    assert_eq!(persisted, loaded);
}

#[tokio::test]
async fn knowledge_check_answer_outside_choices_rejects_the_course() {
    let payload = COURSE.replace(r#""answer": "poll""#, r#""answer": "await""#);
    let err = services()
        .content()
        .ingest_json::<Course>(&owner(), &payload)
        .await
        .unwrap_err();

    let ContentServiceError::Malformed(ContentError::Question { location, .. }) = &err else {
        panic!("expected a located question error, got {err:?}");
    };
    assert_eq!(location, "unit 1, lesson 1, knowledge check");
}

#[tokio::test]
async fn batch_ingest_reports_each_payload() {
    let services = services();
    let card = r#"{"card_number": 2, "front": "Waker", "back": "Handle that reschedules a task"}"#;
    let conflicting = FLASHCARDS
        .replace(r#""still_learning": []"#, &format!(r#""still_learning": [{card}]"#))
        .replace(r#""mastered": []"#, &format!(r#""mastered": [{card}]"#));

    let results = services
        .content()
        .ingest_batch::<FlashcardSet, _, _>(&owner(), [FLASHCARDS, conflicting.as_str(), "[]"])
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(ContentServiceError::Malformed(ContentError::CardInMultipleBuckets { first: "still_learning", second: "mastered", .. }))
    ));
    assert!(matches!(
        results[2],
        Err(ContentServiceError::Malformed(ContentError::Unparseable { .. }))
    ));
    let stored = services.content().list::<FlashcardSet>(&owner()).await.unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn syllabus_round_trips_through_sqlite() {
    let config = ServicesConfig {
        database_url: "sqlite:file:services_syllabus?mode=memory&cache=shared".into(),
        ..ServicesConfig::default()
    };
    let services = AppServices::new_sqlite(config, fixed_clock()).await.unwrap();
    let syllabus = r#"{
        "title": "Embedded Rust",
        "level": "beginner",
        "units": [{
            "unit_number": 1,
            "title": "no_std",
            "lesson_outline": [{"title": "core vs std"}]
        }]
    }"#;

    let stored = services
        .content()
        .ingest_json::<Syllabus>(&owner(), syllabus)
        .await
        .unwrap();
    let loaded: Syllabus = services.content().load(&owner(), stored.id).await.unwrap();
    assert_eq!(loaded.lesson_count(), 1);
    assert!(!loaded.is_draft);
    assert_eq!(loaded.last_accessed.as_deref(), Some("2023-11-14T22:13:20Z"));
}
