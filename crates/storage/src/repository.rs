use async_trait::async_trait;
use luminous_core::model::{ContentId, Course, FlashcardSet, QuickLearn, Syllabus, UserId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Which content table a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Course,
    FlashcardSet,
    QuickLearn,
    Syllabus,
}

impl ContentKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Course => "course",
            ContentKind::FlashcardSet => "flashcard_set",
            ContentKind::QuickLearn => "quick_learn",
            ContentKind::Syllabus => "syllabus",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content value that can be stored as one JSON document.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: ContentKind;
}

impl Document for Course {
    const KIND: ContentKind = ContentKind::Course;
}

impl Document for FlashcardSet {
    const KIND: ContentKind = ContentKind::FlashcardSet;
}

impl Document for QuickLearn {
    const KIND: ContentKind = ContentKind::QuickLearn;
}

impl Document for Syllabus {
    const KIND: ContentKind = ContentKind::Syllabus;
}

/// A stored document with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<T> {
    pub id: ContentId,
    pub document: T,
}

/// Repository contract for one kind of content, scoped by owner.
///
/// Documents of another owner are invisible: reads report `NotFound`.
#[async_trait]
pub trait ContentRepository<T: Document>: Send + Sync {
    /// Insert or replace a document. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the document cannot be stored.
    async fn upsert(&self, owner: &UserId, id: ContentId, document: &T) -> Result<(), StorageError>;

    /// Fetch a document by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get(&self, owner: &UserId, id: ContentId) -> Result<T, StorageError>;

    /// List an owner's documents in id order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the documents cannot be read.
    async fn list(&self, owner: &UserId) -> Result<Vec<Stored<T>>, StorageError>;

    /// Delete a document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if there was nothing to delete.
    async fn delete(&self, owner: &UserId, id: ContentId) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone)]
pub struct InMemoryRepository<T> {
    documents: Arc<Mutex<HashMap<(UserId, ContentId), T>>>,
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InMemoryRepository<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl<T: Document> ContentRepository<T> for InMemoryRepository<T> {
    async fn upsert(&self, owner: &UserId, id: ContentId, document: &T) -> Result<(), StorageError> {
        let mut guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert((owner.clone(), id), document.clone());
        Ok(())
    }

    async fn get(&self, owner: &UserId, id: ContentId) -> Result<T, StorageError> {
        let guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .get(&(owner.clone(), id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list(&self, owner: &UserId) -> Result<Vec<Stored<T>>, StorageError> {
        let guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<Stored<T>> = guard
            .iter()
            .filter(|((user, _), _)| user == owner)
            .map(|((_, id), document)| Stored {
                id: *id,
                document: document.clone(),
            })
            .collect();
        found.sort_by_key(|stored| stored.id);
        Ok(found)
    }

    async fn delete(&self, owner: &UserId, id: ContentId) -> Result<(), StorageError> {
        let mut guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .remove(&(owner.clone(), id))
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }
}

/// Aggregates the content repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn ContentRepository<Course>>,
    pub flashcard_sets: Arc<dyn ContentRepository<FlashcardSet>>,
    pub quick_learns: Arc<dyn ContentRepository<QuickLearn>>,
    pub syllabi: Arc<dyn ContentRepository<Syllabus>>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            courses: Arc::new(InMemoryRepository::<Course>::new()),
            flashcard_sets: Arc::new(InMemoryRepository::<FlashcardSet>::new()),
            quick_learns: Arc::new(InMemoryRepository::<QuickLearn>::new()),
            syllabi: Arc::new(InMemoryRepository::<Syllabus>::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luminous_core::model::{CardNumber, Flashcard};

    fn owner(raw: &str) -> UserId {
        UserId::new(raw).unwrap()
    }

    fn build_set(title: &str) -> FlashcardSet {
        let card = Flashcard::new(CardNumber::new(1), "front", "back").unwrap();
        FlashcardSet::new(title, "topic", vec![card]).unwrap()
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let repo = InMemoryRepository::<FlashcardSet>::new();
        let id = ContentId::generate();
        repo.upsert(&owner("u1"), id, &build_set("First")).await.unwrap();
        repo.upsert(&owner("u1"), id, &build_set("Second")).await.unwrap();

        let fetched = repo.get(&owner("u1"), id).await.unwrap();
        assert_eq!(fetched.title, "Second");
    }

    #[tokio::test]
    async fn other_owners_cannot_see_documents() {
        let repo = InMemoryRepository::<FlashcardSet>::new();
        let id = ContentId::generate();
        repo.upsert(&owner("u1"), id, &build_set("Mine")).await.unwrap();

        assert!(matches!(repo.get(&owner("u2"), id).await, Err(StorageError::NotFound)));
        assert!(repo.list(&owner("u2")).await.unwrap().is_empty());
        assert!(matches!(repo.delete(&owner("u2"), id).await, Err(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn list_and_delete() {
        let repo = InMemoryRepository::<FlashcardSet>::new();
        let a = ContentId::generate();
        let b = ContentId::generate();
        repo.upsert(&owner("u1"), a, &build_set("A")).await.unwrap();
        repo.upsert(&owner("u1"), b, &build_set("B")).await.unwrap();
        assert_eq!(repo.list(&owner("u1")).await.unwrap().len(), 2);

        repo.delete(&owner("u1"), a).await.unwrap();
        let remaining = repo.list(&owner("u1")).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b);
    }

    #[test]
    fn kinds_have_stable_names() {
        assert_eq!(ContentKind::QuickLearn.to_string(), "quick_learn");
        assert_eq!(<Course as Document>::KIND, ContentKind::Course);
    }
}
