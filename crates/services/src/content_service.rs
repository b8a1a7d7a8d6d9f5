use std::sync::Arc;

use luminous_core::ContentError;
use luminous_core::model::{
    ContentId, Course, FlashcardSet, FlashcardSetRecord, QuickLearn, StaleAggregate, Syllabus,
    UserId,
};
use storage::repository::{ContentRepository, Document, Storage, Stored};

use crate::Clock;
use crate::error::ContentServiceError;

//
// ─── CONTENT KINDS ─────────────────────────────────────────────────────────────
//

/// A generated document the services know how to ingest and load.
pub trait Content: Document {
    /// Parse a generated JSON payload.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::Unparseable` when the payload does not match the schema.
    fn parse(json: &str) -> Result<Self, ContentError> {
        serde_json::from_str(json).map_err(unparseable)
    }

    /// # Errors
    ///
    /// Returns `ContentError` naming the first violated invariant.
    fn validate_content(&self) -> Result<(), ContentError>;

    /// Recompute cached aggregates, reporting the ones that were stale.
    fn refresh(&mut self) -> Vec<StaleAggregate>;

    fn assign_owner(&mut self, owner: &UserId);

    /// Set `created_at` if the kind tracks it and it is not set yet.
    fn stamp_created(&mut self, now: &str);

    fn touch(&mut self, now: &str);

    fn repository(storage: &Storage) -> Arc<dyn ContentRepository<Self>>;
}

impl Content for Course {
    fn validate_content(&self) -> Result<(), ContentError> {
        self.validate()
    }

    fn refresh(&mut self) -> Vec<StaleAggregate> {
        self.refresh_aggregates()
    }

    fn assign_owner(&mut self, owner: &UserId) {
        self.user_id = Some(owner.clone());
    }

    fn stamp_created(&mut self, now: &str) {
        self.created_at.get_or_insert_with(|| now.to_owned());
    }

    fn touch(&mut self, now: &str) {
        self.last_accessed = Some(now.to_owned());
    }

    fn repository(storage: &Storage) -> Arc<dyn ContentRepository<Self>> {
        Arc::clone(&storage.courses)
    }
}

impl Content for QuickLearn {
    fn validate_content(&self) -> Result<(), ContentError> {
        self.validate()
    }

    fn refresh(&mut self) -> Vec<StaleAggregate> {
        self.refresh_aggregates()
    }

    fn assign_owner(&mut self, owner: &UserId) {
        self.user_id = Some(owner.clone());
    }

    fn stamp_created(&mut self, now: &str) {
        self.created_at.get_or_insert_with(|| now.to_owned());
    }

    fn touch(&mut self, now: &str) {
        self.last_accessed = Some(now.to_owned());
    }

    fn repository(storage: &Storage) -> Arc<dyn ContentRepository<Self>> {
        Arc::clone(&storage.quick_learns)
    }
}

impl Content for FlashcardSet {
    fn parse(json: &str) -> Result<Self, ContentError> {
        let record: FlashcardSetRecord = serde_json::from_str(json).map_err(unparseable)?;
        Self::try_from(record)
    }

    fn validate_content(&self) -> Result<(), ContentError> {
        self.validate()
    }

    // Buckets are derived from per-card state, so nothing can be stale.
    fn refresh(&mut self) -> Vec<StaleAggregate> {
        Vec::new()
    }

    fn assign_owner(&mut self, owner: &UserId) {
        self.user_id = Some(owner.clone());
    }

    fn stamp_created(&mut self, now: &str) {
        self.created_at.get_or_insert_with(|| now.to_owned());
    }

    fn touch(&mut self, now: &str) {
        self.last_accessed = Some(now.to_owned());
    }

    fn repository(storage: &Storage) -> Arc<dyn ContentRepository<Self>> {
        Arc::clone(&storage.flashcard_sets)
    }
}

impl Content for Syllabus {
    fn validate_content(&self) -> Result<(), ContentError> {
        self.validate()
    }

    fn refresh(&mut self) -> Vec<StaleAggregate> {
        Vec::new()
    }

    fn assign_owner(&mut self, owner: &UserId) {
        self.user_id = Some(owner.clone());
    }

    fn stamp_created(&mut self, _now: &str) {}

    fn touch(&mut self, now: &str) {
        self.last_accessed = Some(now.to_owned());
    }

    fn repository(storage: &Storage) -> Arc<dyn ContentRepository<Self>> {
        Arc::clone(&storage.syllabi)
    }
}

/// Parse a generated JSON payload without validating it further.
///
/// # Errors
///
/// Returns `ContentError::Unparseable` when the payload does not match the schema,
/// or the kind's own `ContentError` for structural conflicts found while parsing.
pub fn parse_payload<T: Content>(json: &str) -> Result<T, ContentError> {
    T::parse(json)
}

fn unparseable(err: serde_json::Error) -> ContentError {
    ContentError::Unparseable {
        message: err.to_string(),
    }
}

/// Recompute cached aggregates, logging each one that was stale.
pub(crate) fn refresh_logged<T: Content>(document: &mut T) {
    for stale in document.refresh() {
        tracing::warn!(
            kind = T::KIND.as_str(),
            location = %stale.location,
            field = stale.field,
            cached = %stale.cached,
            recomputed = %stale.recomputed,
            "overwrote stale aggregate"
        );
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Admits generated content into storage and hands it back out.
#[derive(Clone)]
pub struct ContentService {
    clock: Clock,
    storage: Storage,
}

impl ContentService {
    #[must_use]
    pub fn new(clock: Clock, storage: Storage) -> Self {
        Self { clock, storage }
    }

    /// Parse, validate and persist a JSON payload for `owner`.
    ///
    /// # Errors
    ///
    /// Returns `ContentServiceError::Malformed` if the payload is rejected.
    /// Returns `ContentServiceError::Storage` if persistence fails.
    pub async fn ingest_json<T: Content>(
        &self,
        owner: &UserId,
        json: &str,
    ) -> Result<Stored<T>, ContentServiceError> {
        let document = parse_payload::<T>(json).inspect_err(|err| {
            tracing::warn!(kind = T::KIND.as_str(), error = %err, "rejected unparseable payload");
        })?;
        self.ingest(owner, document).await
    }

    /// Validate and persist an already-typed document under a new id.
    ///
    /// Stale cached aggregates are overwritten with their recomputed values.
    ///
    /// # Errors
    ///
    /// Returns `ContentServiceError::Malformed` if an invariant is violated.
    /// Returns `ContentServiceError::Storage` if persistence fails.
    pub async fn ingest<T: Content>(
        &self,
        owner: &UserId,
        mut document: T,
    ) -> Result<Stored<T>, ContentServiceError> {
        if let Err(err) = document.validate_content() {
            tracing::warn!(kind = T::KIND.as_str(), error = %err, "rejected malformed content");
            return Err(err.into());
        }

        refresh_logged(&mut document);

        let now = self.clock.timestamp();
        document.assign_owner(owner);
        document.stamp_created(&now);
        document.touch(&now);

        let id = ContentId::generate();
        T::repository(&self.storage).upsert(owner, id, &document).await?;
        tracing::info!(kind = T::KIND.as_str(), %id, owner = owner.as_str(), "ingested content");
        Ok(Stored { id, document })
    }

    /// Ingest many payloads; each one succeeds or fails on its own.
    pub async fn ingest_batch<T, I, S>(
        &self,
        owner: &UserId,
        payloads: I,
    ) -> Vec<Result<Stored<T>, ContentServiceError>>
    where
        T: Content,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut results = Vec::new();
        for payload in payloads {
            results.push(self.ingest_json::<T>(owner, payload.as_ref()).await);
        }
        let accepted = results.iter().filter(|r| r.is_ok()).count();
        tracing::info!(
            kind = T::KIND.as_str(),
            accepted,
            rejected = results.len() - accepted,
            "batch ingest finished"
        );
        results
    }

    /// Load a document and record the access.
    ///
    /// Cached aggregates are recomputed before the access is persisted, so
    /// a stale stored copy is repaired on first read.
    ///
    /// # Errors
    ///
    /// Returns `ContentServiceError::Storage` if the document is missing or
    /// cannot be persisted.
    pub async fn load<T: Content>(
        &self,
        owner: &UserId,
        id: ContentId,
    ) -> Result<T, ContentServiceError> {
        let repo = T::repository(&self.storage);
        let mut document = repo.get(owner, id).await?;
        refresh_logged(&mut document);
        document.touch(&self.clock.timestamp());
        repo.upsert(owner, id, &document).await?;
        Ok(document)
    }

    /// List an owner's documents of one kind in id order.
    ///
    /// # Errors
    ///
    /// Returns `ContentServiceError::Storage` if repository access fails.
    pub async fn list<T: Content>(
        &self,
        owner: &UserId,
    ) -> Result<Vec<Stored<T>>, ContentServiceError> {
        Ok(T::repository(&self.storage).list(owner).await?)
    }

    /// # Errors
    ///
    /// Returns `ContentServiceError::Storage` if nothing was deleted.
    pub async fn delete<T: Content>(
        &self,
        owner: &UserId,
        id: ContentId,
    ) -> Result<(), ContentServiceError> {
        T::repository(&self.storage).delete(owner, id).await?;
        tracing::info!(kind = T::KIND.as_str(), %id, "deleted content");
        Ok(())
    }
}
