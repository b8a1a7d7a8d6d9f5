use chrono::Utc;
use luminous_core::model::{ContentId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, decode_document, encode_document, map_document_row};
use crate::repository::{ContentRepository, Document, Stored, StorageError};

#[async_trait::async_trait]
impl<T: Document> ContentRepository<T> for SqliteRepository {
    async fn upsert(&self, owner: &UserId, id: ContentId, document: &T) -> Result<(), StorageError> {
        let payload = encode_document(document)?;

        sqlx::query(
            r"
            INSERT INTO content_documents (kind, user_id, id, payload, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(kind, user_id, id) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            ",
        )
        .bind(T::KIND.as_str())
        .bind(owner.as_str())
        .bind(id.to_string())
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        tracing::debug!(kind = T::KIND.as_str(), %id, "document upserted");
        Ok(())
    }

    async fn get(&self, owner: &UserId, id: ContentId) -> Result<T, StorageError> {
        let payload: Option<String> = sqlx::query_scalar::<_, String>(
            r"
            SELECT payload FROM content_documents
            WHERE kind = ?1 AND user_id = ?2 AND id = ?3
            ",
        )
        .bind(T::KIND.as_str())
        .bind(owner.as_str())
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match payload {
            Some(payload) => decode_document(&payload),
            None => Err(StorageError::NotFound),
        }
    }

    async fn list(&self, owner: &UserId) -> Result<Vec<Stored<T>>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, payload FROM content_documents
            WHERE kind = ?1 AND user_id = ?2
            ORDER BY id ASC
            ",
        )
        .bind(T::KIND.as_str())
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            documents.push(map_document_row(&row)?);
        }
        Ok(documents)
    }

    async fn delete(&self, owner: &UserId, id: ContentId) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            DELETE FROM content_documents
            WHERE kind = ?1 AND user_id = ?2 AND id = ?3
            ",
        )
        .bind(T::KIND.as_str())
        .bind(owner.as_str())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
