use luminous_core::model::ContentId;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{Document, Stored, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn encode_document<T: Document>(document: &T) -> Result<String, StorageError> {
    serde_json::to_string(document).map_err(ser)
}

/// Decodes a payload. A row that no longer parses is reported, not skipped.
pub(crate) fn decode_document<T: Document>(payload: &str) -> Result<T, StorageError> {
    serde_json::from_str(payload).map_err(|e| {
        StorageError::Serialization(format!("invalid {} payload: {e}", T::KIND))
    })
}

pub(crate) fn map_document_row<T: Document>(row: &SqliteRow) -> Result<Stored<T>, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let id: ContentId = id.parse().map_err(ser)?;
    let payload: String = row.try_get("payload").map_err(ser)?;
    Ok(Stored {
        id,
        document: decode_document(&payload)?,
    })
}
