//! Document store module.
//!
//! The rest of the service only sees [`DocumentStore`]: a collection/id keyed
//! JSON document service with get, set (optionally merging), list,
//! batch-replace and delete. SQLite is the persistent implementation.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::errors::AppError;
use crate::models::Document;

/// Remote document store contract consumed by the content service and editors.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document, `None` if it does not exist.
    async fn get_doc(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError>;

    /// Write a document. With `merge`, object fields are merged into the
    /// existing document instead of replacing it.
    async fn set_doc(
        &self,
        collection: &str,
        id: &str,
        data: &Document,
        merge: bool,
    ) -> Result<(), AppError>;

    /// Every document in a collection, each carrying its key as `id`.
    async fn get_all_docs(&self, collection: &str) -> Result<Vec<Document>, AppError>;

    /// Delete every document in the collection and insert `items` in one
    /// atomic step. Items without a string `id` are rejected.
    async fn batch_replace(&self, collection: &str, items: &[Document]) -> Result<(), AppError>;

    /// Delete one document; a missing id is `NotFound`.
    async fn delete_doc(&self, collection: &str, id: &str) -> Result<(), AppError>;

    /// Store-wide write counter.
    async fn revision(&self) -> Result<i64, AppError>;
}

/// Deep-merge `patch` into `target`: nested objects merge, everything else replaces.
pub fn merge_documents(target: &mut Document, patch: &Document) {
    for (key, value) in patch {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_documents(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Collect `(id, document)` pairs for a batch, rejecting items without an id.
pub(crate) fn keyed_items(items: &[Document]) -> Result<Vec<(String, Document)>, AppError> {
    items
        .iter()
        .map(|item| {
            item.get("id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(|id| (id.to_string(), item.clone()))
                .ok_or_else(|| AppError::Validation("Batch item is missing an id".to_string()))
        })
        .collect()
}

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            data TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_documents_is_deep_for_objects_only() {
        let mut target = doc(json!({
            "title": "Old",
            "links": {"facebook": "fb", "instagram": "ig"},
            "tags": ["a", "b"]
        }));
        let patch = doc(json!({
            "links": {"facebook": "fb2"},
            "tags": ["c"],
            "subtitle": "New"
        }));

        merge_documents(&mut target, &patch);

        assert_eq!(
            Value::Object(target),
            json!({
                "title": "Old",
                "subtitle": "New",
                "links": {"facebook": "fb2", "instagram": "ig"},
                "tags": ["c"]
            })
        );
    }

    #[test]
    fn test_keyed_items_rejects_missing_id() {
        let items = vec![doc(json!({"id": "a"})), doc(json!({"name": "no id"}))];
        assert!(matches!(keyed_items(&items), Err(AppError::Validation(_))));
    }
}
