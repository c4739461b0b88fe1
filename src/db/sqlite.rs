//! SQLite-backed document store.
//!
//! Documents are stored as JSON text keyed by `(collection, id)`. Every write
//! bumps the revision counter in the same transaction.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use super::{keyed_items, merge_documents, DocumentStore};
use crate::errors::AppError;
use crate::models::Document;

/// Document store over a SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn bump_revision(tx: &mut Transaction<'_, Sqlite>) -> Result<(), AppError> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
        .bind(&now)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn upsert(
    tx: &mut Transaction<'_, Sqlite>,
    collection: &str,
    id: &str,
    data: &Document,
) -> Result<(), AppError> {
    let now = Utc::now().to_rfc3339();
    let json = serde_json::to_string(data)?;
    sqlx::query(
        r#"INSERT INTO documents (collection, id, data, updated_at) VALUES (?, ?, ?, ?)
           ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at"#,
    )
    .bind(collection)
    .bind(id)
    .bind(&json)
    .bind(&now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn parse_document(raw: &str) -> Result<Document, AppError> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Store(format!(
            "Stored document is not an object: {}",
            other
        ))),
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get_doc(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| parse_document(r.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn set_doc(
        &self,
        collection: &str,
        id: &str,
        data: &Document,
        merge: bool,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let merged = if merge {
            let existing = sqlx::query("SELECT data FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            let mut base = match existing {
                Some(row) => parse_document(row.get::<String, _>("data").as_str())?,
                None => Document::new(),
            };
            merge_documents(&mut base, data);
            base
        } else {
            data.clone()
        };

        upsert(&mut tx, collection, id, &merged).await?;
        bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_all_docs(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        let rows = sqlx::query("SELECT id, data FROM documents WHERE collection = ? ORDER BY id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let mut doc = parse_document(row.get::<String, _>("data").as_str())?;
                doc.insert("id".to_string(), Value::String(row.get("id")));
                Ok(doc)
            })
            .collect()
    }

    async fn batch_replace(&self, collection: &str, items: &[Document]) -> Result<(), AppError> {
        let keyed = keyed_items(items)?;

        // Use a transaction so readers never see a half-rewritten collection
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM documents WHERE collection = ?")
            .bind(collection)
            .execute(&mut *tx)
            .await?;

        for (id, item) in &keyed {
            upsert(&mut tx, collection, id, item).await?;
        }

        // Increment revision once for the entire batch
        bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Document {}/{} not found",
                collection, id
            )));
        }

        bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn revision(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }
}
