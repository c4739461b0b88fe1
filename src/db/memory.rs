//! In-memory document store.
//!
//! Non-persistent backend for local development (`CLUB_STORE=memory`) and
//! tests. Writes can be switched to fail to simulate an unreachable store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::{keyed_items, merge_documents, DocumentStore};
use crate::errors::AppError;
use crate::models::Document;

type Collections = HashMap<String, BTreeMap<String, Document>>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
    revision: AtomicI64,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every write returns `AppError::Store` and changes nothing.
    #[cfg(test)]
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, AppError> {
        self.collections
            .read()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Store("simulated write failure".to_string()));
        }
        self.collections
            .write()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_doc(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        Ok(self
            .read()?
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set_doc(
        &self,
        collection: &str,
        id: &str,
        data: &Document,
        merge: bool,
    ) -> Result<(), AppError> {
        let mut collections = self.write()?;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.get_mut(id) {
            Some(existing) if merge => merge_documents(existing, data),
            _ => {
                docs.insert(id.to_string(), data.clone());
            }
        }
        self.bump();
        Ok(())
    }

    async fn get_all_docs(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        let collections = self.read()?;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .map(|(id, doc)| {
                let mut doc = doc.clone();
                doc.insert("id".to_string(), Value::String(id.clone()));
                doc
            })
            .collect())
    }

    async fn batch_replace(&self, collection: &str, items: &[Document]) -> Result<(), AppError> {
        let keyed = keyed_items(items)?;
        let mut collections = self.write()?;
        collections.insert(collection.to_string(), keyed.into_iter().collect());
        self.bump();
        Ok(())
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<(), AppError> {
        let mut collections = self.write()?;
        let removed = collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id));
        if removed.is_none() {
            return Err(AppError::NotFound(format!(
                "Document {}/{} not found",
                collection, id
            )));
        }
        self.bump();
        Ok(())
    }

    async fn revision(&self) -> Result<i64, AppError> {
        Ok(self.revision.load(Ordering::SeqCst))
    }
}
