//! Read side of the site content.
//!
//! Every getter falls back to the bundled snapshot when the store has no
//! document (first run) or cannot be reached; reads never fail.

mod cache;

pub use cache::AppDataCache;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;

use crate::db::DocumentStore;
use crate::errors::AppError;
use crate::models::{
    sort_by_order, CollectionName, ConfigKey, Document, InitialData, SiteData,
    SITE_CONTENT_COLLECTION,
};

/// Fallback-aware reads over the document store.
#[derive(Clone)]
pub struct ContentService {
    store: Arc<dyn DocumentStore>,
}

impl ContentService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// A config document, or its bundled fallback.
    pub async fn get_config(&self, key: ConfigKey) -> Document {
        match self.store.get_doc(SITE_CONTENT_COLLECTION, key.as_str()).await {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                tracing::warn!("Config document {} missing, using bundled data", key.as_str());
                InitialData::config_doc(key)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to read config document {}: {}; using bundled data",
                    key.as_str(),
                    e
                );
                InitialData::config_doc(key)
            }
        }
    }

    pub async fn get_hero_data(&self) -> Document {
        self.get_config(ConfigKey::Hero).await
    }

    pub async fn get_about_data(&self) -> Document {
        self.get_config(ConfigKey::About).await
    }

    pub async fn get_join_data(&self) -> Document {
        self.get_config(ConfigKey::Join).await
    }

    pub async fn get_footer_data(&self) -> Document {
        self.get_config(ConfigKey::Footer).await
    }

    pub async fn get_theme_data(&self) -> Document {
        self.get_config(ConfigKey::Theme).await
    }

    pub async fn get_general_settings(&self) -> Document {
        self.get_config(ConfigKey::General).await
    }

    /// Collection items sorted by `order`, or the bundled items when empty.
    pub async fn get_collection(&self, name: CollectionName) -> Vec<Document> {
        let mut items = match self.store.get_all_docs(name.as_str()).await {
            Ok(items) if !items.is_empty() => items,
            Ok(_) => {
                tracing::warn!("Collection {} is empty, using bundled data", name.as_str());
                InitialData::collection_items(name)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to read collection {}: {}; using bundled data",
                    name.as_str(),
                    e
                );
                InitialData::collection_items(name)
            }
        };
        sort_by_order(&mut items);
        items
    }

    /// Everything the public pages need, in one snapshot.
    pub async fn get_app_data(&self) -> SiteData {
        let revision_id = self.store.revision().await.unwrap_or(0);

        let (hero, about, join, footer, theme, general) = tokio::join!(
            self.get_hero_data(),
            self.get_about_data(),
            self.get_join_data(),
            self.get_footer_data(),
            self.get_theme_data(),
            self.get_general_settings(),
        );
        let config = BTreeMap::from([
            (ConfigKey::Hero, hero),
            (ConfigKey::About, about),
            (ConfigKey::Join, join),
            (ConfigKey::Footer, footer),
            (ConfigKey::Theme, theme),
            (ConfigKey::General, general),
        ]);

        let items = join_all(CollectionName::ALL.map(|name| self.get_collection(name))).await;
        let collections = CollectionName::ALL.into_iter().zip(items).collect();

        SiteData {
            revision_id,
            generated_at: Utc::now().to_rfc3339(),
            config,
            collections,
        }
    }

    /// Write bundled content for every document or collection the store lacks.
    /// Returns how many documents and collections were seeded.
    pub async fn seed_missing(&self) -> Result<usize, AppError> {
        let mut seeded = 0;

        for key in ConfigKey::ALL {
            if self
                .store
                .get_doc(SITE_CONTENT_COLLECTION, key.as_str())
                .await?
                .is_none()
            {
                self.store
                    .set_doc(
                        SITE_CONTENT_COLLECTION,
                        key.as_str(),
                        &InitialData::config_doc(key),
                        false,
                    )
                    .await?;
                seeded += 1;
            }
        }

        for name in CollectionName::ALL {
            if self.store.get_all_docs(name.as_str()).await?.is_empty() {
                self.store
                    .batch_replace(name.as_str(), &InitialData::collection_items(name))
                    .await?;
                seeded += 1;
            }
        }

        if seeded > 0 {
            tracing::info!("Seeded {} documents/collections from bundled data", seeded);
        }
        Ok(seeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use serde_json::{json, Value};

    fn service() -> (ContentService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ContentService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_missing_about_falls_back() {
        let (content, _store) = service();
        let about = content.get_about_data().await;
        assert_eq!(about["foundedYear"], 1956);
    }

    #[tokio::test]
    async fn test_stored_document_wins_over_fallback() {
        let (content, store) = service();
        store
            .set_doc(
                SITE_CONTENT_COLLECTION,
                "footer",
                json!({"email": "a@x.com"}).as_object().unwrap(),
                false,
            )
            .await
            .unwrap();
        assert_eq!(content.get_footer_data().await["email"], "a@x.com");
    }

    #[tokio::test]
    async fn test_collection_sorted_by_order() {
        let (content, store) = service();
        let items: Vec<Document> = vec![
            json!({"id": "e1", "title": "Fest", "order": 1}),
            json!({"id": "e2", "title": "Workshop", "order": 0}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();
        store.batch_replace("events", &items).await.unwrap();

        let events = content.get_collection(CollectionName::Events).await;
        let ids: Vec<_> = events.iter().map(|e| e["id"].clone()).collect();
        assert_eq!(ids, vec![Value::from("e2"), Value::from("e1")]);
    }

    #[tokio::test]
    async fn test_seed_missing_only_fills_gaps() {
        let (content, store) = service();
        store
            .set_doc(
                SITE_CONTENT_COLLECTION,
                "hero",
                json!({"title": "Custom"}).as_object().unwrap(),
                false,
            )
            .await
            .unwrap();

        let seeded = content.seed_missing().await.unwrap();
        assert_eq!(seeded, ConfigKey::ALL.len() - 1 + CollectionName::ALL.len());
        assert_eq!(content.get_hero_data().await["title"], "Custom");
        assert_eq!(content.seed_missing().await.unwrap(), 0);
    }
}
