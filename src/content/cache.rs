//! Read-through cache of the aggregated site snapshot.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::ContentService;
use crate::models::SiteData;

/// Owned cache of [`SiteData`].
///
/// Invalidated explicitly by editors after each commit and by the admin
/// refresh endpoint. A cached snapshot whose revision no longer matches the
/// store is reloaded on the next read.
#[derive(Default)]
pub struct AppDataCache {
    snapshot: RwLock<Option<Arc<SiteData>>>,
}

impl AppDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached snapshot, loading it when absent or stale.
    pub async fn get(&self, content: &ContentService) -> Arc<SiteData> {
        let current_revision = content.store().revision().await.ok();

        if let Some(cached) = self.snapshot.read().await.as_ref() {
            if current_revision.map_or(true, |rev| rev == cached.revision_id) {
                return cached.clone();
            }
        }

        self.refresh(content).await
    }

    /// Reload unconditionally.
    pub async fn refresh(&self, content: &ContentService) -> Arc<SiteData> {
        let fresh = Arc::new(content.get_app_data().await);
        tracing::debug!("Site data cache loaded at revision {}", fresh.revision_id);
        *self.snapshot.write().await = Some(fresh.clone());
        fresh
    }

    pub async fn invalidate(&self) {
        self.snapshot.write().await.take();
    }

    #[cfg(test)]
    pub async fn is_cached(&self) -> bool {
        self.snapshot.read().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DocumentStore, MemoryStore};
    use crate::models::{ConfigKey, SITE_CONTENT_COLLECTION};
    use serde_json::json;

    #[tokio::test]
    async fn test_cache_reloads_after_store_write() {
        let store = Arc::new(MemoryStore::new());
        let content = ContentService::new(store.clone());
        let cache = AppDataCache::new();

        let first = cache.get(&content).await;
        let again = cache.get(&content).await;
        assert!(Arc::ptr_eq(&first, &again));

        store
            .set_doc(
                SITE_CONTENT_COLLECTION,
                "hero",
                json!({"title": "Updated"}).as_object().unwrap(),
                false,
            )
            .await
            .unwrap();

        let fresh = cache.get(&content).await;
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert_eq!(fresh.config(ConfigKey::Hero).unwrap()["title"], "Updated");
    }

    #[tokio::test]
    async fn test_invalidate_drops_snapshot() {
        let content = ContentService::new(Arc::new(MemoryStore::new()));
        let cache = AppDataCache::new();
        cache.get(&content).await;
        assert!(cache.is_cached().await);
        cache.invalidate().await;
        assert!(!cache.is_cached().await);
    }
}
