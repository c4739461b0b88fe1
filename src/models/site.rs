//! Aggregated site snapshot served to the public pages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{CollectionName, ConfigKey, Document};

/// Every config document and collection in one read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteData {
    pub revision_id: i64,
    pub generated_at: String,
    pub config: BTreeMap<ConfigKey, Document>,
    pub collections: BTreeMap<CollectionName, Vec<Document>>,
}

impl SiteData {
    pub fn config(&self, key: ConfigKey) -> Option<&Document> {
        self.config.get(&key)
    }

    pub fn collection(&self, name: CollectionName) -> &[Document] {
        self.collections
            .get(&name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
