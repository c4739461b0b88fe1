//! Bundled initial content, used whenever the store has nothing to offer.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::Deserialize;

use super::{sort_by_order, CollectionName, ConfigKey, Document};

const INITIAL_DATA_JSON: &str = include_str!("../../data/initial_data.json");

/// Snapshot shipped with the binary.
#[derive(Debug, Clone, Deserialize)]
pub struct InitialData {
    pub config: BTreeMap<ConfigKey, Document>,
    pub collections: BTreeMap<CollectionName, Vec<Document>>,
}

static INITIAL_DATA: Lazy<InitialData> = Lazy::new(|| {
    serde_json::from_str(INITIAL_DATA_JSON).expect("bundled initial_data.json must be valid")
});

impl InitialData {
    pub fn get() -> &'static InitialData {
        &INITIAL_DATA
    }

    /// Fallback for a config document; empty if the snapshot has none.
    pub fn config_doc(key: ConfigKey) -> Document {
        Self::get().config.get(&key).cloned().unwrap_or_default()
    }

    /// Fallback items for a collection, sorted by order.
    pub fn collection_items(name: CollectionName) -> Vec<Document> {
        let mut items = Self::get()
            .collections
            .get(&name)
            .cloned()
            .unwrap_or_default();
        sort_by_order(&mut items);
        items
    }
}
