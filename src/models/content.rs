//! Config document keys, collection names and collection item helpers.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A schema-light JSON document as stored in the document store.
pub type Document = Map<String, Value>;

/// Collection that holds the singleton config documents.
pub const SITE_CONTENT_COLLECTION: &str = "site_content";

/// Singleton config documents, one per site concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKey {
    Hero,
    About,
    Join,
    Footer,
    Theme,
    General,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 6] = [
        ConfigKey::Hero,
        ConfigKey::About,
        ConfigKey::Join,
        ConfigKey::Footer,
        ConfigKey::Theme,
        ConfigKey::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::Hero => "hero",
            ConfigKey::About => "about",
            ConfigKey::Join => "join",
            ConfigKey::Footer => "footer",
            ConfigKey::Theme => "theme",
            ConfigKey::General => "general",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        ConfigKey::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// Ordered, identity-keyed collections editable from the admin console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionName {
    Departments,
    Events,
    Achievements,
    Moderators,
    CurrentExecutives,
    PastExecutives,
}

impl CollectionName {
    pub const ALL: [CollectionName; 6] = [
        CollectionName::Departments,
        CollectionName::Events,
        CollectionName::Achievements,
        CollectionName::Moderators,
        CollectionName::CurrentExecutives,
        CollectionName::PastExecutives,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionName::Departments => "departments",
            CollectionName::Events => "events",
            CollectionName::Achievements => "achievements",
            CollectionName::Moderators => "moderators",
            CollectionName::CurrentExecutives => "current_executives",
            CollectionName::PastExecutives => "past_executives",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        CollectionName::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// The `id` of a collection item, if it has a string one.
pub fn item_id(item: &Document) -> Option<&str> {
    item.get("id").and_then(Value::as_str)
}

/// The display order of an item. Items without an integer order sort last.
pub fn item_order(item: &Document) -> i64 {
    item.get("order").and_then(Value::as_i64).unwrap_or(i64::MAX)
}

/// Stable ascending sort by `order`.
pub fn sort_by_order(items: &mut [Document]) {
    items.sort_by_key(item_order);
}

/// Rewrite every item's `order` to its zero-based position.
pub fn renumber(items: &mut [Document]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.insert("order".to_string(), Value::from(index as i64));
    }
}

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Lowercase, ASCII alphanumerics separated by single dashes.
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    NON_SLUG
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Fresh item id: a slug of the item's name (or title, or the collection) plus
/// the creation time in milliseconds.
pub fn new_item_id(collection: CollectionName, item: &Document, now_millis: i64) -> String {
    let label = ["name", "title"]
        .iter()
        .filter_map(|k| item.get(*k).and_then(Value::as_str))
        .map(slugify)
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(collection.as_str()));
    format!("{}-{}", label, now_millis)
}

/// Split a comma-separated id list, trimming entries and dropping empty ones.
pub fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Coerce any `...Ids` field given as a comma-separated string into an array.
pub fn coerce_id_lists(doc: &mut Document) {
    for (key, value) in doc.iter_mut() {
        if !key.ends_with("Ids") {
            continue;
        }
        if let Value::String(raw) = value {
            let ids = parse_id_list(raw).into_iter().map(Value::String).collect();
            *value = Value::Array(ids);
        }
    }
}
