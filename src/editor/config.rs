//! Save/reset controller over the singleton config documents.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use serde_json::Value;

use super::draft::DraftState;
use super::fields::{add_row, remove_row, EntitySchema, FormField};
use crate::content::ContentService;
use crate::db::DocumentStore;
use crate::errors::AppError;
use crate::models::{
    coerce_id_lists, parse_id_list, ConfigKey, Document, SITE_CONTENT_COLLECTION,
};
use crate::notifications::NotificationChannel;

pub type ConfigBundle = BTreeMap<ConfigKey, Document>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "sections", rename_all = "camelCase")]
pub enum SaveOutcome {
    /// Nothing differed from the last save.
    Unchanged,
    Saved(Vec<ConfigKey>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigView {
    pub draft: ConfigBundle,
    pub has_changes: bool,
    pub actions_visible: bool,
    pub changed_sections: Vec<ConfigKey>,
    pub forms: BTreeMap<ConfigKey, Vec<FormField>>,
}

/// Edits to every config section, saved together.
///
/// A failed save leaves the draft untouched: those edits were never reported
/// as persisted, so the operator can retry or reset.
pub struct ConfigEditor {
    store: Arc<dyn DocumentStore>,
    notifications: NotificationChannel,
    state: DraftState<ConfigBundle>,
}

impl ConfigEditor {
    pub async fn load(content: &ContentService, notifications: NotificationChannel) -> Self {
        Self {
            store: content.store().clone(),
            notifications,
            state: DraftState::new(fetch_bundle(content).await),
        }
    }

    pub async fn reload(&mut self, content: &ContentService) {
        self.state.resync(fetch_bundle(content).await);
    }

    pub fn draft(&self) -> &ConfigBundle {
        self.state.draft()
    }

    pub fn original(&self) -> &ConfigBundle {
        self.state.original()
    }

    pub fn has_changes(&self) -> bool {
        self.state.has_changes()
    }

    /// The save/reset bar is only offered while there is something to save.
    pub fn actions_visible(&self) -> bool {
        self.has_changes()
    }

    pub fn changed_sections(&self) -> Vec<ConfigKey> {
        ConfigKey::ALL
            .into_iter()
            .filter(|key| self.state.draft().get(key) != self.state.original().get(key))
            .collect()
    }

    pub fn view(&self) -> ConfigView {
        let forms = self
            .state
            .draft()
            .iter()
            .map(|(key, doc)| (*key, EntitySchema::for_config(*key).render(doc)))
            .collect();
        ConfigView {
            draft: self.state.draft().clone(),
            has_changes: self.has_changes(),
            actions_visible: self.actions_visible(),
            changed_sections: self.changed_sections(),
            forms,
        }
    }

    /// Replace a whole section of the draft.
    pub fn set_section(&mut self, key: ConfigKey, mut doc: Document) {
        coerce_id_lists(&mut doc);
        self.state.draft_mut().insert(key, doc);
    }

    /// Change one field of a section, coerced through the section's schema.
    pub fn set_field(&mut self, key: ConfigKey, field: &str, input: Value) -> Result<(), AppError> {
        let input = match input {
            Value::String(raw) if field.ends_with("Ids") => Value::Array(
                parse_id_list(&raw).into_iter().map(Value::String).collect(),
            ),
            other => other,
        };
        let section = self.state.draft_mut().entry(key).or_default();
        let value = EntitySchema::for_config(key).coerce(field, input, section)?;
        section.insert(field.to_string(), value);
        Ok(())
    }

    /// Append a blank row to an object-list field of a section.
    pub fn add_row(&mut self, key: ConfigKey, field: &str) -> Result<(), AppError> {
        let section = self.state.draft_mut().entry(key).or_default();
        add_row(EntitySchema::for_config(key).rows_mut(section, field)?);
        Ok(())
    }

    pub fn remove_row(&mut self, key: ConfigKey, field: &str, index: usize) -> Result<(), AppError> {
        let section = self.state.draft_mut().entry(key).or_default();
        remove_row(EntitySchema::for_config(key).rows_mut(section, field)?, index)?;
        Ok(())
    }

    /// Persist each changed section concurrently; commit only if all succeed.
    pub async fn save(&mut self) -> Result<SaveOutcome, AppError> {
        let changed = self.changed_sections();
        if changed.is_empty() {
            return Ok(SaveOutcome::Unchanged);
        }

        let empty = Document::new();
        let writes = changed.iter().map(|key| {
            let doc = self.state.draft().get(key).unwrap_or(&empty);
            self.store
                .set_doc(SITE_CONTENT_COLLECTION, key.as_str(), doc, false)
        });

        let result = try_join_all(writes).await;
        match result {
            Ok(_) => {
                self.state.commit();
                let names: Vec<_> = changed.iter().map(ConfigKey::as_str).collect();
                self.notifications
                    .success(format!("Saved {}", names.join(", ")));
                Ok(SaveOutcome::Saved(changed))
            }
            Err(e) => {
                self.notifications
                    .error(format!("Failed to save settings: {}", e.message()));
                Err(e)
            }
        }
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }
}

async fn fetch_bundle(content: &ContentService) -> ConfigBundle {
    let mut bundle = ConfigBundle::new();
    for key in ConfigKey::ALL {
        bundle.insert(key, content.get_config(key).await);
    }
    bundle
}
