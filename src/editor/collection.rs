//! Collection editor: list, modal create/edit, confirmed delete and drag reorder.
//!
//! Every mutation is applied to the draft first and then persisted. On a
//! confirmed store failure the draft goes back to the state it had before the
//! operation started, so a failed operation is never partially visible.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use super::draft::DraftState;
use super::fields::{add_row, blank_like, remove_row, EntitySchema, FormField};
use crate::db::DocumentStore;
use crate::errors::AppError;
use crate::models::{
    item_id, item_order, new_item_id, renumber, sort_by_order, CollectionName, Document,
    InitialData,
};
use crate::notifications::NotificationChannel;

#[derive(Debug, Clone, PartialEq)]
pub enum EditorMode {
    Viewing,
    /// Modal open on a shallow copy of an item.
    Editing { item: Document, is_new: bool },
    /// Drag in progress; `pre_drag` is restored if the drop fails.
    Reordering { pre_drag: Vec<Document> },
}

/// Serializable snapshot of an editor for the admin console.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionView {
    pub collection: CollectionName,
    pub items: Vec<Document>,
    pub has_changes: bool,
    pub mode: ModeView,
    pub pending_delete: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ModeView {
    Viewing,
    #[serde(rename_all = "camelCase")]
    Editing {
        item: Document,
        is_new: bool,
        form: Vec<FormField>,
    },
    Reordering,
}

pub struct CollectionEditor {
    name: CollectionName,
    store: Arc<dyn DocumentStore>,
    notifications: NotificationChannel,
    schema: EntitySchema,
    state: DraftState<Vec<Document>>,
    mode: EditorMode,
    pending_delete: Option<String>,
    /// False while `original` is the bundled fallback rather than store content.
    persisted: bool,
}

impl CollectionEditor {
    /// Load the collection; an empty or unreadable collection starts from the
    /// bundled items.
    pub async fn load(
        name: CollectionName,
        store: Arc<dyn DocumentStore>,
        notifications: NotificationChannel,
    ) -> Self {
        let (items, persisted) = fetch_items(name, store.as_ref()).await;
        Self {
            name,
            store,
            notifications,
            schema: EntitySchema::for_collection(name),
            state: DraftState::new(items),
            mode: EditorMode::Viewing,
            pending_delete: None,
            persisted,
        }
    }

    /// Refetch from the store, discarding uncommitted edits.
    pub async fn reload(&mut self) {
        let (items, persisted) = fetch_items(self.name, self.store.as_ref()).await;
        self.state.resync(items);
        self.persisted = persisted;
        self.mode = EditorMode::Viewing;
        self.pending_delete = None;
    }

    pub fn items(&self) -> &[Document] {
        self.state.draft()
    }

    pub fn original(&self) -> &[Document] {
        self.state.original()
    }

    pub fn has_changes(&self) -> bool {
        self.state.has_changes()
    }

    pub fn mode(&self) -> &EditorMode {
        &self.mode
    }

    pub fn view(&self) -> CollectionView {
        let mode = match self.mode() {
            EditorMode::Viewing => ModeView::Viewing,
            EditorMode::Editing { item, is_new } => ModeView::Editing {
                item: item.clone(),
                is_new: *is_new,
                form: self.schema.render(item),
            },
            EditorMode::Reordering { .. } => ModeView::Reordering,
        };
        CollectionView {
            collection: self.name,
            items: self.items().to_vec(),
            has_changes: self.has_changes(),
            mode,
            pending_delete: self.pending_delete.clone(),
        }
    }

    fn ensure_viewing(&self) -> Result<(), AppError> {
        match self.mode {
            EditorMode::Viewing => Ok(()),
            EditorMode::Editing { .. } => Err(AppError::Conflict(
                "An item is already open for editing".to_string(),
            )),
            EditorMode::Reordering { .. } => {
                Err(AppError::Conflict("A reorder is in progress".to_string()))
            }
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.state
            .draft()
            .iter()
            .position(|item| item_id(item) == Some(id))
    }

    fn not_found(&self, id: &str) -> AppError {
        AppError::NotFound(format!("{} item {} not found", self.name.as_str(), id))
    }

    // ==================== MODAL ====================

    /// Open the modal on a copy of an existing item.
    pub fn begin_edit(&mut self, id: &str) -> Result<&Document, AppError> {
        self.ensure_viewing()?;
        let index = self.position(id).ok_or_else(|| self.not_found(id))?;
        let item = self.state.draft()[index].clone();
        tracing::debug!("Editing {}/{}", self.name.as_str(), id);
        self.mode = EditorMode::Editing {
            item,
            is_new: false,
        };
        self.editing_item()
    }

    /// Open the modal on a new item shaped like the first existing one.
    /// Nothing is persisted until [`save_modal`](Self::save_modal).
    pub fn begin_create(&mut self) -> Result<&Document, AppError> {
        self.ensure_viewing()?;

        let mut item: Document = match self.state.draft().first() {
            Some(template) => template
                .iter()
                .filter(|(key, _)| key.as_str() != "id" && key.as_str() != "order")
                .map(|(key, value)| (key.clone(), blank_like(value)))
                .collect(),
            None => ["name", "title", "description"]
                .into_iter()
                .map(|key| (key.to_string(), Value::String(String::new())))
                .collect(),
        };
        let id = new_item_id(self.name, &item, Utc::now().timestamp_millis());
        item.insert("id".to_string(), Value::String(id));

        self.mode = EditorMode::Editing { item, is_new: true };
        self.editing_item()
    }

    fn editing_item(&self) -> Result<&Document, AppError> {
        match &self.mode {
            EditorMode::Editing { item, .. } => Ok(item),
            _ => Err(AppError::Conflict("No item is open for editing".to_string())),
        }
    }

    /// Change fields of the item in the modal. Every input is checked before
    /// any is applied, so a rejected field leaves the item untouched.
    pub fn set_fields(&mut self, inputs: Document) -> Result<&Document, AppError> {
        let EditorMode::Editing { item, .. } = &mut self.mode else {
            return Err(AppError::Conflict("No item is open for editing".to_string()));
        };

        let mut accepted = Vec::with_capacity(inputs.len());
        let mut rejected = BTreeMap::new();
        for (key, input) in inputs {
            match self.schema.coerce(&key, input, item) {
                Ok(value) => accepted.push((key, value)),
                Err(e) => {
                    rejected.insert(key, e.message());
                }
            }
        }
        if !rejected.is_empty() {
            return Err(AppError::InvalidFields(rejected));
        }

        item.extend(accepted);
        self.editing_item()
    }

    #[cfg(test)]
    pub fn set_field(&mut self, key: &str, input: Value) -> Result<&Document, AppError> {
        self.set_fields(Document::from_iter([(key.to_string(), input)]))
    }

    /// Append a blank row to an object-list field of the modal item.
    pub fn add_row(&mut self, field: &str) -> Result<&Document, AppError> {
        let EditorMode::Editing { item, .. } = &mut self.mode else {
            return Err(AppError::Conflict("No item is open for editing".to_string()));
        };
        add_row(self.schema.rows_mut(item, field)?);
        self.editing_item()
    }

    pub fn remove_row(&mut self, field: &str, index: usize) -> Result<&Document, AppError> {
        let EditorMode::Editing { item, .. } = &mut self.mode else {
            return Err(AppError::Conflict("No item is open for editing".to_string()));
        };
        remove_row(self.schema.rows_mut(item, field)?, index)?;
        self.editing_item()
    }

    /// Close the modal without saving; an unsaved new item is abandoned.
    pub fn close_modal(&mut self) {
        if matches!(self.mode, EditorMode::Editing { .. }) {
            self.mode = EditorMode::Viewing;
        }
    }

    /// Persist the modal item. New ids are inserted ahead of every existing
    /// item and written with the whole collection in one batch; known ids are
    /// overwritten in place.
    pub async fn save_modal(&mut self) -> Result<Document, AppError> {
        let EditorMode::Editing { item, is_new } = &self.mode else {
            return Err(AppError::Conflict("No item is open for editing".to_string()));
        };
        let mut item = item.clone();
        if *is_new {
            // The name is usually filled in after the modal opened.
            let id = new_item_id(self.name, &item, Utc::now().timestamp_millis());
            item.insert("id".to_string(), Value::String(id));
        }
        let id = item_id(&item)
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("Item is missing an id".to_string()))?;

        let is_insert = !self
            .original()
            .iter()
            .any(|existing| item_id(existing) == Some(id.as_str()));

        let before = self.state.draft().clone();

        if is_insert {
            let order = self
                .state
                .draft()
                .iter()
                .map(item_order)
                .filter(|order| *order != i64::MAX)
                .min()
                .map_or(-1, |min| min - 1);
            item.insert("order".to_string(), Value::from(order));
            self.state.draft_mut().insert(0, item.clone());
        } else {
            match self.position(&id) {
                Some(index) => self.state.draft_mut()[index] = item.clone(),
                None => return Err(self.not_found(&id)),
            }
        }

        // Bundled items only reach the store as part of a full batch.
        let result = if is_insert || !self.persisted {
            self.store
                .batch_replace(self.name.as_str(), self.state.draft())
                .await
        } else {
            self.store.set_doc(self.name.as_str(), &id, &item, false).await
        };

        match result {
            Ok(()) => {
                self.persisted = true;
                self.state.commit();
                self.mode = EditorMode::Viewing;
                let verb = if is_insert { "Created" } else { "Saved" };
                self.notifications
                    .success(format!("{} {} item", verb, self.name.as_str()));
                Ok(item)
            }
            Err(e) => {
                // The modal stays open with the operator's edits.
                self.state.set(before);
                self.notifications
                    .error(format!("Failed to save {} item: {}", self.name.as_str(), e.message()));
                Err(e)
            }
        }
    }

    // ==================== DELETE ====================

    /// First step of a delete: mark the item, awaiting confirmation.
    pub fn request_delete(&mut self, id: &str) -> Result<(), AppError> {
        self.ensure_viewing()?;
        if self.position(id).is_none() {
            return Err(self.not_found(id));
        }
        self.pending_delete = Some(id.to_string());
        Ok(())
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Remove the confirmed item locally, then from the store.
    pub async fn confirm_delete(&mut self) -> Result<String, AppError> {
        self.ensure_viewing()?;
        let id = self
            .pending_delete
            .take()
            .ok_or_else(|| AppError::Conflict("No delete is awaiting confirmation".to_string()))?;
        let index = self.position(&id).ok_or_else(|| self.not_found(&id))?;

        self.state.draft_mut().remove(index);

        let result = if self.persisted {
            match self.store.delete_doc(self.name.as_str(), &id).await {
                // Already absent remotely.
                Err(AppError::NotFound(_)) => Ok(()),
                other => other,
            }
        } else {
            self.store
                .batch_replace(self.name.as_str(), self.state.draft())
                .await
        };

        match result {
            Ok(()) => {
                self.persisted = true;
                self.state.commit();
                self.notifications
                    .success(format!("Deleted {} item", self.name.as_str()));
                Ok(id)
            }
            Err(e) => {
                self.state.reset();
                self.notifications.error(format!(
                    "Failed to delete {} item: {}",
                    self.name.as_str(),
                    e.message()
                ));
                Err(e)
            }
        }
    }

    // ==================== REORDER ====================

    pub fn begin_drag(&mut self) -> Result<(), AppError> {
        self.ensure_viewing()?;
        self.mode = EditorMode::Reordering {
            pre_drag: self.state.draft().clone(),
        };
        Ok(())
    }

    /// Move the item at `from` to `to` in the draft.
    pub fn drag_move(&mut self, from: usize, to: usize) -> Result<(), AppError> {
        if !matches!(self.mode, EditorMode::Reordering { .. }) {
            return Err(AppError::Conflict("No reorder is in progress".to_string()));
        }
        let len = self.state.draft().len();
        if from >= len || to >= len {
            return Err(AppError::Validation(format!(
                "Cannot move {} to {} in a list of {}",
                from, to, len
            )));
        }
        let items = self.state.draft_mut();
        let item = items.remove(from);
        items.insert(to, item);
        Ok(())
    }

    pub fn cancel_drag(&mut self) {
        if let EditorMode::Reordering { pre_drag } =
            std::mem::replace(&mut self.mode, EditorMode::Viewing)
        {
            self.state.set(pre_drag);
        }
    }

    /// Persist the dragged order: every item's `order` becomes its index and
    /// the whole collection is written in one batch.
    pub async fn finish_drag(&mut self) -> Result<(), AppError> {
        let pre_drag = match std::mem::replace(&mut self.mode, EditorMode::Viewing) {
            EditorMode::Reordering { pre_drag } => pre_drag,
            other => {
                self.mode = other;
                return Err(AppError::Conflict("No reorder is in progress".to_string()));
            }
        };

        renumber(self.state.draft_mut());

        match self
            .store
            .batch_replace(self.name.as_str(), self.state.draft())
            .await
        {
            Ok(()) => {
                self.persisted = true;
                self.state.commit();
                self.notifications
                    .success(format!("Reordered {}", self.name.as_str()));
                Ok(())
            }
            Err(e) => {
                self.state.set(pre_drag);
                self.notifications.error(format!(
                    "Failed to reorder {}: {}",
                    self.name.as_str(),
                    e.message()
                ));
                Err(e)
            }
        }
    }

    /// One-shot drag from `from` to `to` followed by a drop.
    pub async fn reorder(&mut self, from: usize, to: usize) -> Result<(), AppError> {
        self.begin_drag()?;
        if let Err(e) = self.drag_move(from, to) {
            self.cancel_drag();
            return Err(e);
        }
        self.finish_drag().await
    }
}

/// Items to edit, and whether they came from the store.
async fn fetch_items(name: CollectionName, store: &dyn DocumentStore) -> (Vec<Document>, bool) {
    let (mut items, persisted) = match store.get_all_docs(name.as_str()).await {
        Ok(items) if !items.is_empty() => (items, true),
        Ok(_) => (InitialData::collection_items(name), false),
        Err(e) => {
            tracing::warn!("Failed to load {} for editing: {}", name.as_str(), e);
            (InitialData::collection_items(name), false)
        }
    };
    sort_by_order(&mut items);
    (items, persisted)
}
