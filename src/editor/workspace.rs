//! Owner of every open editor and of the link back to the site cache.
//!
//! Each signed-in session gets its own [`AdminWorkspace`], so two editors
//! never share a draft. A workspace is dropped when its session signs out or
//! expires.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use super::collection::CollectionEditor;
use super::config::{ConfigEditor, SaveOutcome};
use crate::auth::SessionEvent;
use crate::content::{AppDataCache, ContentService};
use crate::errors::AppError;
use crate::models::{CollectionName, Document};
use crate::notifications::NotificationChannel;

pub type SharedWorkspace = Arc<Mutex<AdminWorkspace>>;

/// Workspaces keyed by session token.
pub struct WorkspaceRegistry {
    content: ContentService,
    cache: Arc<AppDataCache>,
    notifications: NotificationChannel,
    workspaces: Mutex<HashMap<String, SharedWorkspace>>,
}

impl WorkspaceRegistry {
    pub fn new(
        content: ContentService,
        cache: Arc<AppDataCache>,
        notifications: NotificationChannel,
    ) -> Self {
        Self {
            content,
            cache,
            notifications,
            workspaces: Mutex::new(HashMap::new()),
        }
    }

    /// The session's workspace, opened empty on first use.
    pub async fn for_session(&self, token: &str) -> SharedWorkspace {
        let mut workspaces = self.workspaces.lock().await;
        workspaces
            .entry(token.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(AdminWorkspace::new(
                    self.content.clone(),
                    self.cache.clone(),
                    self.notifications.clone(),
                )))
            })
            .clone()
    }

    /// Discard a session's workspace with every uncommitted edit in it.
    pub async fn close(&self, token: &str) -> bool {
        self.workspaces.lock().await.remove(token).is_some()
    }

    pub async fn len(&self) -> usize {
        self.workspaces.lock().await.len()
    }
}

/// Log session changes and close the workspace of every session that ends.
pub fn watch_sessions(
    mut events: broadcast::Receiver<SessionEvent>,
    registry: Arc<WorkspaceRegistry>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::SignedIn(session)) => {
                    tracing::debug!("Session opened for {}", session.email);
                }
                Ok(event @ (SessionEvent::SignedOut(_) | SessionEvent::Expired(_))) => {
                    let session = event.session();
                    if registry.close(&session.token).await {
                        tracing::info!(
                            "Closed workspace of {} ({} still open)",
                            session.email,
                            registry.len().await
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("Session watcher missed {} events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Editors are loaded on first use and kept until reloaded. Each successful
/// commit invalidates the shared site cache so public reads see the write.
pub struct AdminWorkspace {
    content: ContentService,
    cache: Arc<AppDataCache>,
    notifications: NotificationChannel,
    config: Option<ConfigEditor>,
    collections: HashMap<CollectionName, CollectionEditor>,
}

impl AdminWorkspace {
    pub fn new(
        content: ContentService,
        cache: Arc<AppDataCache>,
        notifications: NotificationChannel,
    ) -> Self {
        Self {
            content,
            cache,
            notifications,
            config: None,
            collections: HashMap::new(),
        }
    }

    pub async fn config_editor(&mut self) -> &mut ConfigEditor {
        let editor = match self.config.take() {
            Some(editor) => editor,
            None => ConfigEditor::load(&self.content, self.notifications.clone()).await,
        };
        self.config.insert(editor)
    }

    pub async fn collection_editor(&mut self, name: CollectionName) -> &mut CollectionEditor {
        let store = self.content.store().clone();
        let notifications = self.notifications.clone();
        match self.collections.entry(name) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                tracing::debug!("Opening editor for {}", name.as_str());
                entry.insert(CollectionEditor::load(name, store, notifications).await)
            }
        }
    }

    /// Drop every uncommitted edit and refetch from the store.
    pub async fn reload(&mut self) {
        if let Some(config) = self.config.as_mut() {
            config.reload(&self.content).await;
        }
        for editor in self.collections.values_mut() {
            editor.reload().await;
        }
    }

    async fn committed<T>(&self, result: Result<T, AppError>) -> Result<T, AppError> {
        if result.is_ok() {
            self.cache.invalidate().await;
        }
        result
    }

    pub async fn save_config(&mut self) -> Result<SaveOutcome, AppError> {
        let result = self.config_editor().await.save().await;
        self.committed(result).await
    }

    pub async fn save_modal(&mut self, name: CollectionName) -> Result<Document, AppError> {
        let result = self.collection_editor(name).await.save_modal().await;
        self.committed(result).await
    }

    pub async fn confirm_delete(&mut self, name: CollectionName) -> Result<String, AppError> {
        let result = self.collection_editor(name).await.confirm_delete().await;
        self.committed(result).await
    }

    pub async fn finish_drag(&mut self, name: CollectionName) -> Result<(), AppError> {
        let result = self.collection_editor(name).await.finish_drag().await;
        self.committed(result).await
    }

    pub async fn reorder(
        &mut self,
        name: CollectionName,
        from: usize,
        to: usize,
    ) -> Result<(), AppError> {
        let result = self.collection_editor(name).await.reorder(from, to).await;
        self.committed(result).await
    }
}
