//! Club Content Backend
//!
//! Serves the public site content of a college cultural club and the admin
//! editing surface behind it, persisted in a document store.

mod api;
mod auth;
mod config;
mod content;
mod db;
mod editor;
mod errors;
mod models;
mod notifications;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::{AuthService, Role};
use config::{Config, StoreBackend};
use content::{AppDataCache, ContentService};
use db::{DocumentStore, MemoryStore, SqliteStore};
use editor::WorkspaceRegistry;
use notifications::NotificationChannel;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub content: ContentService,
    pub cache: Arc<AppDataCache>,
    pub auth: Arc<AuthService>,
    pub workspaces: Arc<WorkspaceRegistry>,
    pub notifications: NotificationChannel,
}

impl AppState {
    /// Must be called inside a tokio runtime: it spawns the session watcher.
    pub fn new(config: &Config, store: Arc<dyn DocumentStore>) -> Self {
        let content = ContentService::new(store.clone());
        let cache = Arc::new(AppDataCache::new());
        let notifications = NotificationChannel::new(config.notification_ttl);
        let auth = Arc::new(AuthService::new(store.clone(), config.session_ttl));
        let workspaces = Arc::new(WorkspaceRegistry::new(
            content.clone(),
            cache.clone(),
            notifications.clone(),
        ));
        editor::watch_sessions(auth.subscribe(), workspaces.clone());

        Self {
            store,
            content,
            cache,
            auth,
            workspaces,
            notifications,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting club content backend");
    tracing::info!("Store backend: {:?}", config.store);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize document store
    let store: Arc<dyn DocumentStore> = match config.store {
        StoreBackend::Sqlite => {
            tracing::info!("Database path: {:?}", config.db_path);
            let pool = db::init_database(&config.db_path).await?;
            Arc::new(SqliteStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store. Edits are lost on restart!");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(&config, store);

    if config.seed_on_start {
        state.content.seed_missing().await?;
    }

    match &config.bootstrap_admin {
        Some(admin) => {
            if state
                .auth
                .ensure_account(&admin.email, &admin.secret, Role::Administrator)
                .await?
            {
                tracing::info!("Bootstrap administrator {} created", admin.email);
            }
        }
        None => tracing::warn!(
            "No bootstrap administrator configured (CLUB_ADMIN_EMAIL/CLUB_ADMIN_SECRET)"
        ),
    }

    // Expired sessions are dropped even when nobody signs in again
    let auth = state.auth.clone();
    tokio::spawn(async move {
        let mut sweep = tokio::time::interval(Duration::from_secs(60));
        loop {
            sweep.tick().await;
            let purged = auth.purge_expired().await;
            if purged > 0 {
                tracing::info!("Purged {} expired sessions", purged);
            }
        }
    });

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Admin editing surface, any role that may edit content
    let editor_routes = Router::new()
        // Config sections
        .route("/config", get(api::get_config_draft))
        .route("/config/save", post(api::save_config))
        .route("/config/reset", post(api::reset_config))
        .route("/config/{key}", put(api::put_config_section))
        .route("/config/{key}/{field}", patch(api::patch_config_field))
        .route("/config/{key}/{field}/rows", post(api::add_config_row))
        .route(
            "/config/{key}/{field}/rows/{index}",
            delete(api::remove_config_row),
        )
        // Collections
        .route("/collections/{name}", get(api::get_collection_editor))
        .route("/collections/{name}/items", post(api::begin_create))
        .route("/collections/{name}/items/{id}/edit", post(api::begin_edit))
        .route("/collections/{name}/items/{id}/delete", post(api::request_delete))
        .route("/collections/{name}/modal", patch(api::patch_modal))
        .route("/collections/{name}/modal/save", post(api::save_modal))
        .route("/collections/{name}/modal/close", post(api::close_modal))
        .route("/collections/{name}/modal/rows/{field}", post(api::add_modal_row))
        .route(
            "/collections/{name}/modal/rows/{field}/{index}",
            delete(api::remove_modal_row),
        )
        .route("/collections/{name}/delete/confirm", post(api::confirm_delete))
        .route("/collections/{name}/delete/cancel", post(api::cancel_delete))
        .route("/collections/{name}/drag/start", post(api::begin_drag))
        .route("/collections/{name}/drag/move", post(api::drag_move))
        .route("/collections/{name}/drag/cancel", post(api::cancel_drag))
        .route("/collections/{name}/drag/drop", post(api::finish_drag))
        .route("/collections/{name}/reorder", post(api::reorder))
        // Schemas
        .route("/schema/config/{key}", get(api::get_config_schema))
        .route("/schema/collections/{name}", get(api::get_collection_schema))
        // Notifications
        .route("/notifications", get(api::list_notifications))
        .route("/notifications/{id}", delete(api::dismiss_notification))
        // Cache and workspace
        .route("/site/refresh", post(api::refresh_site))
        .route("/reload", post(api::reload_workspace))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth::require_editor,
        ));

    // Account management, administrators only
    let account_routes = Router::new()
        .route(
            "/accounts",
            get(api::list_accounts).post(api::create_account),
        )
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth::require_admin,
        ));

    // Public reads and session endpoints (no auth required)
    let public_routes = Router::new()
        .route("/site", get(api::get_site))
        .route("/content/{key}", get(api::get_content))
        .route("/collections/{name}", get(api::get_collection))
        .route("/auth/sign-in", post(api::sign_in))
        .route("/auth/sign-out", post(api::sign_out))
        .route("/auth/session", get(api::get_session));

    let api_routes = Router::new()
        .nest("/admin", editor_routes.merge(account_routes))
        .merge(public_routes);

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
