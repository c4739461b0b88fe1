//! Public read endpoints backed by the site data cache.

use axum::extract::{Path, State};

use super::{error, parse_collection, parse_config_key, success, ApiResult};
use crate::models::{Document, SiteData};
use crate::AppState;

/// GET /api/site - Full site snapshot.
pub async fn get_site(State(state): State<AppState>) -> ApiResult<SiteData> {
    let site = state.cache.get(&state.content).await;
    let revision_id = site.revision_id;
    success(site.as_ref().clone(), revision_id)
}

/// GET /api/content/:key - One config section.
pub async fn get_content(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Document> {
    let site = state.cache.get(&state.content).await;

    match parse_config_key(&key) {
        Ok(key) => success(
            site.config(key).cloned().unwrap_or_default(),
            site.revision_id,
        ),
        Err(e) => error(e, site.revision_id),
    }
}

/// GET /api/collections/:name - Items of one collection, in display order.
pub async fn get_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Vec<Document>> {
    let site = state.cache.get(&state.content).await;

    match parse_collection(&name) {
        Ok(name) => success(site.collection(name).to_vec(), site.revision_id),
        Err(e) => error(e, site.revision_id),
    }
}

/// POST /api/admin/site/refresh - Drop the cached snapshot and rebuild it.
pub async fn refresh_site(State(state): State<AppState>) -> ApiResult<SiteData> {
    let site = state.cache.refresh(&state.content).await;
    tracing::info!("Site data refreshed at revision {}", site.revision_id);
    let revision_id = site.revision_id;
    success(site.as_ref().clone(), revision_id)
}
