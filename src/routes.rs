//! HTTP handlers.
//!
//! Every handler answers from the in-memory caches only.  Page validation
//! happens here so the paginator never sees an out-of-range page.

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheState, RefreshFailure, SourceCache};
use crate::error::{AppError, FailureKind};
use crate::feed::FeedPaginator;
use crate::source::FeedItem;

/// Shared, read-only view over the caches.
pub struct AppState {
    pub paginator: FeedPaginator,
    pub podcast: Arc<SourceCache>,
    /// Every cache, for `/health`.
    pub caches: Vec<Arc<SourceCache>>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/feed", web::get().to(get_feed))
        .route("/podcast", web::get().to(get_podcast))
        .route("/health", web::get().to(health));
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_page() -> u32 {
    1
}

pub async fn get_feed(
    query: web::Query<FeedQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let max_pages = state.paginator.max_pages();
    if !(1..=max_pages).contains(&query.page) {
        return Err(AppError::BadRequest(format!(
            "page must be between 1 and {max_pages}"
        )));
    }

    let page = state.paginator.build_page(query.page);
    tracing::debug!(page = page.page, items = page.items.len(), "serving feed page");
    Ok(HttpResponse::Ok().json(page))
}

#[derive(Debug, Serialize)]
struct PodcastResponse {
    items: Vec<FeedItem>,
    last_updated: Option<DateTime<Utc>>,
}

pub async fn get_podcast(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let snapshot = state.podcast.snapshot();

    if snapshot.items.is_empty() {
        if let Some(failure) = state.podcast.last_failure() {
            if failure.kind == FailureKind::Malformed {
                return Err(AppError::BadGateway(format!(
                    "podcast feed could not be parsed: {}",
                    failure.message
                )));
            }
        }
    }

    Ok(HttpResponse::Ok().json(PodcastResponse {
        items: snapshot.items.clone(),
        last_updated: snapshot.last_updated,
    }))
}

#[derive(Debug, Serialize)]
struct SourceHealth {
    name: String,
    state: CacheState,
    items: usize,
    last_updated: Option<DateTime<Utc>>,
    last_failure: Option<RefreshFailure>,
}

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let sources: Vec<SourceHealth> = state
        .caches
        .iter()
        .map(|cache| {
            let snapshot = cache.snapshot();
            SourceHealth {
                name: cache.name().to_string(),
                state: cache.state(),
                items: snapshot.items.len(),
                last_updated: snapshot.last_updated,
                last_failure: cache.last_failure(),
            }
        })
        .collect();

    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "sources": sources,
    }))
}
