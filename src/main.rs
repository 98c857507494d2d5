//! community-feed: a cached, lane-paginated content feed for a media
//! community site.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌────────────┐ fetch() ┌──────────────┐ replace() ┌──────────────┐ read() ┌───────────┐
//! │  source/   │ ◄────── │   poll.rs    │ ────────► │   cache.rs   │ ◄───── │  feed.rs  │ ◄── GET /feed
//! │ (upstream) │         │ (1 task per  │           │ (1 per src,  │        │ (lanes)   │
//! └────────────┘         │   source)    │           │  Arc swap)   │        └───────────┘
//!                        └──────────────┘           └──────────────┘ ◄───── routes.rs ◄── GET /podcast, /health
//! ```
//!
//! * **`source/`**: the `DataSource` trait and the video, microblog,
//!   podcast and comments implementations.
//! * **`poll`**: refreshes every source once at startup, then on its own
//!   interval in a background task.
//! * **`cache`**: one atomically-swapped snapshot per source.
//! * **`feed`**: builds `/feed` pages from fixed-size per-source lanes.
//! * **`routes`**: actix-web handlers; read-only over the caches.
//! * **`main`**: wires everything together: config, tracing, caches, the
//!   startup refresh, the server, and shutdown.

mod cache;
mod config;
mod error;
mod feed;
mod poll;
mod routes;
mod source;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache::SourceCache;
use config::Config;
use feed::FeedPaginator;
use poll::{Refresher, Scheduler};
use routes::AppState;
use source::{CommentsSource, MicroblogSource, PodcastSource, VideoSource};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    // -- upstream clients ----------------------------------------------------
    let http = reqwest::Client::builder()
        .timeout(config.upstream.request_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    // Lazy: a database that is down at boot only fails the comments refresh.
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.upstream.request_timeout)
        .connect_lazy(&config.database.url)
        .context("invalid DATABASE_URL")?;

    // -- caches, one per source ----------------------------------------------
    let video_cache = Arc::new(SourceCache::new("video"));
    let microblog_cache = Arc::new(SourceCache::new("microblog"));
    let comments_cache = Arc::new(SourceCache::new("comments"));
    let podcast_cache = Arc::new(SourceCache::new("podcast"));

    // -- refreshers ----------------------------------------------------------
    let intervals = config.intervals;
    let refresh_timeout = config.upstream.refresh_timeout;
    let mut refreshers = Vec::new();

    match &config.video {
        Some(video) => refreshers.push(Refresher::new(
            Arc::new(VideoSource::new(
                http.clone(),
                video.api_base.as_str(),
                video.api_key.as_str(),
                video.channel_id.as_str(),
                video.clips_channel_id.as_str(),
            )),
            video_cache.clone(),
            intervals.video,
        )),
        None => tracing::warn!("video credentials not configured, the video lane stays empty"),
    }
    refreshers.push(Refresher::new(
        Arc::new(MicroblogSource::new(
            http.clone(),
            config.microblog.api_base.as_str(),
            config.microblog.handles.clone(),
        )),
        microblog_cache.clone(),
        intervals.microblog,
    ));
    refreshers.push(Refresher::new(
        Arc::new(CommentsSource::new(pool, config.feed.comments_limit())),
        comments_cache.clone(),
        intervals.comments,
    ));
    refreshers.push(Refresher::new(
        Arc::new(PodcastSource::new(http, config.podcast.feed_url.as_str())),
        podcast_cache.clone(),
        intervals.podcast,
    ));

    let refreshers = refreshers
        .into_iter()
        .map(|r| r.with_timeout(refresh_timeout))
        .collect();
    let scheduler = Scheduler::new(refreshers);

    // First paint must not show an empty feed.
    scheduler.refresh_all().await;
    let scheduler = scheduler.spawn();

    // -- HTTP server ---------------------------------------------------------
    let state = web::Data::new(AppState {
        paginator: FeedPaginator::new(
            vec![video_cache.clone(), microblog_cache.clone(), comments_cache.clone()],
            config.feed.per_source,
            config.feed.max_pages,
        ),
        podcast: podcast_cache.clone(),
        caches: vec![video_cache, microblog_cache, comments_cache, podcast_cache],
    });

    let bind_address = config.bind_address();
    tracing::info!(
        address = %bind_address,
        per_source = config.feed.per_source,
        max_pages = config.feed.max_pages,
        "starting HTTP server"
    );

    let served = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {bind_address}"));

    // actix handles SIGINT/SIGTERM; the scheduler is stopped either way.
    let result = match served {
        Ok(server) => server.run().await.context("HTTP server error"),
        Err(e) => Err(e),
    };

    scheduler.shutdown().await;
    result
}
