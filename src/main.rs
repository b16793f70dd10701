//! MUA client core diagnostic
//!
//! Loads the stored session, connects the push channel, pulls the first feed
//! page and one page of artist search results through the sync layer, and logs
//! what a view would render.

use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mua_sync::api::HttpApi;
use mua_sync::config::Config;
use mua_sync::models::UserSummary;
use mua_sync::realtime::{transport, EventBus};
use mua_sync::search::ArtistSearch;
use mua_sync::session::{Gate, Session, ViewerContext};
use mua_sync::sync::{FeedSync, FollowTracker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting MUA client core diagnostic");
    tracing::info!("API base URL: {}", config.api_base_url);
    tracing::info!("Push channel: {}", config.socket_url);
    tracing::info!("Session file: {:?}", config.session_path);

    let session = Session::load(&config.session_path)?;
    let api = HttpApi::from_session(&config, &session);

    // Reads work signed out; the viewer is then anonymous and never matches
    // an event actor.
    let viewer = match session.gate() {
        Gate::Proceed(viewer) => {
            tracing::info!("Signed in as {}", viewer.id());
            Some(viewer)
        }
        Gate::RedirectToLogin => {
            tracing::warn!("No stored session; actions would redirect to login");
            None
        }
    };

    let (bus, commands) = EventBus::new();
    let mut feed_events = bus.subscribe(FeedSync::EVENTS);
    let push = tokio::spawn(transport::run(
        config.socket_url.clone(),
        bus.clone(),
        commands,
    ));

    let mut feed = FeedSync::new(
        viewer
            .clone()
            .unwrap_or_else(|| ViewerContext::new(UserSummary::new("", ""))),
    );
    feed.load(&api, config.page_size).await;
    let pushed = feed_events
        .drain()
        .iter()
        .filter(|event| feed.handle_event(event))
        .count();
    tracing::info!("Push events applied to the feed: {}", pushed);
    tracing::info!("Feed: {} posts, more pages: {}", feed.posts().len(), feed.has_more());
    for post in feed.featured(3) {
        tracing::info!(
            "Featured {} by {}: {} likes, {} comments",
            post.id,
            post.author.name,
            post.likes_count,
            post.comments_count
        );
    }

    let mut search = ArtistSearch::new(config.page_size);
    let page = search.refresh(&api).await;
    tracing::info!(
        "Artists: {} of {} (page {} of {})",
        page.items.len(),
        page.total,
        page.page,
        page.total_pages
    );

    if let Some(viewer) = viewer {
        let mut follows = FollowTracker::new(viewer);
        follows.seed(&api).await;
        if let Some(counts) = follows.refresh_counts(&api).await {
            tracing::info!(
                "Followers: {}, following: {}",
                counts.followers,
                counts.following
            );
        }
    }

    bus.close();
    match tokio::time::timeout(Duration::from_secs(2), push).await {
        Ok(Ok(Err(e))) => tracing::warn!("Push channel ended with an error: {}", e),
        Ok(Err(e)) => tracing::warn!("Push task failed: {}", e),
        Err(_) => tracing::warn!("Push channel did not shut down in time"),
        Ok(Ok(Ok(()))) => {}
    }

    Ok(())
}
