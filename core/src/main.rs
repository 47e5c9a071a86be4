/// Threadline smoke runner - sync the inbox and page the feed once
use std::env;
use threadline_core::{Config, Inbox, Session, Timeline};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Feed pages fetched per run
const FEED_PAGES: usize = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    // Parse configuration
    let args: Vec<String> = env::args().collect();
    let config = Config::from_args(&args)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    info!("Starting threadline against {}", config.base_url);
    info!("   Device: {}", config.uuid);

    let session = Session::http(config)
        .map_err(|e| anyhow::anyhow!("Session error: {}", e))?;

    let mut inbox = Inbox::new();
    inbox.sync(&session).await
        .map_err(|e| anyhow::anyhow!("Inbox sync failed: {}", e))?;
    while inbox.next(&session).await {}
    if let Some(e) = inbox.error().filter(|e| !e.is_no_more_data()) {
        warn!("Inbox pagination stopped: {}", e);
    }
    info!("Inbox: {} conversations, {} unseen", inbox.conversations.len(), inbox.unseen_count);

    let mut timeline = Timeline::new();
    for _ in 0..FEED_PAGES {
        if !timeline.next(&session).await {
            break;
        }
    }
    match timeline.error() {
        Some(e) if !e.is_no_more_data() => warn!("Feed stopped: {}", e),
        _ => {}
    }
    info!(
        "Feed: {} items, {} stories, {} broadcasts",
        timeline.items.len(),
        timeline.stories().len(),
        timeline.broadcasts().len()
    );

    Ok(())
}
