/// Timeline pager
use crate::endpoint::{paths, ApiRequest};
use crate::error::{FeedError, PageState, Result};
use crate::model::{Broadcast, FeedResponse, MediaItem, NewPostsResponse, Reel, Tray};
use crate::session::{generate_uuid, Session};
use crate::tray::{TrayOutcome, TrayPrefetch};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Why a feed page is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchReason {
    PullToRefresh,
    ColdStart,
    WarmStart,
    Pagination,
    /// Nothing applies, sent as an empty reason
    #[default]
    Unset,
}

impl FetchReason {
    /// Wire value of the `reason` parameter
    pub fn as_str(self) -> &'static str {
        match self {
            FetchReason::PullToRefresh => "pull_to_refresh",
            FetchReason::ColdStart => "cold_start_fetch",
            FetchReason::WarmStart => "warm_start_fetch",
            FetchReason::Pagination => "pagination",
            FetchReason::Unset => "",
        }
    }

    /// Tray reason for fetches that start a new feed session
    pub fn tray_reason(self) -> Option<&'static str> {
        match self {
            FetchReason::PullToRefresh => Some("pull_to_refresh"),
            FetchReason::ColdStart => Some("cold_start"),
            FetchReason::WarmStart => Some("warm_start_with_feed"),
            FetchReason::Pagination | FetchReason::Unset => None,
        }
    }
}

/// Inputs of the reason decision
#[derive(Debug, Clone, Copy, Default)]
pub struct ReasonInputs {
    /// Time since the previous request, `None` before the first one
    pub since_last: Option<Duration>,
    pub pull_refresh: bool,
    pub more_available: bool,
    pub has_next_id: bool,
    /// Backfilling an under-full page
    pub fetch_extra: bool,
    pub prev_reason: FetchReason,
}

/// Pick the fetch reason. First matching rule wins.
pub fn choose_reason(inputs: &ReasonInputs, warm_threshold: Duration) -> FetchReason {
    let recent = inputs.since_last.is_some_and(|d| d < warm_threshold);
    let idle = inputs.since_last.is_some_and(|d| d > warm_threshold);

    if inputs.pull_refresh || (!inputs.more_available && recent) {
        FetchReason::PullToRefresh
    } else if inputs.since_last.is_none()
        || (inputs.fetch_extra && inputs.prev_reason == FetchReason::WarmStart)
    {
        FetchReason::ColdStart
    } else if idle {
        FetchReason::WarmStart
    } else if inputs.fetch_extra || (inputs.more_available && inputs.has_next_id) {
        FetchReason::Pagination
    } else {
        FetchReason::Unset
    }
}

/// How long to hold off before the next request, if at all
pub fn pacing_delay(since_last: Option<Duration>, spacing: Duration, jitter: Duration) -> Option<Duration> {
    let since = since_last?;
    (since < spacing).then(|| spacing - since + jitter)
}

/// What one decoded page said about fullness
#[derive(Debug, Clone, Copy)]
struct PageSummary {
    num_results: f64,
    preload_distance: f64,
    more_available: bool,
}

impl PageSummary {
    fn is_underfull(&self) -> bool {
        self.num_results < self.preload_distance && self.more_available
    }
}

/// The main feed, paged on demand.
///
/// Each fetch is spaced out on the client side and tagged with a reason.
/// Fetches that open a new feed session also prefetch the tray. Under-full
/// pages are topped up before `next` returns.
///
/// Single caller. `next` takes `&mut self`; nothing inside is locked.
#[derive(Debug, Default)]
pub struct Timeline {
    /// Accumulated feed items, `index` equals position
    pub items: Vec<MediaItem>,
    pub tray: Tray,
    pub more_available: bool,
    pub next_id: String,
    pub num_results: f64,
    pub preload_distance: f64,
    pub pull_to_refresh_window_ms: f64,
    pub request_id: String,
    /// Session id as echoed by the server
    pub session_id: String,

    feed_session_id: String,
    last_request: Option<Instant>,
    prev_reason: FetchReason,
    pull_refresh: bool,
    fetch_extra: bool,
    pending_tray: Option<TrayPrefetch>,
    state: PageState,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    /// Error that stopped paging; `NoMoreData` once the feed ended
    pub fn error(&self) -> Option<&FeedError> {
        self.state.error()
    }

    pub fn next_id(&self) -> &str {
        &self.next_id
    }

    /// Reason used by the most recent request
    pub fn last_reason(&self) -> FetchReason {
        self.prev_reason
    }

    pub fn stories(&self) -> &[Reel] {
        &self.tray.stories
    }

    pub fn broadcasts(&self) -> &[Broadcast] {
        &self.tray.broadcasts
    }

    /// Make the next `next` a pull-to-refresh.
    ///
    /// The flag covers one page: it is cleared once that page is decoded,
    /// so `unset_pull_refresh` is only needed to cancel it beforehand.
    pub fn set_pull_refresh(&mut self) {
        self.pull_refresh = true;
    }

    pub fn unset_pull_refresh(&mut self) {
        self.pull_refresh = false;
    }

    /// Drop loaded posts and the tray
    pub fn clear_posts(&mut self) {
        self.items.clear();
        self.tray = Tray::default();
    }

    /// Clear posts and pull-to-refresh from the top.
    ///
    /// A feed that had run out becomes pageable again; a failed one stays
    /// failed. Returns what `next` returns.
    pub async fn refresh(&mut self, session: &Session) -> bool {
        self.clear_posts();
        self.set_pull_refresh();
        if self.state.is_exhausted() {
            self.state = PageState::Ready;
        }
        self.next(session).await
    }

    /// Ask the server whether posts newer than the loaded ones exist
    pub async fn new_posts_exist(&self, session: &Session) -> Result<bool> {
        let resp: NewPostsResponse = session.call_json(ApiRequest::get(paths::NEW_POSTS_EXIST)).await?;
        Ok(resp.new_posts)
    }

    /// Fetch the next page, backfilling under-full pages before returning.
    ///
    /// Returns whether more pages are available. On false, `error()` tells
    /// an exhausted feed (`NoMoreData`) apart from a failure. The first call
    /// is a cold start.
    pub async fn next(&mut self, session: &Session) -> bool {
        if !self.state.is_ready() {
            return false;
        }
        if let Err(e) = self.drain_pending_tray() {
            self.state.fail(e);
            return false;
        }

        let max_backfill = session.config().max_backfill_pages;
        let mut backfilled = 0;
        let mut prefetch: Option<TrayPrefetch> = None;

        loop {
            let summary = match self.fetch_page(session, &mut prefetch).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!("Feed page failed: {}", e);
                    self.state.fail(e);
                    return false;
                }
            };

            if !summary.is_underfull() {
                break;
            }
            if backfilled >= max_backfill {
                warn!("Feed still under-full after {} extra pages, giving up", backfilled);
                break;
            }
            debug!(
                "Under-full page ({} < {}), fetching extra",
                summary.num_results, summary.preload_distance
            );
            self.fetch_extra = true;
            backfilled += 1;
        }

        if let Some(prefetch) = prefetch {
            match prefetch.wait(session.config().tray_timeout).await {
                TrayOutcome::Ready(result) => {
                    // An older straggler must not overwrite this tray later
                    self.pending_tray = None;
                    if let Err(e) = self.apply_tray(result) {
                        self.state.fail(e);
                        return false;
                    }
                }
                TrayOutcome::Pending(prefetch) => {
                    debug!("Tray ({}) still loading, checking again next call", prefetch.reason());
                    self.pending_tray = Some(prefetch);
                }
            }
        } else if let Err(e) = self.drain_pending_tray() {
            // A carried-over prefetch may have finished while this page loaded
            self.state.fail(e);
            return false;
        }

        if !self.more_available {
            info!("Feed exhausted after {} items", self.items.len());
            self.state.fail(FeedError::NoMoreData);
        }
        self.more_available
    }

    /// One pacing + request + accrual cycle
    async fn fetch_page(&mut self, session: &Session, prefetch: &mut Option<TrayPrefetch>) -> Result<PageSummary> {
        let config = session.config();

        let (spacing, jitter_max) = config.pacing.window(self.fetch_extra);
        let jitter = jitter_max.mul_f64(rand::random::<f64>());
        if let Some(delay) = pacing_delay(self.last_request.map(|t| t.elapsed()), spacing, jitter) {
            debug!("Pacing feed request, sleeping {:?}", delay);
            sleep(delay).await;
        }

        let now = Instant::now();
        let reason = choose_reason(
            &ReasonInputs {
                since_last: self.last_request.map(|t| now.duration_since(t)),
                pull_refresh: self.pull_refresh,
                more_available: self.more_available,
                has_next_id: !self.next_id.is_empty(),
                fetch_extra: self.fetch_extra,
                prev_reason: self.prev_reason,
            },
            config.pacing.warm_threshold,
        );

        if let Some(tray_reason) = reason.tray_reason() {
            self.feed_session_id = generate_uuid();
            if prefetch.is_some() {
                debug!("Replacing earlier tray prefetch in the same call");
            }
            *prefetch = Some(TrayPrefetch::spawn(session, tray_reason));
        }

        let mut request = ApiRequest::post(paths::TIMELINE)
            .gzip(true)
            .param("feed_view_info", "[]")
            .param("timezone_offset", config.timezone_offset.to_string())
            .param("device_id", config.uuid.clone())
            .param("request_id", generate_uuid())
            .param("_uuid", config.uuid.clone())
            .param("bloks_versioning_id", config.bloks_versioning_id.clone())
            .param("reason", reason.as_str())
            .param(
                "is_pull_to_refresh",
                if reason == FetchReason::PullToRefresh { "1" } else { "0" },
            )
            .param("session_id", self.feed_session_id.clone())
            .header("X-Ads-Opt-Out", "0")
            .header("X-Google-AD-ID", config.adid.clone())
            .header("X-Fb", "1");
        if reason == FetchReason::Pagination {
            request = request.param("max_id", self.next_id.clone());
        }
        self.prev_reason = reason;

        let body = session.call(request).await?;
        self.last_request = Some(now);

        let page: FeedResponse = serde_json::from_slice(&body)?;
        Ok(self.accrue(page, reason))
    }

    /// Copy page counters and append its media
    fn accrue(&mut self, page: FeedResponse, reason: FetchReason) -> PageSummary {
        let summary = PageSummary {
            num_results: page.num_results,
            preload_distance: page.preload_distance,
            more_available: page.more_available,
        };

        self.next_id = page.next_id;
        self.more_available = page.more_available;
        if self.fetch_extra {
            self.num_results += page.num_results;
        } else {
            self.num_results = page.num_results;
        }
        self.preload_distance = page.preload_distance;
        self.pull_to_refresh_window_ms = page.pull_to_refresh_window_ms;
        self.request_id = page.request_id;
        self.session_id = page.session_id;
        self.fetch_extra = false;
        self.pull_refresh = false;

        let before = self.items.len();
        // Entries without media are end-of-feed markers
        self.items.extend(page.items.into_iter().filter_map(|entry| entry.media_or_ad));
        for (i, item) in self.items.iter_mut().enumerate() {
            item.index = i;
        }

        info!(
            "Feed page ({}): {} new items, {} total, more available: {}",
            reason.as_str(),
            self.items.len() - before,
            self.items.len(),
            self.more_available
        );
        summary
    }

    /// Pick up a prefetch left over from an earlier call, if it finished
    fn drain_pending_tray(&mut self) -> Result<()> {
        match self.pending_tray.take().map(TrayPrefetch::try_take) {
            Some(TrayOutcome::Ready(result)) => self.apply_tray(result),
            Some(TrayOutcome::Pending(prefetch)) => {
                self.pending_tray = Some(prefetch);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn apply_tray(&mut self, result: Result<Tray>) -> Result<()> {
        let tray = result?;
        debug!("Tray replaced: {} stories, {} broadcasts", tray.stories.len(), tray.broadcasts.len());
        self.tray = tray;
        Ok(())
    }
}
