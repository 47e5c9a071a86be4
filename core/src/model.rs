/// Wire shapes for inbox, thread and feed responses
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// A user as embedded in threads and items
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "pk", default)]
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub profile_pic_url: String,
}

/// Feed or shared media, kept opaque apart from its id and owner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user: Option<User>,
    /// Position in the owning timeline, not sent by the server
    #[serde(skip)]
    pub index: usize,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReelShare {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "is_reel_persisted", default)]
    pub is_persisted: bool,
    #[serde(rename = "reel_owner_id", default)]
    pub owner_id: i64,
    #[serde(rename = "type", default)]
    pub share_type: String,
    #[serde(default)]
    pub reel_type: String,
    #[serde(default)]
    pub media: MediaItem,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    #[serde(default)]
    pub description: String,
}

/// Message payload, tagged by `item_type` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "item_type", rename_all = "snake_case")]
pub enum ItemKind {
    Text {
        #[serde(default)]
        text: String,
    },
    Like {
        #[serde(default)]
        like: String,
    },
    MediaShare {
        #[serde(default)]
        media_share: MediaItem,
    },
    ReelShare {
        #[serde(default)]
        reel_share: ReelShare,
    },
    ActionLog {
        #[serde(default)]
        action_log: ActionLog,
    },
    /// Item types the engine does not model (raven_media, link, ...), and
    /// items with no usable type at all
    #[serde(other)]
    Other,
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireItem")]
pub struct InboxItem {
    #[serde(rename = "item_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: i64,
    /// Microseconds since the epoch
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub client_context: String,
    #[serde(default)]
    pub is_shh_mode: bool,
    #[serde(flatten)]
    pub kind: ItemKind,
}

/// Message as received. The payload is decoded on its own and falls back
/// to `ItemKind::Other`.
#[derive(Deserialize)]
struct WireItem {
    #[serde(rename = "item_id", default)]
    id: String,
    #[serde(default)]
    user_id: i64,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    client_context: String,
    #[serde(default)]
    is_shh_mode: bool,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl From<WireItem> for InboxItem {
    fn from(wire: WireItem) -> Self {
        let has_type = wire.payload.get("item_type").is_some_and(|t| t.is_string());
        let kind = if has_type {
            serde_json::from_value(Value::Object(wire.payload)).unwrap_or_else(|e| {
                debug!("Item {} has an unreadable payload: {}", wire.id, e);
                ItemKind::Other
            })
        } else {
            ItemKind::Other
        };
        Self {
            id: wire.id,
            user_id: wire.user_id,
            timestamp: wire.timestamp,
            client_context: wire.client_context,
            is_shh_mode: wire.is_shh_mode,
            kind,
        }
    }
}

impl InboxItem {
    pub fn text(id: impl Into<String>, user_id: i64, timestamp: i64, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id,
            timestamp,
            client_context: String::new(),
            is_shh_mode: false,
            kind: ItemKind::Text { text: text.into() },
        }
    }

    /// Wall-clock time of the message
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        let secs = self.timestamp.div_euclid(1_000_000);
        let nanos = (self.timestamp.rem_euclid(1_000_000) * 1_000) as u32;
        Utc.timestamp_opt(secs, nanos).single()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastSeenAt {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub item_id: String,
}

/// Thread snapshot as the server sends it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    #[serde(rename = "thread_id")]
    pub id: String,
    #[serde(rename = "thread_v2_id", default)]
    pub v2_id: String,
    #[serde(default)]
    pub items: Vec<InboxItem>,
    #[serde(rename = "thread_title", default)]
    pub title: String,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub left_users: Vec<User>,
    #[serde(default)]
    pub admin_user_ids: Vec<i64>,
    #[serde(rename = "approval_required_for_new_members", default)]
    pub approval_required: bool,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub pending_score: i64,
    #[serde(default)]
    pub viewer_id: i64,
    #[serde(default)]
    pub last_activity_at: i64,
    #[serde(default)]
    pub named: bool,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub spam: bool,
    #[serde(default)]
    pub is_pin: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub is_verified_thread: bool,
    #[serde(default)]
    pub is_close_friend_thread: bool,
    #[serde(default)]
    pub thread_type: String,
    #[serde(default)]
    pub inviter: Option<User>,
    #[serde(default)]
    pub has_older: bool,
    #[serde(default)]
    pub has_newer: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub last_seen_at: HashMap<String, LastSeenAt>,
    #[serde(default)]
    pub newest_cursor: String,
    #[serde(default)]
    pub oldest_cursor: String,
}

/// The `inbox` object of an inbox response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboxPage {
    #[serde(rename = "threads", default)]
    pub threads: Vec<ThreadSnapshot>,
    #[serde(default)]
    pub has_newer: bool,
    #[serde(default)]
    pub has_older: bool,
    #[serde(rename = "oldest_cursor", default)]
    pub cursor: String,
    #[serde(default)]
    pub unseen_count: i64,
    #[serde(default)]
    pub unseen_count_ts: i64,
    #[serde(default)]
    pub blended_inbox_enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboxResponse {
    #[serde(default)]
    pub inbox: InboxPage,
    #[serde(default)]
    pub most_recent_inviter: Option<User>,
    #[serde(default)]
    pub seq_id: i64,
    #[serde(default)]
    pub pending_requests_total: i64,
    #[serde(default)]
    pub snapshot_at_ms: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub has_pending_top_requests: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadResponse {
    #[serde(rename = "thread")]
    pub thread: Option<ThreadSnapshot>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendPayload {
    #[serde(default)]
    pub client_context: String,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub thread_id: String,
    /// Sent as a decimal string
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub payload: SendPayload,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndOfFeed {
    #[serde(default)]
    pub pause: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
}

/// One feed entry: media, or an end-of-feed marker
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedEntry {
    #[serde(default)]
    pub media_or_ad: Option<MediaItem>,
    #[serde(rename = "end_of_feed_demarcator", default)]
    pub end_of_feed: Option<EndOfFeed>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedResponse {
    #[serde(rename = "feed_items", default)]
    pub items: Vec<FeedEntry>,
    #[serde(default)]
    pub more_available: bool,
    #[serde(rename = "next_max_id", default)]
    pub next_id: String,
    #[serde(default)]
    pub num_results: f64,
    #[serde(default)]
    pub preload_distance: f64,
    #[serde(default)]
    pub pull_to_refresh_window_ms: f64,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPostsResponse {
    #[serde(rename = "new_feed_posts_exist", default)]
    pub new_posts: bool,
    #[serde(default)]
    pub status: String,
}

/// A user's story reel in the tray
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reel {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub latest_reel_media: i64,
    #[serde(default)]
    pub seen: i64,
    #[serde(default)]
    pub items: Vec<MediaItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(rename = "broadcast_owner", default)]
    pub owner: Option<User>,
    #[serde(default)]
    pub broadcast_status: String,
    #[serde(default)]
    pub viewer_count: f64,
}

/// Stories and live broadcasts snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tray {
    #[serde(rename = "tray", default)]
    pub stories: Vec<Reel>,
    #[serde(default)]
    pub broadcasts: Vec<Broadcast>,
    #[serde(default)]
    pub status: String,
}
