/// Direct-message conversation and its thread-level operations
use crate::endpoint::{paths, ApiRequest};
use crate::error::{FeedError, PageState, Result};
use crate::model::{InboxItem, ItemKind, LastSeenAt, SendResponse, StatusResponse, ThreadResponse, ThreadSnapshot, User};
use crate::session::{client_context, generate_uuid, Session};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Messages fetched per thread page
const THREAD_PAGE_LIMIT: &str = "20";

/// A conversation as mirrored locally.
///
/// Not synchronized: one caller at a time, `&mut self` enforces it.
#[derive(Debug, Default)]
pub struct Conversation {
    pub id: String,
    pub v2_id: String,
    /// Newest first, unique by id
    pub items: Vec<InboxItem>,
    pub title: String,
    pub users: Vec<User>,
    pub left_users: Vec<User>,
    pub admin_user_ids: Vec<i64>,
    pub approval_required: bool,
    pub pending: bool,
    pub pending_score: i64,
    pub viewer_id: i64,
    pub last_activity_at: i64,
    pub named: bool,
    pub muted: bool,
    pub spam: bool,
    pub is_pin: bool,
    pub is_group: bool,
    pub is_verified_thread: bool,
    pub is_close_friend_thread: bool,
    pub thread_type: String,
    pub inviter: Option<User>,
    pub has_older: bool,
    pub has_newer: bool,
    pub archived: bool,
    pub last_seen_at: HashMap<String, LastSeenAt>,
    pub newest_cursor: String,
    pub oldest_cursor: String,
    pub(crate) state: PageState,
}

impl Conversation {
    /// Build from a snapshot seen for the first time
    pub fn from_snapshot(snapshot: ThreadSnapshot) -> Self {
        let mut conv = Self::default();
        conv.absorb(snapshot);
        conv
    }

    /// True for one-to-one threads
    pub fn is_private(&self) -> bool {
        self.thread_type == "private"
    }

    /// Id of the oldest loaded message, the cursor for older pages
    pub fn oldest_item_id(&self) -> Option<&str> {
        self.items.last().map(|m| m.id.as_str())
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn error(&self) -> Option<&FeedError> {
        self.state.error()
    }

    /// Fetch the thread's unseen messages and merge them in
    pub async fn refresh(&mut self, session: &Session, seq_id: i64) -> Result<()> {
        self.fetch_thread(session, seq_id, None).await
    }

    /// Load older messages. Falls back to `refresh` when nothing is loaded.
    ///
    /// Returns false once the thread has no older messages or a request
    /// failed; see `error()`.
    pub async fn next(&mut self, session: &Session, seq_id: i64) -> bool {
        if !self.state.is_ready() {
            return false;
        }

        let cursor = self.oldest_item_id().map(str::to_string);
        if let Err(e) = self.fetch_thread(session, seq_id, cursor).await {
            warn!("Thread {} pagination failed: {}", self.id, e);
            self.state.fail(e);
            return false;
        }

        if !self.has_older {
            self.state.fail(FeedError::NoMoreData);
            return false;
        }
        true
    }

    async fn fetch_thread(&mut self, session: &Session, seq_id: i64, cursor: Option<String>) -> Result<()> {
        let mut request = ApiRequest::get(paths::thread(&self.id))
            .param("visual_message_return_type", "unseen")
            .param("seq_id", (seq_id + 1).to_string())
            .param("limit", THREAD_PAGE_LIMIT);
        if let Some(cursor) = cursor {
            request = request.param("cursor", cursor).param("direction", "older");
        }

        let resp: ThreadResponse = session.call_json(request).await?;
        match resp.thread {
            Some(snapshot) => {
                let before = self.items.len();
                self.absorb(snapshot);
                debug!("Thread {}: {} new messages", self.id, self.items.len() - before);
            }
            None => debug!("Thread {}: empty response", self.id),
        }
        Ok(())
    }

    /// Send a text message to this thread.
    ///
    /// The acknowledged message is merged into `items`.
    pub async fn send_text(&mut self, session: &Session, text: &str) -> Result<()> {
        let thread_ids = serde_json::to_string(&[self.id.as_str()])?;
        let request = ApiRequest::post(paths::SEND_TEXT)
            .param("recipient_users", recipients(&self.users)?)
            .param("action", "send_item")
            .param("client_context", generate_uuid())
            .param("thread_ids", thread_ids)
            .param("text", text)
            .param("_uuid", session.config().uuid.clone())
            .param("device_id", session.config().device_id.clone());
        self.deliver(session, request, text).await
    }

    /// Send into a thread that does not exist yet; the server assigns the id
    pub(crate) async fn send_first(&mut self, session: &Session, text: &str) -> Result<()> {
        let token = client_context();
        let request = ApiRequest::post(paths::SEND_TEXT)
            .param("recipient_users", recipients(&self.users)?)
            .param("action", "send_item")
            .param("is_shh_mode", "0")
            .param("send_attribution", "message_button")
            .param("client_context", token.clone())
            .param("text", text)
            .param("device_id", session.config().device_id.clone())
            .param("mutation_token", token.clone())
            .param("_uuid", session.config().uuid.clone())
            .param("offline_threading_id", token);
        self.deliver(session, request, text).await
    }

    async fn deliver(&mut self, session: &Session, request: ApiRequest, text: &str) -> Result<()> {
        let resp: SendResponse = session.call_json(request).await?;
        if !resp.status.is_empty() && resp.status != "ok" {
            return Err(FeedError::Api(format!(
                "send_item returned status '{}' ({})",
                resp.status, resp.status_code
            )));
        }

        let payload = resp.payload;
        if !payload.thread_id.is_empty() {
            self.id = payload.thread_id;
        }
        let timestamp = payload.timestamp.parse::<i64>().unwrap_or_else(|_| {
            warn!("Send ack for {} carried timestamp '{}'", payload.item_id, payload.timestamp);
            0
        });

        info!("Sent item {} to thread {}", payload.item_id, self.id);
        self.add_message(InboxItem {
            id: payload.item_id,
            user_id: self.viewer_id,
            timestamp,
            client_context: payload.client_context,
            is_shh_mode: false,
            kind: ItemKind::Text { text: text.to_string() },
        });
        Ok(())
    }

    /// Mark a message as seen
    pub async fn mark_seen(&self, session: &Session, item_id: &str) -> Result<()> {
        let token = client_context();
        let request = ApiRequest::post(paths::item_seen(&self.id, item_id))
            .param("thread_id", self.id.clone())
            .param("action", "mark_seen")
            .param("client_context", token.clone())
            .param("_uuid", session.config().uuid.clone())
            .param("offline_threading_id", token);

        let resp: StatusResponse = session.call_json(request).await?;
        if resp.status != "ok" {
            return Err(FeedError::Api(format!(
                "status not ok while marking {} seen: '{}'",
                item_id, resp.status
            )));
        }
        Ok(())
    }
}

/// Recipient list in the nested-array form the server expects: `[[1,2]]`
fn recipients(users: &[User]) -> Result<String> {
    let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
    Ok(serde_json::to_string(&[ids])?)
}
