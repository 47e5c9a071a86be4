/// Direct-message inbox synchronizer
use crate::conversation::Conversation;
use crate::endpoint::{paths, ApiRequest};
use crate::error::{FeedError, PageState, Result};
use crate::merge::{upsert_conversation, Upsert};
use crate::model::{InboxResponse, ThreadResponse, User};
use crate::session::{random_digits, Session};
use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info, warn};

/// The inbox mirror: conversations newest-updated first plus server counters.
///
/// Single caller; concurrent use of one instance must be serialized by the
/// owner.
#[derive(Debug)]
pub struct Inbox {
    pub conversations: Vec<Conversation>,
    pub has_newer: bool,
    pub has_older: bool,
    /// Oldest-thread cursor for the next page
    pub cursor: String,
    pub unseen_count: i64,
    pub unseen_count_ts: i64,
    pub blended_inbox_enabled: bool,
    pub most_recent_inviter: Option<User>,
    pub seq_id: i64,
    pub pending_requests_total: i64,
    pub has_pending_top_requests: bool,
    pub snapshot_at_ms: i64,
    state: PageState,
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Inbox {
    /// Empty inbox seeded with a random six-digit sequence id
    pub fn new() -> Self {
        let seq_id = random_digits(6).parse::<i64>().unwrap_or(100_000);
        Self {
            conversations: Vec::new(),
            has_newer: false,
            has_older: false,
            cursor: String::new(),
            unseen_count: 0,
            unseen_count_ts: 0,
            blended_inbox_enabled: false,
            most_recent_inviter: None,
            seq_id,
            pending_requests_total: 0,
            has_pending_top_requests: false,
            snapshot_at_ms: 0,
            state: PageState::Ready,
        }
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    /// Error that stopped pagination; `NoMoreData` once exhausted
    pub fn error(&self) -> Option<&FeedError> {
        self.state.error()
    }

    pub fn conversation(&self, thread_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == thread_id)
    }

    pub fn conversation_mut(&mut self, thread_id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == thread_id)
    }

    pub fn snapshot_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.snapshot_at_ms).single()
    }

    /// Fetch the default (unseen) view and merge it
    pub async fn sync(&mut self, session: &Session) -> Result<()> {
        let request = ApiRequest::get(paths::INBOX)
            .param("visual_message_return_type", "unseen")
            .param("persistentBadging", "true")
            .param("limit", "0");
        self.fetch(session, request).await
    }

    /// Fetch the pending-requests view and merge it
    pub async fn sync_pending(&mut self, session: &Session) -> Result<()> {
        self.fetch(session, ApiRequest::get(paths::PENDING_INBOX)).await
    }

    /// Next page of threads. False once exhausted or failed, see `error()`.
    pub async fn next(&mut self, session: &Session) -> bool {
        let request = ApiRequest::get(paths::INBOX)
            .param("persistentBadging", "true")
            .param("cursor", self.cursor.clone());
        self.paginate(session, request).await
    }

    /// Next page of pending threads
    pub async fn next_pending(&mut self, session: &Session) -> bool {
        let request = ApiRequest::get(paths::PENDING_INBOX).param("cursor", self.cursor.clone());
        self.paginate(session, request).await
    }

    /// First page fetched on app open, with a few messages per thread
    pub async fn initial_snapshot(&mut self, session: &Session) -> bool {
        let request = ApiRequest::get(paths::INBOX)
            .param("visual_message_return_type", "unseen")
            .param("thread_message_limit", "10")
            .param("persistentBadging", "true")
            .param("limit", "20")
            .param("fetch_reason", "initial_snapshot");
        self.paginate(session, request).await
    }

    /// Move the cursor back to the newest page. A sticky error stays.
    pub fn reset(&mut self) {
        self.cursor.clear();
    }

    async fn paginate(&mut self, session: &Session, request: ApiRequest) -> bool {
        if !self.state.is_ready() {
            return false;
        }

        if let Err(e) = self.fetch(session, request).await {
            warn!("Inbox pagination failed: {}", e);
            self.state.fail(e);
            return false;
        }

        if self.cursor.is_empty() || !self.has_older {
            debug!("Inbox exhausted");
            self.state.fail(FeedError::NoMoreData);
            return false;
        }
        true
    }

    async fn fetch(&mut self, session: &Session, request: ApiRequest) -> Result<()> {
        let resp: InboxResponse = session.call_json(request).await?;
        self.apply(resp);
        Ok(())
    }

    /// Copy server counters, then merge every returned thread
    fn apply(&mut self, resp: InboxResponse) {
        let page = resp.inbox;
        self.has_newer = page.has_newer;
        self.has_older = page.has_older;
        self.cursor = page.cursor;
        self.unseen_count = page.unseen_count;
        self.unseen_count_ts = page.unseen_count_ts;
        self.blended_inbox_enabled = page.blended_inbox_enabled;
        if resp.most_recent_inviter.is_some() {
            self.most_recent_inviter = resp.most_recent_inviter;
        }
        self.seq_id = resp.seq_id;
        self.pending_requests_total = resp.pending_requests_total;
        self.has_pending_top_requests = resp.has_pending_top_requests;
        self.snapshot_at_ms = resp.snapshot_at_ms;

        let (mut inserted, mut updated) = (0, 0);
        for snapshot in page.threads {
            match upsert_conversation(&mut self.conversations, snapshot) {
                Upsert::Inserted => inserted += 1,
                Upsert::Updated => updated += 1,
            }
        }
        info!(
            "Inbox merged: {} new, {} updated, {} total (seq {})",
            inserted,
            updated,
            self.conversations.len(),
            self.seq_id
        );
    }

    /// Refresh one known thread
    pub async fn refresh_thread(&mut self, session: &Session, thread_id: &str) -> Result<()> {
        let seq_id = self.seq_id;
        let conv = self
            .conversation_mut(thread_id)
            .ok_or_else(|| FeedError::Api(format!("unknown thread {}", thread_id)))?;
        conv.refresh(session, seq_id).await
    }

    /// Load older messages of one known thread; false for unknown threads
    pub async fn older_messages(&mut self, session: &Session, thread_id: &str) -> bool {
        let seq_id = self.seq_id;
        match self.conversation_mut(thread_id) {
            Some(conv) => conv.next(session, seq_id).await,
            None => false,
        }
    }

    /// Private thread with `user_id`, looked up locally and then on the
    /// server. A thread found remotely is merged into the inbox.
    pub async fn thread_with(&mut self, session: &Session, user_id: i64) -> Result<Option<&mut Conversation>> {
        if let Some(pos) = self.private_thread_position(user_id) {
            return Ok(Some(&mut self.conversations[pos]));
        }

        let request = ApiRequest::get(paths::THREAD_BY_PARTICIPANTS)
            .param("recipient_users", format!("[{}]", user_id))
            .param("seq_id", (self.seq_id + 1).to_string())
            .param("limit", "20");
        let resp: ThreadResponse = session.call_json(request).await?;

        match resp.thread {
            Some(snapshot) => {
                let id = snapshot.id.clone();
                upsert_conversation(&mut self.conversations, snapshot);
                Ok(self.conversation_mut(&id))
            }
            None => Ok(None),
        }
    }

    /// Send `text` to `user`, starting a thread if none exists yet
    pub async fn message_user(&mut self, session: &Session, user: &User, text: &str) -> Result<&mut Conversation> {
        let seq_id = self.seq_id;
        let existing = self.thread_with(session, user.id).await?.map(|c| c.id.clone());

        if let Some(id) = existing {
            let conv = self
                .conversation_mut(&id)
                .ok_or_else(|| FeedError::Api(format!("thread {} vanished", id)))?;
            conv.send_text(session, text).await?;
            return Ok(conv);
        }

        let mut conv = Conversation {
            users: vec![user.clone()],
            thread_type: "private".to_string(),
            ..Default::default()
        };
        conv.send_first(session, text).await?;
        conv.refresh(session, seq_id).await?;

        let id = conv.id.clone();
        match self.conversations.iter().position(|c| c.id == id) {
            Some(pos) => {
                // Thread surfaced meanwhile, fold our copy's messages in
                let local = std::mem::take(&mut conv.items);
                let target = &mut self.conversations[pos];
                for msg in local {
                    target.add_message(msg);
                }
            }
            None => self.conversations.insert(0, conv),
        }
        self.conversation_mut(&id)
            .ok_or_else(|| FeedError::Api(format!("thread {} vanished", id)))
    }

    fn private_thread_position(&self, user_id: i64) -> Option<usize> {
        self.conversations
            .iter()
            .position(|c| c.is_private() && c.users.first().map(|u| u.id) == Some(user_id))
    }
}
