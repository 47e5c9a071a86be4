/// Remote endpoint abstraction
use crate::error::Result;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use std::collections::BTreeMap;

/// Endpoint paths, relative to the configured base URL
pub mod paths {
    pub const INBOX: &str = "direct_v2/inbox/";
    pub const PENDING_INBOX: &str = "direct_v2/pending_inbox/";
    pub const THREAD_BY_PARTICIPANTS: &str = "direct_v2/threads/get_by_participants/";
    pub const SEND_TEXT: &str = "direct_v2/threads/broadcast/text/";
    pub const TIMELINE: &str = "feed/timeline/";
    pub const REELS_TRAY: &str = "feed/reels_tray/";
    pub const NEW_POSTS_EXIST: &str = "feed/new_feed_posts_exist/";

    pub fn thread(thread_id: &str) -> String {
        format!("direct_v2/threads/{}/", thread_id)
    }

    pub fn item_seen(thread_id: &str, item_id: &str) -> String {
        format!("direct_v2/threads/{}/items/{}/seen/", thread_id, item_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request as described by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub endpoint: String,
    pub method: Method,
    pub query: BTreeMap<String, String>,
    pub extra_headers: BTreeMap<String, String>,
    /// Compress the request body
    pub gzip: bool,
}

impl ApiRequest {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: Method::Get,
            query: BTreeMap::new(),
            extra_headers: BTreeMap::new(),
            gzip: false,
        }
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(endpoint)
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.insert(key.to_string(), value.into());
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.to_string(), value.into());
        self
    }

    pub fn gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    /// Query value by key, mostly for tests and logging
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }
}

/// Raw response as returned by the transport
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes described requests. Stateless from the engine's point of view.
pub trait Endpoint: Send + Sync {
    fn execute(&self, request: ApiRequest) -> BoxFuture<'_, Result<RawResponse>>;
}
