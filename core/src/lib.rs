/// Threadline - client-side inbox and feed mirror
///
/// Keeps an in-memory copy of a direct-message inbox and a content feed in
/// step with a remote API: conversations and messages are merged rather
/// than replaced, and the feed is paged with client-side pacing, tray
/// prefetch and backfill of under-full pages.

pub mod config;
pub mod conversation;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod inbox;
pub mod merge;
pub mod model;
pub mod session;
pub mod timeline;
pub mod tray;

pub use config::{Config, PacingConfig};
pub use conversation::Conversation;
pub use endpoint::{ApiRequest, Endpoint, Method, RawResponse};
pub use error::{FeedError, PageState, Result};
pub use inbox::Inbox;
pub use session::Session;
pub use timeline::{FetchReason, Timeline};
