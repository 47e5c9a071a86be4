/// Error types for the inbox and feed engine
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Pagination sentinel, not a real failure.
    #[error("no more data available")]
    NoMoreData,
}

impl FeedError {
    /// True for the end-of-pagination sentinel.
    pub fn is_no_more_data(&self) -> bool {
        matches!(self, FeedError::NoMoreData)
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;

/// Sentinel handed out by `PageState::error` for exhausted instances.
static NO_MORE_DATA: FeedError = FeedError::NoMoreData;

/// Pagination state of an inbox, conversation or timeline.
///
/// Once an instance leaves `Ready` every paginating call returns `false`
/// without issuing a request.
#[derive(Debug, Default)]
pub enum PageState {
    #[default]
    Ready,
    /// The server reported there is nothing older to fetch.
    Exhausted,
    /// A request or decode failed; sticky for the lifetime of the instance.
    Failed(FeedError),
}

impl PageState {
    pub fn is_ready(&self) -> bool {
        matches!(self, PageState::Ready)
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, PageState::Exhausted)
    }

    /// The error that stopped pagination, `NoMoreData` when exhausted.
    pub fn error(&self) -> Option<&FeedError> {
        match self {
            PageState::Ready => None,
            PageState::Exhausted => Some(&NO_MORE_DATA),
            PageState::Failed(e) => Some(e),
        }
    }

    /// Record a failure. `NoMoreData` maps to `Exhausted`.
    pub(crate) fn fail(&mut self, err: FeedError) {
        *self = if err.is_no_more_data() {
            PageState::Exhausted
        } else {
            PageState::Failed(err)
        };
    }
}
