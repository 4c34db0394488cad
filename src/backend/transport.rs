use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::types::{Attachment, Conversation, Credentials, HistoryEntry};

/// Errors reported by the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// HTTP 401 from any endpoint. Always ends the session.
    Unauthorized,
    /// Network-level failure (DNS, refused connection, dropped stream).
    Network(String),
    /// Non-success status other than 401.
    Api { status: u16, message: String },
    /// The server answered 2xx but reported the operation as failed.
    Rejected(String),
    /// Response body did not match the expected shape.
    Parse(String),
    /// Request could not be built (bad URL, bad attachment MIME type).
    Config(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized => write!(f, "unauthorized"),
            ApiError::Network(msg) => write!(f, "network error: {msg}"),
            ApiError::Api { status, message } => write!(f, "HTTP {status}: {message}"),
            ApiError::Rejected(msg) => write!(f, "rejected by server: {msg}"),
            ApiError::Parse(msg) => write!(f, "unexpected response: {msg}"),
            ApiError::Config(msg) => write!(f, "invalid request: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Fragments of a streamed reply, in arrival order. The stream ending is the
/// end-of-reply signal; an `Err` item means the connection broke mid-reply.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, ApiError>>;

/// Everything the server needs for one exchange.
pub struct ChatSubmission<'a> {
    pub message: &'a str,
    pub username: &'a str,
    pub conversation_id: &'a str,
    pub attachment: Option<&'a Attachment>,
}

/// The remote assistant service.
///
/// Every call takes the bearer credential explicitly; `None` sends the request
/// unauthenticated.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<Credentials, ApiError>;

    async fn register(
        &self,
        username: &str,
        email: Option<&str>,
        password: &str,
    ) -> Result<Credentials, ApiError>;

    /// Submits one exchange and returns the reply stream once headers arrive.
    async fn stream_chat(
        &self,
        credential: Option<&str>,
        submission: ChatSubmission<'_>,
    ) -> Result<ChunkStream, ApiError>;

    async fn list_conversations(&self, credential: Option<&str>)
    -> Result<Vec<Conversation>, ApiError>;

    async fn history(
        &self,
        credential: Option<&str>,
        conversation_id: &str,
    ) -> Result<Vec<HistoryEntry>, ApiError>;

    async fn rename(
        &self,
        credential: Option<&str>,
        conversation_id: &str,
        new_title: &str,
    ) -> Result<(), ApiError>;

    async fn delete(&self, credential: Option<&str>, conversation_id: &str)
    -> Result<(), ApiError>;

    async fn suggest_title(
        &self,
        credential: Option<&str>,
        user_message: &str,
        assistant_message: &str,
    ) -> Result<String, ApiError>;
}
