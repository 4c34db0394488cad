pub mod http;
pub mod transport;
pub mod types;

pub use http::HttpBackend;
pub use transport::{ApiError, Backend, ChatSubmission, ChunkStream};
pub use types::{Attachment, Conversation, Credentials, HistoryEntry};
