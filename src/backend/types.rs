use serde::{Deserialize, Serialize};

// ============================================================================
// Domain types shared with the rest of the crate
// ============================================================================

/// A conversation as confirmed by the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(rename = "username", default)]
    pub owner_name: String,
}

/// One `{user?, bot?}` pair from `GET /history/{id}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoryEntry {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot: Option<String>,
}

/// What a successful login or registration hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub display_name: String,
}

/// An image sent along with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Reads an image from disk, guessing the MIME type from the extension.
    pub fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let mime_type = match ext.as_str() {
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "jpg" | "jpeg" => "image/jpeg",
            _ => "application/octet-stream",
        }
        .to_string();
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }
}

// ============================================================================
// Wire formats
// ============================================================================

#[derive(Serialize, Debug)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Serialize, Debug)]
pub(crate) struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: Option<&'a str>,
    pub password: &'a str,
}

#[derive(Deserialize, Debug)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub user: TokenUser,
}

#[derive(Deserialize, Debug)]
pub(crate) struct TokenUser {
    pub username: String,
}

/// FastAPI-style error body: `{"detail": "..."}`.
#[derive(Deserialize, Debug)]
pub(crate) struct ErrorDetail {
    pub detail: serde_json::Value,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ConversationList {
    pub conversations: Vec<Conversation>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Rename answers `{"status": "success" | "error", "message": ...}`.
#[derive(Deserialize, Debug)]
pub(crate) struct StatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize, Debug)]
pub(crate) struct SuggestTitleRequest<'a> {
    pub user_message: &'a str,
    pub assistant_message: &'a str,
}

#[derive(Deserialize, Debug)]
pub(crate) struct SuggestTitleResponse {
    #[serde(default)]
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_reads_username_as_owner() {
        let json = r#"{"id":"abc","title":"Cena de pasta","username":"ana"}"#;
        let conv: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conv.owner_name, "ana");
        assert_eq!(conv.title, "Cena de pasta");
    }

    #[test]
    fn history_entry_sides_are_optional() {
        let json = r#"{"history":[{"user":"hola"},{"bot":"¡Hola!"},{"user":"a","bot":"b"}]}"#;
        let resp: HistoryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.history.len(), 3);
        assert_eq!(resp.history[0].bot, None);
        assert_eq!(resp.history[1].user, None);
        assert_eq!(resp.history[2].bot.as_deref(), Some("b"));
    }

    #[test]
    fn missing_history_is_empty() {
        let resp: HistoryResponse = serde_json::from_str(r#"{"conversation_id":"x"}"#).unwrap();
        assert!(resp.history.is_empty());
    }

    #[test]
    fn register_request_serializes_null_email() {
        let req = RegisterRequest {
            username: "ana",
            email: None,
            password: "secreto",
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"username":"ana","email":null,"password":"secreto"}"#);
    }

    #[test]
    fn attachment_guesses_mime_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Tomates.JPG");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();
        let att = Attachment::from_path(&path).unwrap();
        assert_eq!(att.mime_type, "image/jpeg");
        assert_eq!(att.file_name, "Tomates.JPG");
        assert_eq!(att.bytes.len(), 3);
    }
}
