//! HTTP implementation of the transport boundary.
//!
//! Talks to the cooking-assistant service:
//! - `POST /stream_chat/` (multipart in, chunked `text/plain` out)
//! - `/conversations/*` and `/history/{id}` for the sidebar and transcripts
//! - `/auth/*` for the login boundary

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::transport::{ApiError, Backend, ChatSubmission, ChunkStream};
use super::types::{
    Conversation, ConversationList, Credentials, ErrorDetail, HistoryEntry, HistoryResponse,
    LoginRequest, RegisterRequest, StatusResponse, SuggestTitleRequest, SuggestTitleResponse,
    TokenResponse,
};

pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

/// Attaches the bearer credential when one is present.
fn authorized(request: RequestBuilder, credential: Option<&str>) -> RequestBuilder {
    match credential {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Sends the request and maps 401 and other non-success statuses to errors.
async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
    let status = response.status();
    debug!("{} -> {}", response.url().path(), status);

    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorDetail>(&body)
            .map(|e| match e.detail {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or(body);
        warn!("Request failed: HTTP {} - {}", status.as_u16(), message);
        return Err(ApiError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

fn credentials(token: TokenResponse) -> Credentials {
    Credentials {
        token: token.access_token,
        display_name: token.user.username,
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn login(&self, username: &str, password: &str) -> Result<Credentials, ApiError> {
        info!("Logging in as {}", username);
        let request = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest { username, password });
        self.send_json::<TokenResponse>(request).await.map(credentials)
    }

    async fn register(
        &self,
        username: &str,
        email: Option<&str>,
        password: &str,
    ) -> Result<Credentials, ApiError> {
        info!("Registering {}", username);
        let request = self.client.post(self.url("/auth/register")).json(&RegisterRequest {
            username,
            email,
            password,
        });
        self.send_json::<TokenResponse>(request).await.map(credentials)
    }

    async fn stream_chat(
        &self,
        credential: Option<&str>,
        submission: ChatSubmission<'_>,
    ) -> Result<ChunkStream, ApiError> {
        let mut form = Form::new()
            .text("user_message", submission.message.to_string())
            .text("username", submission.username.to_string())
            .text("conversation_id", submission.conversation_id.to_string());

        if let Some(attachment) = submission.attachment {
            let part = Part::bytes(attachment.bytes.clone())
                .file_name(attachment.file_name.clone())
                .mime_str(&attachment.mime_type)
                .map_err(|e| ApiError::Config(e.to_string()))?;
            form = form.part("image", part);
        }

        info!(
            "stream_chat: conversation={}, message_len={}, attachment={}",
            submission.conversation_id,
            submission.message.len(),
            submission.attachment.is_some()
        );

        let request = authorized(self.client.post(self.url("/stream_chat/")), credential)
            .multipart(form);
        let response = send(request).await?;

        let stream = response
            .bytes_stream()
            .map(|item| {
                item.map(|bytes| bytes.to_vec())
                    .map_err(|e| ApiError::Network(e.to_string()))
            })
            .boxed();
        Ok(stream)
    }

    async fn list_conversations(
        &self,
        credential: Option<&str>,
    ) -> Result<Vec<Conversation>, ApiError> {
        let request = authorized(self.client.get(self.url("/conversations/")), credential);
        let list: ConversationList = self.send_json(request).await?;
        debug!("Server lists {} conversations", list.conversations.len());
        Ok(list.conversations)
    }

    async fn history(
        &self,
        credential: Option<&str>,
        conversation_id: &str,
    ) -> Result<Vec<HistoryEntry>, ApiError> {
        let request = authorized(
            self.client
                .get(self.url(&format!("/history/{conversation_id}"))),
            credential,
        );
        let history: HistoryResponse = self.send_json(request).await?;
        Ok(history.history)
    }

    async fn rename(
        &self,
        credential: Option<&str>,
        conversation_id: &str,
        new_title: &str,
    ) -> Result<(), ApiError> {
        let request = authorized(
            self.client.post(self.url("/conversations/rename/")),
            credential,
        )
        .form(&[("conversation_id", conversation_id), ("new_title", new_title)]);
        let status: StatusResponse = self.send_json(request).await?;
        if status.status.as_deref() == Some("error") {
            return Err(ApiError::Rejected(status.message.unwrap_or_default()));
        }
        Ok(())
    }

    async fn delete(&self, credential: Option<&str>, conversation_id: &str) -> Result<(), ApiError> {
        let request = authorized(
            self.client
                .delete(self.url(&format!("/conversations/{conversation_id}"))),
            credential,
        );
        send(request).await?;
        Ok(())
    }

    async fn suggest_title(
        &self,
        credential: Option<&str>,
        user_message: &str,
        assistant_message: &str,
    ) -> Result<String, ApiError> {
        let request = authorized(
            self.client.post(self.url("/conversations/suggest_title/")),
            credential,
        )
        .json(&SuggestTitleRequest {
            user_message,
            assistant_message,
        });
        let response: SuggestTitleResponse = self.send_json(request).await?;
        Ok(response.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let backend = HttpBackend::new("http://127.0.0.1:8000/");
        assert_eq!(backend.base_url(), "http://127.0.0.1:8000");
        assert_eq!(
            backend.url("/conversations/"),
            "http://127.0.0.1:8000/conversations/"
        );
    }
}
