//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;

use crate::backend::{
    ApiError, Backend, ChatSubmission, ChunkStream, Conversation, Credentials, HistoryEntry,
};
use crate::core::manager::{ConversationView, EndReason, SidebarRow};
use crate::core::stream::PlainFormatter;
use crate::core::transcript::{Message, Transcript};

/// One request seen by [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Login(String),
    Register(String, Option<String>),
    StreamChat {
        conversation_id: String,
        message: String,
        username: String,
    },
    List,
    History(String),
    Rename {
        id: String,
        title: String,
    },
    Delete(String),
    SuggestTitle,
}

#[derive(Default)]
struct Script {
    conversations: Vec<Conversation>,
    histories: HashMap<String, Vec<HistoryEntry>>,
    reply: Vec<String>,
    title: Option<Result<String, ApiError>>,
    fail_login: Option<ApiError>,
    fail_stream: Option<ApiError>,
    break_stream: Option<ApiError>,
    fail_list: Option<ApiError>,
    fail_rename: Option<ApiError>,
    fail_history: Option<ApiError>,
    fail_delete: Option<ApiError>,
    calls: Vec<Call>,
    title_requests: Vec<(String, String)>,
}

/// In-memory stand-in for the service.
///
/// Like the real server, the first `stream_chat` for an unknown id creates
/// the conversation record. `fail_next_*` failures apply to one call only.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversations(self, conversations: Vec<Conversation>) -> Self {
        self.script.lock().unwrap().conversations = conversations;
        self
    }

    pub fn set_history(&self, id: &str, entries: Vec<HistoryEntry>) {
        self.script
            .lock()
            .unwrap()
            .histories
            .insert(id.to_string(), entries);
    }

    pub fn set_reply(&self, chunks: &[&str]) {
        self.script.lock().unwrap().reply = chunks.iter().map(|c| c.to_string()).collect();
    }

    pub fn set_title(&self, title: Result<String, ApiError>) {
        self.script.lock().unwrap().title = Some(title);
    }

    pub fn fail_next_login(&self, error: ApiError) {
        self.script.lock().unwrap().fail_login = Some(error);
    }

    /// The request itself fails.
    pub fn fail_next_stream(&self, error: ApiError) {
        self.script.lock().unwrap().fail_stream = Some(error);
    }

    /// The reply streams, then the connection drops.
    pub fn break_next_stream(&self, error: ApiError) {
        self.script.lock().unwrap().break_stream = Some(error);
    }

    pub fn fail_next_list(&self, error: ApiError) {
        self.script.lock().unwrap().fail_list = Some(error);
    }

    pub fn fail_next_rename(&self, error: ApiError) {
        self.script.lock().unwrap().fail_rename = Some(error);
    }

    pub fn fail_next_history(&self, error: ApiError) {
        self.script.lock().unwrap().fail_history = Some(error);
    }

    pub fn fail_next_delete(&self, error: ApiError) {
        self.script.lock().unwrap().fail_delete = Some(error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    /// `(user_message, assistant_message)` of the last title request.
    pub fn last_title_request(&self) -> Option<(String, String)> {
        self.script.lock().unwrap().title_requests.last().cloned()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn login(&self, username: &str, _password: &str) -> Result<Credentials, ApiError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::Login(username.to_string()));
        if let Some(e) = script.fail_login.take() {
            return Err(e);
        }
        Ok(Credentials {
            token: format!("token-{username}"),
            display_name: username.to_string(),
        })
    }

    async fn register(
        &self,
        username: &str,
        email: Option<&str>,
        _password: &str,
    ) -> Result<Credentials, ApiError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::Register(
            username.to_string(),
            email.map(str::to_string),
        ));
        Ok(Credentials {
            token: format!("token-{username}"),
            display_name: username.to_string(),
        })
    }

    async fn stream_chat(
        &self,
        _credential: Option<&str>,
        submission: ChatSubmission<'_>,
    ) -> Result<ChunkStream, ApiError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::StreamChat {
            conversation_id: submission.conversation_id.to_string(),
            message: submission.message.to_string(),
            username: submission.username.to_string(),
        });
        if let Some(e) = script.fail_stream.take() {
            return Err(e);
        }

        if !script
            .conversations
            .iter()
            .any(|c| c.id == submission.conversation_id)
        {
            script.conversations.insert(
                0,
                Conversation {
                    id: submission.conversation_id.to_string(),
                    title: "Nueva conversación".to_string(),
                    owner_name: submission.username.to_string(),
                },
            );
        }

        let mut items: Vec<Result<Vec<u8>, ApiError>> = script
            .reply
            .iter()
            .map(|c| Ok(c.as_bytes().to_vec()))
            .collect();
        if let Some(e) = script.break_stream.take() {
            items.push(Err(e));
        }
        Ok(futures::stream::iter(items).boxed())
    }

    async fn list_conversations(
        &self,
        _credential: Option<&str>,
    ) -> Result<Vec<Conversation>, ApiError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::List);
        if let Some(e) = script.fail_list.take() {
            return Err(e);
        }
        Ok(script.conversations.clone())
    }

    async fn history(
        &self,
        _credential: Option<&str>,
        conversation_id: &str,
    ) -> Result<Vec<HistoryEntry>, ApiError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::History(conversation_id.to_string()));
        if let Some(e) = script.fail_history.take() {
            return Err(e);
        }
        Ok(script
            .histories
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn rename(
        &self,
        _credential: Option<&str>,
        conversation_id: &str,
        new_title: &str,
    ) -> Result<(), ApiError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::Rename {
            id: conversation_id.to_string(),
            title: new_title.to_string(),
        });
        if let Some(e) = script.fail_rename.take() {
            return Err(e);
        }
        match script
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        {
            Some(conv) => {
                conv.title = new_title.to_string();
                Ok(())
            }
            None => Err(ApiError::Rejected("Conversación no encontrada".into())),
        }
    }

    async fn delete(&self, _credential: Option<&str>, conversation_id: &str) -> Result<(), ApiError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::Delete(conversation_id.to_string()));
        if let Some(e) = script.fail_delete.take() {
            return Err(e);
        }
        script.conversations.retain(|c| c.id != conversation_id);
        Ok(())
    }

    async fn suggest_title(
        &self,
        _credential: Option<&str>,
        user_message: &str,
        assistant_message: &str,
    ) -> Result<String, ApiError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::SuggestTitle);
        script
            .title_requests
            .push((user_message.to_string(), assistant_message.to_string()));
        script
            .title
            .clone()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

/// Records everything the manager shows, using the plain formatter.
#[derive(Default)]
pub struct RecordingView {
    pub messages: Vec<Message>,
    pub frames: Vec<String>,
    pub sidebar: Vec<SidebarRow>,
    pub started: usize,
    pub completed: usize,
    pub discarded: usize,
    pub ended: Option<EndReason>,
}

impl ConversationView for RecordingView {
    type Formatter = PlainFormatter;

    fn reply_formatter(&self) -> PlainFormatter {
        PlainFormatter
    }

    fn transcript_replaced(&mut self, transcript: &Transcript) {
        self.messages = transcript.messages().to_vec();
    }

    fn message_appended(&mut self, message: &Message) {
        self.messages.push(message.clone());
    }

    fn reply_started(&mut self) {
        self.started += 1;
    }

    fn reply_redrawn(&mut self, rendering: String) {
        self.frames.push(rendering);
    }

    fn reply_completed(&mut self, message: &Message) {
        self.completed += 1;
        self.messages.push(message.clone());
    }

    fn reply_discarded(&mut self) {
        self.discarded += 1;
    }

    fn sidebar_changed(&mut self, rows: &[SidebarRow]) {
        self.sidebar = rows.to_vec();
    }

    fn session_ended(&mut self, reason: EndReason) {
        self.ended = Some(reason);
    }
}
