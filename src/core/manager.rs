//! # Conversation Manager
//!
//! Owns conversation identity, the transcript, and the sidebar rows. It is
//! the only piece that talks to the [`SessionStore`] and the [`Backend`].
//!
//! A conversation starts life client-side (`UnsavedActive`). The server
//! creates its record as a side effect of the first message, and the next
//! list refresh promotes it to `ConfirmedActive`. Until then the sidebar shows
//! a synthetic placeholder row for it.
//!
//! Each exchange is a sequential pipeline:
//!
//! ```text
//! send ──▶ stream ──▶ (first exchange only) title ──▶ rename ──▶ refresh
//! ```
//!
//! Any 401 ends the session on the spot: the store is cleared, the view is
//! told, and no further request goes out.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::backend::{ApiError, Attachment, Backend, ChatSubmission, Conversation};
use crate::core::session::SessionStore;
use crate::core::stream::{
    DEFAULT_REDRAW_INTERVAL, Formatter, RedrawThrottle, RenderTarget, StreamRenderer,
};
use crate::core::strings::Language;
use crate::core::title::TitleResolver;
use crate::core::transcript::{Message, Transcript};

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationState {
    NoActiveConversation,
    /// Known only to this client; absent from the server list.
    UnsavedActive(String),
    /// Present in the last server list.
    ConfirmedActive(String),
}

impl ConversationState {
    pub fn active_id(&self) -> Option<&str> {
        match self {
            ConversationState::NoActiveConversation => None,
            ConversationState::UnsavedActive(id) | ConversationState::ConfirmedActive(id) => {
                Some(id)
            }
        }
    }
}

/// One reconciled sidebar entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarRow {
    pub id: String,
    pub title: String,
    pub active: bool,
    /// The placeholder for a conversation the server has not seen yet.
    pub unsaved: bool,
}

/// Merges the server list with the active id.
///
/// Each id appears once. When the active id is not in the list, a placeholder
/// row is prepended so exactly one row is active.
pub fn reconcile(
    confirmed: &[Conversation],
    active: Option<&str>,
    unsaved_label: &str,
) -> Vec<SidebarRow> {
    let mut rows: Vec<SidebarRow> = Vec::with_capacity(confirmed.len() + 1);
    for conv in confirmed {
        if rows.iter().any(|r| r.id == conv.id) {
            continue;
        }
        rows.push(SidebarRow {
            id: conv.id.clone(),
            title: conv.title.clone(),
            active: active == Some(conv.id.as_str()),
            unsaved: false,
        });
    }

    if let Some(id) = active {
        if !rows.iter().any(|r| r.id == id) {
            rows.insert(
                0,
                SidebarRow {
                    id: id.to_string(),
                    title: unsaved_label.to_string(),
                    active: true,
                    unsaved: true,
                },
            );
        }
    }
    rows
}

/// `id-` + base36 milliseconds + 9 random base36 characters.
pub fn new_conversation_id() -> String {
    let millis = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
    let mut random = uuid::Uuid::new_v4().as_u128();
    let mut suffix = String::with_capacity(9);
    for _ in 0..9 {
        suffix.push(base36_digit((random % 36) as u32));
        random /= 36;
    }
    format!("id-{}{}", to_base36(millis), suffix)
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(base36_digit((n % 36) as u32));
        n /= 36;
    }
    digits.iter().rev().collect()
}

fn base36_digit(d: u32) -> char {
    char::from_digit(d, 36).unwrap_or('0')
}

// ============================================================================
// View seam
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Logout,
    Expired,
}

/// Everything the manager tells the outside world.
pub trait ConversationView: Send {
    type Formatter: Formatter + Send;

    fn reply_formatter(&self) -> Self::Formatter;

    fn transcript_replaced(&mut self, transcript: &Transcript);
    fn message_appended(&mut self, message: &Message);

    /// An assistant reply is about to stream in.
    fn reply_started(&mut self);
    fn reply_redrawn(&mut self, rendering: <Self::Formatter as Formatter>::Output);
    /// The streamed reply finished and became `message`.
    fn reply_completed(&mut self, message: &Message);
    /// The in-flight reply failed; drop whatever was drawn.
    fn reply_discarded(&mut self);

    fn sidebar_changed(&mut self, rows: &[SidebarRow]);
    fn session_ended(&mut self, reason: EndReason);
}

struct ReplyTarget<'a, V>(&'a mut V);

impl<V: ConversationView> RenderTarget<<V::Formatter as Formatter>::Output> for ReplyTarget<'_, V> {
    fn redraw(&mut self, rendering: <V::Formatter as Formatter>::Output) {
        self.0.reply_redrawn(rendering);
    }
}

// ============================================================================
// Commands & errors
// ============================================================================

#[derive(Debug, Clone)]
pub enum Command {
    Send {
        text: String,
        attachment: Option<Attachment>,
    },
    StartNew,
    SwitchTo(String),
    Rename {
        id: String,
        title: String,
    },
    Delete {
        id: String,
        confirmed: bool,
    },
    Refresh,
    Logout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerError {
    /// No credential in the store.
    NotLoggedIn,
    /// The server rejected the credential; the session is gone.
    SessionExpired,
    /// Caught before any request was made.
    Validation(String),
    Transport(ApiError),
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerError::NotLoggedIn => write!(f, "not logged in"),
            ManagerError::SessionExpired => write!(f, "session expired"),
            ManagerError::Validation(msg) => write!(f, "{msg}"),
            ManagerError::Transport(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ManagerError {}

fn persisted(what: &str, result: io::Result<()>) {
    if let Err(e) = result {
        warn!("Failed to persist {}: {}", what, e);
    }
}

// ============================================================================
// Manager
// ============================================================================

pub struct ConversationManager<V: ConversationView> {
    backend: Arc<dyn Backend>,
    store: SessionStore,
    view: V,
    titles: TitleResolver,
    language: Language,
    redraw_interval: Duration,
    state: ConversationState,
    transcript: Transcript,
    confirmed: Vec<Conversation>,
    sidebar: Vec<SidebarRow>,
    /// Armed by `start_new`, spent by the first successful exchange.
    just_started: bool,
}

impl<V: ConversationView> ConversationManager<V> {
    pub fn new(backend: Arc<dyn Backend>, store: SessionStore, view: V) -> Self {
        let language = Language::default();
        Self {
            backend,
            store,
            view,
            titles: TitleResolver::new(language.default_title()),
            language,
            redraw_interval: DEFAULT_REDRAW_INTERVAL,
            state: ConversationState::NoActiveConversation,
            transcript: Transcript::new(),
            confirmed: Vec::new(),
            sidebar: Vec::new(),
            just_started: false,
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self.titles = TitleResolver::new(language.default_title());
        self
    }

    pub fn with_redraw_interval(mut self, interval: Duration) -> Self {
        self.redraw_interval = interval;
        self
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn sidebar(&self) -> &[SidebarRow] {
        &self.sidebar
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn language(&self) -> Language {
        self.language
    }

    fn credential(&self) -> Option<String> {
        self.store.get().credential
    }

    fn display_name(&self) -> String {
        let name = self.store.get().display_name;
        if name.trim().is_empty() {
            self.language.guest_name().to_string()
        } else {
            name
        }
    }

    /// Runs one UI command. Once the session is gone only `Logout` is accepted.
    pub async fn handle(&mut self, command: Command) -> Result<(), ManagerError> {
        if !self.store.get().is_logged_in() && !matches!(command, Command::Logout) {
            debug!("Dropping {:?}: not logged in", command);
            return Err(ManagerError::NotLoggedIn);
        }
        match command {
            Command::Send { text, attachment } => self.send_message(&text, attachment).await,
            Command::StartNew => self.start_new().await,
            Command::SwitchTo(id) => self.switch_to(&id).await,
            Command::Rename { id, title } => self.rename(&id, &title).await,
            Command::Delete { id, confirmed } => self.delete(&id, confirmed).await,
            Command::Refresh => self.refresh_list().await,
            Command::Logout => {
                self.logout();
                Ok(())
            }
        }
    }

    /// Restores the persisted conversation, or starts a new one, then refreshes.
    pub async fn open(&mut self) -> Result<(), ManagerError> {
        let session = self.store.get();
        if !session.is_logged_in() {
            return Err(ManagerError::NotLoggedIn);
        }

        let restored = match (session.active_conversation_id, self.store.load_transcript()) {
            (Some(id), Some(blob)) => match Transcript::from_snapshot(&blob) {
                Ok(transcript) => Some((id, transcript)),
                Err(e) => {
                    warn!("Discarding unreadable transcript snapshot: {}", e);
                    None
                }
            },
            _ => None,
        };

        match restored {
            Some((id, transcript)) => {
                info!("Restoring conversation {} ({} messages)", id, transcript.len());
                self.state = ConversationState::UnsavedActive(id);
                self.transcript = transcript;
                self.just_started = false;
                self.view.transcript_replaced(&self.transcript);
                self.refresh_list().await
            }
            None => self.start_new().await,
        }
    }

    pub async fn start_new(&mut self) -> Result<(), ManagerError> {
        let id = new_conversation_id();
        info!("Starting conversation {}", id);

        persisted("active conversation", self.store.set_active_conversation(Some(&id)));
        persisted("transcript", self.store.clear_transcript());
        self.state = ConversationState::UnsavedActive(id);
        self.just_started = true;

        self.transcript.clear();
        let welcome = self.language.welcome_new(&self.display_name());
        self.transcript.push(Message::assistant(welcome));
        self.view.transcript_replaced(&self.transcript);

        self.refresh_list().await
    }

    pub async fn send_message(
        &mut self,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<(), ManagerError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ManagerError::Validation(
                self.language.empty_message().to_string(),
            ));
        }

        if self.state.active_id().is_none() {
            self.start_new().await?;
        }
        let Some(id) = self.state.active_id().map(str::to_string) else {
            return Err(ManagerError::NotLoggedIn);
        };

        self.append(Message::user(text));
        let credential = self.credential();
        let username = self.display_name();

        self.view.reply_started();
        let outcome = self
            .exchange(credential.as_deref(), &username, &id, text, attachment.as_ref())
            .await;

        let reply = match outcome {
            Ok(reply) => reply,
            Err(ApiError::Unauthorized) => {
                self.view.reply_discarded();
                return Err(self.end_session());
            }
            Err(e) => {
                warn!("Exchange in {} failed: {}", id, e);
                self.view.reply_discarded();
                self.append(Message::error(self.language.connection_error(&e.to_string())));
                self.snapshot();
                return Err(ManagerError::Transport(e));
            }
        };

        let message = Message::assistant(reply);
        self.view.reply_completed(&message);
        self.transcript.push(message);
        self.snapshot();

        if std::mem::take(&mut self.just_started) {
            let reply = self.last_reply();
            let title = self
                .titles
                .resolve(self.backend.as_ref(), credential.as_deref(), text, &reply)
                .await;
            info!("Naming conversation {} \"{}\"", id, title);
            match self.backend.rename(credential.as_deref(), &id, &title).await {
                Ok(()) => {}
                Err(ApiError::Unauthorized) => return Err(self.end_session()),
                Err(e) => warn!("Automatic rename of {} failed: {}", id, e),
            }
        }

        self.refresh_list().await
    }

    async fn exchange(
        &mut self,
        credential: Option<&str>,
        username: &str,
        conversation_id: &str,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> Result<String, ApiError> {
        let stream = self
            .backend
            .stream_chat(
                credential,
                ChatSubmission {
                    message: text,
                    username,
                    conversation_id,
                    attachment,
                },
            )
            .await?;

        let mut renderer = StreamRenderer::new(
            self.view.reply_formatter(),
            RedrawThrottle::new(self.redraw_interval),
        );
        let mut target = ReplyTarget(&mut self.view);
        renderer.consume(stream, &mut target).await
    }

    fn last_reply(&self) -> String {
        self.transcript
            .messages()
            .last()
            .map(|m| m.text.clone())
            .unwrap_or_default()
    }

    pub async fn switch_to(&mut self, id: &str) -> Result<(), ManagerError> {
        info!("Switching to conversation {}", id);
        self.just_started = false;
        persisted("active conversation", self.store.set_active_conversation(Some(id)));
        self.state = if self.confirmed.iter().any(|c| c.id == id) {
            ConversationState::ConfirmedActive(id.to_string())
        } else {
            ConversationState::UnsavedActive(id.to_string())
        };
        self.sync_sidebar();

        let credential = self.credential();
        match self.backend.history(credential.as_deref(), id).await {
            Ok(entries) => {
                debug!("History of {}: {} entries", id, entries.len());
                let welcome = self.language.welcome_back(&self.display_name());
                self.transcript = Transcript::from_history(welcome, &entries);
                self.view.transcript_replaced(&self.transcript);
                self.snapshot();
                Ok(())
            }
            Err(ApiError::Unauthorized) => Err(self.end_session()),
            Err(e) => {
                warn!("Failed to load history of {}: {}", id, e);
                self.transcript.clear();
                self.transcript
                    .push(Message::error(self.language.history_error(&e.to_string())));
                self.view.transcript_replaced(&self.transcript);
                persisted("transcript", self.store.clear_transcript());
                Err(ManagerError::Transport(e))
            }
        }
    }

    /// Renames a confirmed conversation. The row label only changes once the
    /// server accepts; on failure the view gets the old rows back.
    pub async fn rename(&mut self, id: &str, new_title: &str) -> Result<(), ManagerError> {
        let new_title = new_title.trim();
        if new_title.is_empty() {
            return Err(ManagerError::Validation("title cannot be empty".to_string()));
        }
        let Some(current) = self.confirmed.iter().find(|c| c.id == id) else {
            return Err(ManagerError::Validation(format!(
                "conversation {id} is not saved yet"
            )));
        };
        if current.title == new_title {
            debug!("Rename of {} is a no-op", id);
            return Ok(());
        }

        let credential = self.credential();
        match self.backend.rename(credential.as_deref(), id, new_title).await {
            Ok(()) => {
                info!("Renamed {} to \"{}\"", id, new_title);
                if let Some(conv) = self.confirmed.iter_mut().find(|c| c.id == id) {
                    conv.title = new_title.to_string();
                }
                self.sync_sidebar();
                self.refresh_list().await
            }
            Err(ApiError::Unauthorized) => Err(self.end_session()),
            Err(e) => {
                warn!("Rename of {} failed: {}", id, e);
                self.sync_sidebar();
                Err(ManagerError::Transport(e))
            }
        }
    }

    /// Deletes a confirmed conversation. Deleting the active one starts a
    /// fresh conversation.
    pub async fn delete(&mut self, id: &str, confirmed: bool) -> Result<(), ManagerError> {
        if !confirmed {
            return Err(ManagerError::Validation(
                self.language.confirm_delete().to_string(),
            ));
        }
        if !self.confirmed.iter().any(|c| c.id == id) {
            return Err(ManagerError::Validation(format!(
                "conversation {id} is not saved yet"
            )));
        }

        let credential = self.credential();
        match self.backend.delete(credential.as_deref(), id).await {
            Ok(()) => {
                info!("Deleted conversation {}", id);
                self.confirmed.retain(|c| c.id != id);
                if self.state.active_id() == Some(id) {
                    persisted("active conversation", self.store.set_active_conversation(None));
                    persisted("transcript", self.store.clear_transcript());
                    self.state = ConversationState::NoActiveConversation;
                    self.start_new().await
                } else {
                    self.refresh_list().await
                }
            }
            Err(ApiError::Unauthorized) => Err(self.end_session()),
            Err(e) => {
                warn!("Delete of {} failed: {}", id, e);
                self.append(Message::error(self.language.delete_error(&e.to_string())));
                Err(ManagerError::Transport(e))
            }
        }
    }

    /// Fetches the server list and reconciles the sidebar against it.
    /// Failures other than 401 keep the previous list.
    pub async fn refresh_list(&mut self) -> Result<(), ManagerError> {
        let credential = self.credential();
        match self.backend.list_conversations(credential.as_deref()).await {
            Ok(list) => {
                self.confirmed = list;
                self.promote_active();
                self.sync_sidebar();
                Ok(())
            }
            Err(ApiError::Unauthorized) => Err(self.end_session()),
            Err(e) => {
                warn!("Failed to refresh conversation list: {}", e);
                self.sync_sidebar();
                Ok(())
            }
        }
    }

    pub fn logout(&mut self) {
        info!("Logging out");
        persisted("session", self.store.clear());
        self.reset();
        self.view.session_ended(EndReason::Logout);
    }

    fn end_session(&mut self) -> ManagerError {
        warn!("Credential rejected by server, ending session");
        persisted("session", self.store.clear());
        self.reset();
        self.view.session_ended(EndReason::Expired);
        ManagerError::SessionExpired
    }

    fn reset(&mut self) {
        self.state = ConversationState::NoActiveConversation;
        self.transcript.clear();
        self.confirmed.clear();
        self.sidebar.clear();
        self.just_started = false;
    }

    /// Moves the active id between unsaved and confirmed to match the list.
    fn promote_active(&mut self) {
        let Some(id) = self.state.active_id().map(str::to_string) else {
            return;
        };
        let listed = self.confirmed.iter().any(|c| c.id == id);
        self.state = if listed {
            ConversationState::ConfirmedActive(id)
        } else {
            ConversationState::UnsavedActive(id)
        };
    }

    fn sync_sidebar(&mut self) {
        self.sidebar = reconcile(
            &self.confirmed,
            self.state.active_id(),
            self.language.unsaved_label(),
        );
        self.view.sidebar_changed(&self.sidebar);
    }

    fn append(&mut self, message: Message) {
        self.view.message_appended(&message);
        self.transcript.push(message);
    }

    fn snapshot(&mut self) {
        let blob = self.transcript.to_snapshot();
        persisted("transcript", self.store.snapshot_transcript(&blob));
    }
}
