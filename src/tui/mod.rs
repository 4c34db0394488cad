//! # TUI Adapter
//!
//! The ratatui-specific layer: terminal I/O, layout, and translating key
//! presses into [`Command`]s for the conversation manager.
//!
//! The manager runs as a tokio task (the "actor") that owns the session
//! store and the backend and executes commands one at a time. It reports
//! back through [`ChannelView`], which turns every view callback into a
//! [`UiUpdate`] on a std channel. The event loop drains that channel each
//! iteration, so the terminal is the only thing the loop itself touches.
//!
//! ## Redraw Strategy
//!
//! - **Busy** (a command is running): polls at the reply redraw interval so
//!   streamed text shows up at the cadence the manager renders it.
//! - **Idle**: sleeps up to 500ms, only redrawing on input or resize.

mod component;
mod components;
mod event;
pub mod markdown;
mod ui;

use std::io::{self, stdout};
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use crossterm::cursor::{SetCursorStyle, Show};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use log::{debug, info, warn};
use ratatui::DefaultTerminal;
use ratatui::text::Text;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::backend::{Attachment, Backend, HttpBackend};
use crate::core::config::ResolvedConfig;
use crate::core::manager::{EndReason, SidebarRow};
use crate::core::session::SessionStore;
use crate::core::strings::Language;
use crate::core::transcript::{Message, Transcript};
use crate::core::{Command, ConversationManager, ConversationView, ManagerError};
use crate::tui::component::EventHandler;
use crate::tui::components::{
    InputBox, InputEvent, SidebarEvent, SidebarState, Submission, TranscriptState,
};
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};
use crate::tui::markdown::ReplyFormatter;

const IDLE_POLL: Duration = Duration::from_millis(500);
/// Floor for the busy poll so a zero redraw interval does not spin.
const MIN_BUSY_POLL: Duration = Duration::from_millis(16);

// ============================================================================
// Manager → UI
// ============================================================================

/// One view callback, carried across the channel.
#[derive(Debug)]
pub enum UiUpdate {
    TranscriptReplaced(Vec<Message>),
    MessageAppended(Message),
    ReplyStarted,
    ReplyRedrawn(Text<'static>),
    ReplyCompleted(Message),
    ReplyDiscarded,
    Sidebar(Vec<SidebarRow>),
    SessionEnded(EndReason),
    Busy(bool),
    Status(String),
}

/// [`ConversationView`] that forwards everything to the event loop.
pub struct ChannelView {
    tx: mpsc::Sender<UiUpdate>,
    formatter: ReplyFormatter,
}

impl ChannelView {
    pub fn new(tx: mpsc::Sender<UiUpdate>, formatter: ReplyFormatter) -> Self {
        Self { tx, formatter }
    }

    fn send(&self, update: UiUpdate) {
        if self.tx.send(update).is_err() {
            debug!("UI gone; dropping update");
        }
    }
}

impl ConversationView for ChannelView {
    type Formatter = ReplyFormatter;

    fn reply_formatter(&self) -> ReplyFormatter {
        self.formatter
    }

    fn transcript_replaced(&mut self, transcript: &Transcript) {
        self.send(UiUpdate::TranscriptReplaced(transcript.messages().to_vec()));
    }

    fn message_appended(&mut self, message: &Message) {
        self.send(UiUpdate::MessageAppended(message.clone()));
    }

    fn reply_started(&mut self) {
        self.send(UiUpdate::ReplyStarted);
    }

    fn reply_redrawn(&mut self, rendering: Text<'static>) {
        self.send(UiUpdate::ReplyRedrawn(rendering));
    }

    fn reply_completed(&mut self, message: &Message) {
        self.send(UiUpdate::ReplyCompleted(message.clone()));
    }

    fn reply_discarded(&mut self) {
        self.send(UiUpdate::ReplyDiscarded);
    }

    fn sidebar_changed(&mut self, rows: &[SidebarRow]) {
        self.send(UiUpdate::Sidebar(rows.to_vec()));
    }

    fn session_ended(&mut self, reason: EndReason) {
        self.send(UiUpdate::SessionEnded(reason));
    }
}

fn report(updates: &mpsc::Sender<UiUpdate>, error: ManagerError) {
    let status = match error {
        // The view already heard about it through `session_ended`
        ManagerError::SessionExpired => return,
        other => other.to_string(),
    };
    let _ = updates.send(UiUpdate::Status(status));
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Send { .. } => "send",
        Command::StartNew => "start-new",
        Command::SwitchTo(_) => "switch",
        Command::Rename { .. } => "rename",
        Command::Delete { .. } => "delete",
        Command::Refresh => "refresh",
        Command::Logout => "logout",
    }
}

/// Runs the manager on its own task, one command at a time.
fn spawn_manager(
    mut manager: ConversationManager<ChannelView>,
    mut commands: UnboundedReceiver<Command>,
    updates: mpsc::Sender<UiUpdate>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let _ = updates.send(UiUpdate::Busy(true));
        if let Err(e) = manager.open().await {
            report(&updates, e);
        }
        let _ = updates.send(UiUpdate::Busy(false));

        while let Some(command) = commands.recv().await {
            let name = command_name(&command);
            debug!("Manager running {}", name);
            let _ = updates.send(UiUpdate::Busy(true));
            if let Err(e) = manager.handle(command).await {
                debug!("{} failed: {}", name, e);
                report(&updates, e);
            }
            let _ = updates.send(UiUpdate::Busy(false));
        }
        debug!("Command channel closed; manager stopping");
    })
}

// ============================================================================
// Presentation state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    Sidebar,
}

/// What a key press asks of the outside world.
#[derive(Debug)]
pub enum Outgoing {
    Quit,
    Command(Command),
}

/// TUI-specific presentation state (no business logic lives here).
pub struct TuiState {
    pub transcript: TranscriptState,
    pub sidebar: SidebarState,
    pub input_box: InputBox,
    pub focus: Focus,
    pub busy: bool,
    pub status: Option<String>,
    /// Goes out with the next message.
    pub attachment: Option<Attachment>,
    pub display_name: String,
    pub language: Language,
    pub formatter: ReplyFormatter,
    /// Set once the manager reports the session is over.
    pub ended: Option<EndReason>,
}

impl TuiState {
    pub fn new(display_name: String, language: Language, formatter: ReplyFormatter) -> Self {
        Self {
            transcript: TranscriptState::new(),
            sidebar: SidebarState::default(),
            input_box: InputBox::new(language),
            focus: Focus::Input,
            busy: false,
            status: None,
            attachment: None,
            display_name,
            language,
            formatter,
            ended: None,
        }
    }

    /// Title of the open conversation, from the sidebar.
    pub fn active_title(&self) -> Option<&str> {
        self.sidebar
            .rows()
            .iter()
            .find(|r| r.active)
            .map(|r| r.title.as_str())
    }

    /// Fold one manager update into the presentation state.
    pub fn apply(&mut self, update: UiUpdate) {
        match update {
            UiUpdate::TranscriptReplaced(messages) => {
                self.transcript.replace(&messages, self.formatter)
            }
            UiUpdate::MessageAppended(message) => self.transcript.push(&message, self.formatter),
            UiUpdate::ReplyStarted => self.transcript.set_thinking(self.language.thinking()),
            UiUpdate::ReplyRedrawn(rendering) => self.transcript.set_pending(rendering),
            UiUpdate::ReplyCompleted(message) => {
                self.transcript.clear_pending();
                self.transcript.push(&message, self.formatter);
            }
            UiUpdate::ReplyDiscarded => self.transcript.clear_pending(),
            UiUpdate::Sidebar(rows) => self.sidebar.set_rows(rows),
            UiUpdate::SessionEnded(reason) => self.ended = Some(reason),
            UiUpdate::Busy(busy) => self.busy = busy,
            UiUpdate::Status(status) => self.status = Some(status),
        }
    }

    /// Push presentation state into component props before drawing.
    fn sync_props(&mut self) {
        self.input_box.busy = self.busy;
        self.input_box.focused = self.focus == Focus::Input;
        self.input_box.attachment = self.attachment.as_ref().map(|a| a.file_name.clone());
    }

    pub fn handle_event(&mut self, event: &TuiEvent) -> Option<Outgoing> {
        match event {
            TuiEvent::Resize => return None,
            TuiEvent::ForceQuit => return Some(Outgoing::Quit),
            TuiEvent::ScrollUp
            | TuiEvent::ScrollDown
            | TuiEvent::ScrollPageUp
            | TuiEvent::ScrollPageDown
            | TuiEvent::ScrollToBottom => {
                self.transcript.handle_event(event);
                return None;
            }
            _ => {}
        }

        match self.focus {
            Focus::Sidebar => {
                let command = match self.sidebar.handle_event(event)? {
                    SidebarEvent::Open(id) => {
                        self.focus = Focus::Input;
                        Command::SwitchTo(id)
                    }
                    SidebarEvent::StartNew => {
                        self.focus = Focus::Input;
                        Command::StartNew
                    }
                    SidebarEvent::Rename { id, title } => Command::Rename { id, title },
                    SidebarEvent::Delete(id) => Command::Delete { id, confirmed: true },
                    SidebarEvent::Release => {
                        self.focus = Focus::Input;
                        return None;
                    }
                };
                Some(Outgoing::Command(command))
            }
            Focus::Input => match event {
                TuiEvent::Tab | TuiEvent::Escape => {
                    self.focus = Focus::Sidebar;
                    None
                }
                TuiEvent::CursorUp | TuiEvent::CursorDown => {
                    self.transcript.handle_event(event);
                    None
                }
                _ => {
                    self.sync_props();
                    match self.input_box.handle_event(event) {
                        Some(InputEvent::Submit(submission)) => self.submit(submission),
                        Some(InputEvent::ContentChanged) => None,
                        None => {
                            if self.busy && matches!(event, TuiEvent::Submit) {
                                self.status = Some(self.language.busy().to_string());
                            }
                            None
                        }
                    }
                }
            },
        }
    }

    fn submit(&mut self, submission: Submission) -> Option<Outgoing> {
        let command = match submission {
            Submission::Message(text) => {
                self.status = None;
                Command::Send {
                    text,
                    attachment: self.attachment.take(),
                }
            }
            Submission::Attach(path) => {
                let path = expand_home(&path);
                match Attachment::from_path(&path) {
                    Ok(attachment) => {
                        info!("Attached {}", path.display());
                        self.status = Some(self.language.attached(&attachment.file_name));
                        self.attachment = Some(attachment);
                    }
                    Err(e) => {
                        warn!("Could not read {}: {}", path.display(), e);
                        self.status = Some(self.language.attach_error(&e.to_string()));
                    }
                }
                return None;
            }
            Submission::Detach => {
                self.attachment = None;
                self.status = None;
                return None;
            }
            Submission::NewConversation => Command::StartNew,
            Submission::Refresh => Command::Refresh,
            Submission::Logout => Command::Logout,
        };
        Some(Outgoing::Command(command))
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

// ============================================================================
// Terminal
// ============================================================================

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> io::Result<Self> {
        // Harmlessly ignored by terminals without the keyboard protocol
        execute!(
            stdout(),
            EnableMouseCapture,
            EnableBracketedPaste,
            Show,
            SetCursorStyle::SteadyBar,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )?;
        info!("Terminal modes enabled (mouse, bracketed paste, keyboard enhancement)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(
            stdout(),
            PopKeyboardEnhancementFlags,
            DisableMouseCapture,
            DisableBracketedPaste,
            SetCursorStyle::DefaultUserShape
        );
    }
}

/// Runs the chat UI until the user quits or the session ends.
///
/// Returns why the session ended, or `None` when the user simply quit.
/// Must be called from within a tokio runtime.
pub fn run(config: &ResolvedConfig, store: SessionStore) -> io::Result<Option<EndReason>> {
    let display_name = store.get().display_name;
    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(config.base_url.clone()));
    let formatter = ReplyFormatter::from_config(config.markdown);

    let (update_tx, update_rx) = mpsc::channel();
    let (command_tx, command_rx) = unbounded_channel();

    let manager = ConversationManager::new(
        backend,
        store,
        ChannelView::new(update_tx.clone(), formatter),
    )
    .with_language(config.language)
    .with_redraw_interval(config.redraw_interval);
    let actor = spawn_manager(manager, command_rx, update_tx);

    let mut tui = TuiState::new(display_name, config.language, formatter);
    let busy_poll = config.redraw_interval.max(MIN_BUSY_POLL);

    let mut terminal = ratatui::init();
    let guard = TerminalModeGuard::new();
    if let Err(e) = &guard {
        warn!("Could not enable terminal modes: {}", e);
    }
    let result = event_loop(&mut terminal, &mut tui, &update_rx, &command_tx, busy_poll);
    drop(guard);
    ratatui::restore();

    // A reply may still be streaming; nothing it does matters once we leave.
    drop(command_tx);
    actor.abort();

    result.map(|()| tui.ended)
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    tui: &mut TuiState,
    updates: &mpsc::Receiver<UiUpdate>,
    commands: &UnboundedSender<Command>,
    busy_poll: Duration,
) -> io::Result<()> {
    let start_time = Instant::now();
    let mut needs_redraw = true;

    loop {
        while let Ok(update) = updates.try_recv() {
            tui.apply(update);
            needs_redraw = true;
        }
        if let Some(reason) = tui.ended {
            info!("Session ended ({:?})", reason);
            return Ok(());
        }

        if tui.busy {
            needs_redraw = true;
        }
        if needs_redraw {
            tui.sync_props();
            let spinner_frame = (start_time.elapsed().as_secs_f32() * 8.0) as usize;
            terminal.draw(|f| ui::draw_ui(f, tui, spinner_frame))?;
            needs_redraw = false;
        }

        let timeout = if tui.busy { busy_poll } else { IDLE_POLL };
        let first_event = poll_event_timeout(timeout);
        if first_event.is_some() {
            needs_redraw = true;
        }

        // Drain everything pending before the next draw
        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            match tui.handle_event(&event) {
                Some(Outgoing::Quit) => {
                    info!("Quit requested");
                    return Ok(());
                }
                Some(Outgoing::Command(command)) => {
                    debug!("Dispatching {}", command_name(&command));
                    // The actor confirms with Busy(false) when it is done
                    tui.busy = true;
                    if commands.send(command).is_err() {
                        warn!("Conversation manager stopped; leaving");
                        return Ok(());
                    }
                }
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stream::Formatter;

    fn state() -> TuiState {
        let mut tui = TuiState::new("Ana".into(), Language::Es, ReplyFormatter::Plain);
        tui.apply(UiUpdate::Sidebar(vec![
            SidebarRow {
                id: "id-1".into(),
                title: "(Nueva Receta)".into(),
                active: true,
                unsaved: true,
            },
            SidebarRow {
                id: "c-1".into(),
                title: "Paella".into(),
                active: false,
                unsaved: false,
            },
        ]));
        tui
    }

    fn type_text(tui: &mut TuiState, text: &str) {
        for c in text.chars() {
            assert!(tui.handle_event(&TuiEvent::InputChar(c)).is_none());
        }
    }

    #[test]
    fn reply_lifecycle_updates_transcript() {
        let mut tui = state();
        tui.apply(UiUpdate::TranscriptReplaced(vec![Message::assistant("Hola")]));
        tui.apply(UiUpdate::MessageAppended(Message::user("¿Qué ceno?")));
        tui.apply(UiUpdate::ReplyStarted);
        assert!(tui.transcript.pending().is_some());

        tui.apply(UiUpdate::ReplyRedrawn(ReplyFormatter::Plain.format("Tort")));
        tui.apply(UiUpdate::ReplyCompleted(Message::assistant("Tortilla")));
        assert!(tui.transcript.pending().is_none());
        assert_eq!(tui.transcript.entries().len(), 3);
    }

    #[test]
    fn discarded_reply_leaves_no_card() {
        let mut tui = state();
        tui.apply(UiUpdate::ReplyStarted);
        tui.apply(UiUpdate::ReplyDiscarded);
        assert!(tui.transcript.pending().is_none());
        assert!(tui.transcript.entries().is_empty());
    }

    #[test]
    fn submit_sends_message_with_attachment() {
        let mut tui = state();
        tui.attachment = Some(Attachment {
            file_name: "tarta.jpg".into(),
            mime_type: "image/jpeg".into(),
            bytes: vec![1, 2, 3],
        });
        type_text(&mut tui, "¿Qué es esto?");
        match tui.handle_event(&TuiEvent::Submit) {
            Some(Outgoing::Command(Command::Send { text, attachment })) => {
                assert_eq!(text, "¿Qué es esto?");
                assert_eq!(attachment.unwrap().file_name, "tarta.jpg");
            }
            other => panic!("expected send, got {other:?}"),
        }
        assert!(tui.attachment.is_none());
    }

    #[test]
    fn busy_holds_message_and_says_so() {
        let mut tui = state();
        tui.apply(UiUpdate::Busy(true));
        type_text(&mut tui, "otra");
        assert!(tui.handle_event(&TuiEvent::Submit).is_none());
        assert_eq!(tui.status.as_deref(), Some(Language::Es.busy()));
        assert_eq!(tui.input_box.buffer, "otra");
    }

    #[test]
    fn attach_reads_file_and_detach_drops_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pan.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let mut tui = state();
        type_text(&mut tui, &format!("/attach {}", path.display()));
        assert!(tui.handle_event(&TuiEvent::Submit).is_none());
        let attachment = tui.attachment.as_ref().unwrap();
        assert_eq!(attachment.mime_type, "image/png");
        assert!(tui.status.as_deref().unwrap().contains("pan.png"));

        type_text(&mut tui, "/detach");
        assert!(tui.handle_event(&TuiEvent::Submit).is_none());
        assert!(tui.attachment.is_none());
    }

    #[test]
    fn missing_attachment_reports_status() {
        let mut tui = state();
        type_text(&mut tui, "/attach /no/such/file.jpg");
        assert!(tui.handle_event(&TuiEvent::Submit).is_none());
        assert!(tui.attachment.is_none());
        assert!(tui.status.is_some());
    }

    #[test]
    fn sidebar_focus_routes_to_commands() {
        let mut tui = state();
        assert!(tui.handle_event(&TuiEvent::Tab).is_none());
        assert_eq!(tui.focus, Focus::Sidebar);

        tui.handle_event(&TuiEvent::CursorDown);
        tui.handle_event(&TuiEvent::InputChar('d'));
        match tui.handle_event(&TuiEvent::InputChar('d')) {
            Some(Outgoing::Command(Command::Delete { id, confirmed })) => {
                assert_eq!(id, "c-1");
                assert!(confirmed);
            }
            other => panic!("expected delete, got {other:?}"),
        }

        match tui.handle_event(&TuiEvent::Submit) {
            Some(Outgoing::Command(Command::SwitchTo(id))) => assert_eq!(id, "c-1"),
            other => panic!("expected switch, got {other:?}"),
        }
        assert_eq!(tui.focus, Focus::Input);
    }

    #[test]
    fn slash_commands_map_to_manager_commands() {
        let mut tui = state();
        type_text(&mut tui, "/logout");
        assert!(matches!(
            tui.handle_event(&TuiEvent::Submit),
            Some(Outgoing::Command(Command::Logout))
        ));
        type_text(&mut tui, "/new");
        assert!(matches!(
            tui.handle_event(&TuiEvent::Submit),
            Some(Outgoing::Command(Command::StartNew))
        ));
    }

    #[test]
    fn ctrl_c_quits_from_any_focus() {
        let mut tui = state();
        tui.focus = Focus::Sidebar;
        assert!(matches!(
            tui.handle_event(&TuiEvent::ForceQuit),
            Some(Outgoing::Quit)
        ));
    }

    #[test]
    fn session_end_is_recorded() {
        let mut tui = state();
        tui.apply(UiUpdate::SessionEnded(EndReason::Expired));
        assert_eq!(tui.ended, Some(EndReason::Expired));
    }

    #[test]
    fn active_title_comes_from_sidebar() {
        let tui = state();
        assert_eq!(tui.active_title(), Some("(Nueva Receta)"));
    }

    #[test]
    fn channel_view_forwards_callbacks() {
        let (tx, rx) = mpsc::channel();
        let mut view = ChannelView::new(tx, ReplyFormatter::Plain);
        view.reply_started();
        view.reply_redrawn(view.reply_formatter().format("a"));
        view.session_ended(EndReason::Logout);
        let updates: Vec<UiUpdate> = rx.try_iter().collect();
        assert!(matches!(updates[0], UiUpdate::ReplyStarted));
        assert!(matches!(updates[1], UiUpdate::ReplyRedrawn(_)));
        assert!(matches!(updates[2], UiUpdate::SessionEnded(EndReason::Logout)));
    }

    #[test]
    fn home_is_expanded() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/x.jpg")), home.join("x.jpg"));
        }
        assert_eq!(expand_home(Path::new("/tmp/x.jpg")), PathBuf::from("/tmp/x.jpg"));
    }
}
