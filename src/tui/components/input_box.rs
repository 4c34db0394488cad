//! # InputBox Component
//!
//! Message composer. Grows with its content up to [`MAX_VISIBLE_LINES`],
//! then keeps the tail of the buffer in view. Editing happens at the end of
//! the buffer.
//!
//! Lines starting with `/` are client commands rather than messages; see
//! [`Submission::parse`].

use std::path::PathBuf;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, BorderType, Padding, Paragraph};
use unicode_width::UnicodeWidthStr;

use crate::core::strings::Language;
use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

/// Border (2) + padding (2) consumed horizontally by the bordered block
const HORIZONTAL_OVERHEAD: u16 = 4;
/// Top + bottom borders
const VERTICAL_OVERHEAD: u16 = 2;
/// Content lines shown before the box stops growing
pub const MAX_VISIBLE_LINES: u16 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Submit(Submission),
    ContentChanged,
}

/// What a submitted line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Message(String),
    Attach(PathBuf),
    Detach,
    NewConversation,
    Refresh,
    Logout,
}

impl Submission {
    /// `/attach <path>`, `/detach`, `/new`, `/refresh` and `/logout` are
    /// commands; anything else, including unknown `/words`, is a message.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let (head, rest) = trimmed
            .split_once(char::is_whitespace)
            .map(|(h, r)| (h, r.trim()))
            .unwrap_or((trimmed, ""));
        match (head, rest) {
            ("/attach", path) if !path.is_empty() => Submission::Attach(PathBuf::from(path)),
            ("/detach", "") => Submission::Detach,
            ("/new", "") => Submission::NewConversation,
            ("/refresh", "") => Submission::Refresh,
            ("/logout", "") => Submission::Logout,
            _ => Submission::Message(text.to_string()),
        }
    }
}

fn wrap_options(width: u16) -> textwrap::Options<'static> {
    textwrap::Options::new(width as usize)
        .break_words(true)
        .word_separator(textwrap::WordSeparator::AsciiSpace)
}

/// Wrapped display lines. A trailing newline yields a trailing empty line so
/// the cursor lands below it.
fn wrap_lines(text: &str, width: u16) -> Vec<String> {
    if width == 0 || text.is_empty() {
        return vec![String::new()];
    }
    let mut lines: Vec<String> = textwrap::wrap(text, wrap_options(width))
        .into_iter()
        .map(|l| l.into_owned())
        .collect();
    if lines.is_empty() {
        lines.push(String::new());
    }
    if text.ends_with('\n') && lines.last().is_some_and(|l| !l.is_empty()) {
        lines.push(String::new());
    }
    lines
}

pub struct InputBox {
    pub buffer: String,
    /// File name of the image that goes out with the next message (prop).
    pub attachment: Option<String>,
    /// A reply is in flight; submissions of messages are held back (prop).
    pub busy: bool,
    /// Keys go here rather than to the sidebar (prop).
    pub focused: bool,
    pub language: Language,
}

impl InputBox {
    pub fn new(language: Language) -> Self {
        Self {
            buffer: String::new(),
            attachment: None,
            busy: false,
            focused: true,
            language,
        }
    }

    /// Required height for the current buffer, between one and
    /// [`MAX_VISIBLE_LINES`] content lines plus borders.
    pub fn calculate_height(&self, width: u16) -> u16 {
        let inner = width.saturating_sub(HORIZONTAL_OVERHEAD);
        let count = u16::try_from(wrap_lines(&self.buffer, inner).len()).unwrap_or(u16::MAX);
        count.clamp(1, MAX_VISIBLE_LINES) + VERTICAL_OVERHEAD
    }

    fn title(&self) -> String {
        match &self.attachment {
            Some(name) => format!(" ✉ 📎 {name} "),
            None => " ✉ ".to_string(),
        }
    }
}

impl Component for InputBox {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let inner_width = area.width.saturating_sub(HORIZONTAL_OVERHEAD);
        let border = match (self.focused, self.busy) {
            (false, _) => Style::default().fg(Color::DarkGray),
            (true, true) => Style::default().fg(Color::Yellow).add_modifier(Modifier::DIM),
            (true, false) => Style::default().fg(Color::Green),
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(border)
            .title(self.title())
            .padding(Padding::horizontal(1));

        if self.buffer.is_empty() {
            let placeholder = Paragraph::new(self.language.input_placeholder())
                .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))
                .block(block);
            frame.render_widget(placeholder, area);
            if self.focused {
                frame.set_cursor_position((area.x + 2, area.y + 1));
            }
            return;
        }

        let lines = wrap_lines(&self.buffer, inner_width);
        let skip = lines.len().saturating_sub(MAX_VISIBLE_LINES as usize);
        let visible: Vec<Line> = lines[skip..].iter().map(|l| Line::raw(l.clone())).collect();
        let last_width = lines.last().map(|l| l.width()).unwrap_or(0);
        let rows = visible.len();

        let input = Paragraph::new(visible)
            .block(block)
            .style(Style::default().fg(Color::Green));
        frame.render_widget(input, area);

        if self.focused {
            let x = area.x + 2 + u16::try_from(last_width).unwrap_or(0).min(inner_width);
            let y = area.y + u16::try_from(rows).unwrap_or(1);
            frame.set_cursor_position((x, y));
        }
    }
}

impl EventHandler for InputBox {
    type Event = InputEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<InputEvent> {
        match event {
            TuiEvent::InputChar(c) => {
                self.buffer.push(*c);
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Paste(text) => {
                // Terminals send CR for newlines in bracketed paste
                self.buffer.push_str(&text.replace("\r\n", "\n").replace('\r', "\n"));
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Backspace => self.buffer.pop().map(|_| InputEvent::ContentChanged),
            TuiEvent::Submit => {
                if self.buffer.trim().is_empty() {
                    return None;
                }
                let submission = Submission::parse(&self.buffer);
                // Hold the text while a reply streams; commands still go through
                if self.busy && matches!(submission, Submission::Message(_)) {
                    return None;
                }
                self.buffer.clear();
                Some(InputEvent::Submit(submission))
            }
            _ => None,
        }
    }
}
