//! # Transcript view
//!
//! Scrollable list of message cards for the active conversation, with the
//! in-flight reply (if any) drawn as a last, volatile card.
//!
//! `TranscriptView` is transient (built each frame) and wraps the persistent
//! `&mut TranscriptState`, so heights and scroll position are updated during
//! the render pass.

use ratatui::Frame;
use ratatui::layout::{Position, Rect, Size};
use ratatui::style::{Modifier, Style};
use ratatui::text::Text;
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};

use crate::core::stream::Formatter;
use crate::core::transcript::{Message, Sender};
use crate::tui::component::{Component, EventHandler};
use crate::tui::components::message::MessageCard;
use crate::tui::event::TuiEvent;
use crate::tui::markdown::{REPLY_FG, ReplyFormatter};

/// A message as drawn: the sender plus its rendered body.
#[derive(Debug, Clone)]
pub struct Entry {
    pub sender: Sender,
    pub body: Text<'static>,
}

impl Entry {
    pub fn from_message(message: &Message, formatter: ReplyFormatter) -> Self {
        let body = match message.sender {
            Sender::Assistant => formatter.format(&message.text),
            Sender::User | Sender::Error => Text::raw(message.text.clone()),
        };
        Self {
            sender: message.sender,
            body,
        }
    }
}

pub struct TranscriptState {
    entries: Vec<Entry>,
    /// Latest rendering of the reply being streamed.
    pending: Option<Text<'static>>,
    pub scroll_state: ScrollViewState,
    pub layout: LayoutCache,
    /// When true, follow new content.
    pub stick_to_bottom: bool,
    /// Last known viewport height (for scroll clamping between frames).
    pub viewport_height: u16,
}

impl Default for TranscriptState {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptState {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            pending: None,
            scroll_state: ScrollViewState::default(),
            layout: LayoutCache::default(),
            stick_to_bottom: true,
            viewport_height: 0,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn pending(&self) -> Option<&Text<'static>> {
        self.pending.as_ref()
    }

    /// Swap in a whole conversation and jump to its end.
    pub fn replace(&mut self, messages: &[Message], formatter: ReplyFormatter) {
        self.entries = messages
            .iter()
            .map(|m| Entry::from_message(m, formatter))
            .collect();
        self.pending = None;
        self.layout.invalidate();
        self.stick_to_bottom = true;
    }

    pub fn push(&mut self, message: &Message, formatter: ReplyFormatter) {
        self.entries.push(Entry::from_message(message, formatter));
    }

    pub fn set_pending(&mut self, rendering: Text<'static>) {
        self.pending = Some(rendering);
    }

    /// Stand-in card until the first chunk of a reply arrives.
    pub fn set_thinking(&mut self, label: &str) {
        self.pending = Some(Text::styled(
            label.to_string(),
            Style::default().fg(REPLY_FG).add_modifier(Modifier::ITALIC),
        ));
    }

    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    fn max_offset(&self, pending_height: u16) -> u16 {
        self.layout
            .total()
            .saturating_add(pending_height)
            .saturating_sub(self.viewport_height)
    }

    pub fn clamp_scroll(&mut self, pending_height: u16) {
        let max_y = self.max_offset(pending_height);
        let current = self.scroll_state.offset();
        if current.y > max_y {
            self.scroll_state.set_offset(Position { x: current.x, y: max_y });
        }
    }

    /// Re-engage follow mode once the user scrolls back to the end.
    pub fn repin_if_at_bottom(&mut self) {
        let max_y = self.max_offset(self.layout.pending_height);
        let current = self.scroll_state.offset();
        if current.y >= max_y {
            self.stick_to_bottom = true;
            self.scroll_state.set_offset(Position { x: current.x, y: max_y });
        }
    }
}

impl EventHandler for TranscriptState {
    type Event = ();

    fn handle_event(&mut self, event: &TuiEvent) -> Option<()> {
        match event {
            TuiEvent::ScrollUp | TuiEvent::CursorUp => {
                self.scroll_state.scroll_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollDown | TuiEvent::CursorDown => {
                self.scroll_state.scroll_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollPageUp => {
                self.scroll_state.scroll_page_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollPageDown => {
                self.scroll_state.scroll_page_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollToBottom => {
                self.stick_to_bottom = true;
                self.scroll_state.scroll_to_bottom();
            }
            _ => {}
        }
        None
    }
}

/// Card heights for settled entries, measured once per width.
#[derive(Default)]
pub struct LayoutCache {
    heights: Vec<u16>,
    prefix_heights: Vec<u16>,
    width: u16,
    /// Height of the in-flight card as of the last frame.
    pending_height: u16,
}

impl LayoutCache {
    pub fn invalidate(&mut self) {
        self.heights.clear();
        self.prefix_heights.clear();
    }

    /// Measure entries added since the last call. Settled entries never change,
    /// so only a width change or an explicit invalidation forces a re-measure.
    pub fn sync(&mut self, entries: &[Entry], width: u16) {
        if width != self.width || entries.len() < self.heights.len() {
            self.invalidate();
            self.width = width;
        }
        for entry in &entries[self.heights.len()..] {
            let height = MessageCard::calculate_height(&entry.body, width);
            self.heights.push(height);
            let end = self.total().saturating_add(height);
            self.prefix_heights.push(end);
        }
    }

    pub fn heights(&self) -> &[u16] {
        &self.heights
    }

    pub fn total(&self) -> u16 {
        self.prefix_heights.last().copied().unwrap_or(0)
    }

    /// Entries overlapping the viewport, with half a screen of slack each side.
    pub fn visible_range(&self, scroll_offset: u16, viewport_height: u16) -> std::ops::Range<usize> {
        let slack = viewport_height / 2;
        let top = scroll_offset.saturating_sub(slack);
        let bottom = scroll_offset
            .saturating_add(viewport_height)
            .saturating_add(slack);
        let start = self.prefix_heights.partition_point(|&end| end <= top);
        let end = self
            .prefix_heights
            .partition_point(|&end| end < bottom)
            .saturating_add(1)
            .min(self.prefix_heights.len());
        start..end.max(start)
    }
}

pub struct TranscriptView<'a> {
    pub state: &'a mut TranscriptState,
}

impl<'a> TranscriptView<'a> {
    pub fn new(state: &'a mut TranscriptState) -> Self {
        Self { state }
    }
}

impl Component for TranscriptView<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let content_width = area.width.saturating_sub(1); // scrollbar column
        self.state.layout.sync(&self.state.entries, content_width);

        let pending = self.state.pending.clone();
        let pending_height = pending
            .as_ref()
            .map(|body| MessageCard::calculate_height(body, content_width))
            .unwrap_or(0);
        self.state.layout.pending_height = pending_height;

        let settled_height = self.state.layout.total();
        let canvas_height = settled_height.saturating_add(pending_height);

        self.state.viewport_height = area.height;
        if !self.state.stick_to_bottom {
            self.state.clamp_scroll(pending_height);
        }

        let scroll_offset = self.state.scroll_state.offset().y;
        let visible = self.state.layout.visible_range(scroll_offset, area.height);

        let mut scroll_view = ScrollView::new(Size::new(content_width, canvas_height))
            .vertical_scrollbar_visibility(ScrollbarVisibility::Automatic)
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);

        let mut y = match visible.start {
            0 => 0,
            i => self.state.layout.prefix_heights[i - 1],
        };
        for i in visible {
            let entry = &self.state.entries[i];
            let height = self.state.layout.heights[i];
            let card = MessageCard::new(entry.sender, &entry.body);
            scroll_view.render_widget(card, Rect::new(0, y, content_width, height));
            y = y.saturating_add(height);
        }

        if let Some(body) = &pending {
            let card = MessageCard::new(Sender::Assistant, body).streaming(true);
            scroll_view.render_widget(
                card,
                Rect::new(0, settled_height, content_width, pending_height),
            );
        }

        if self.state.stick_to_bottom {
            self.state.scroll_state.scroll_to_bottom();
        }
        frame.render_stateful_widget(scroll_view, area, &mut self.state.scroll_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str) -> Entry {
        Entry::from_message(&Message::user(text), ReplyFormatter::Plain)
    }

    #[test]
    fn sync_measures_only_new_entries() {
        let mut cache = LayoutCache::default();
        let mut entries = vec![entry("uno"), entry("dos")];
        cache.sync(&entries, 40);
        assert_eq!(cache.heights(), &[3, 3]);
        assert_eq!(cache.total(), 6);

        entries.push(entry("tres\ncuatro"));
        cache.sync(&entries, 40);
        assert_eq!(cache.heights(), &[3, 3, 4]);
        assert_eq!(cache.total(), 10);
    }

    #[test]
    fn width_change_remeasures() {
        let mut cache = LayoutCache::default();
        let entries = vec![entry("aaaa bbbb cccc dddd")];
        cache.sync(&entries, 40);
        assert_eq!(cache.heights(), &[3]);
        cache.sync(&entries, 14);
        assert_eq!(cache.heights(), &[4]);
    }

    #[test]
    fn shrinking_entries_remeasures() {
        let mut cache = LayoutCache::default();
        cache.sync(&[entry("a"), entry("b\nc")], 40);
        cache.sync(&[entry("x\ny\nz")], 40);
        assert_eq!(cache.heights(), &[5]);
    }

    #[test]
    fn visible_range_covers_viewport() {
        let mut cache = LayoutCache::default();
        let entries: Vec<Entry> = (0..20).map(|i| entry(&i.to_string())).collect();
        cache.sync(&entries, 40);
        // Each card is 3 rows; offset 30 is card 10, viewport 6 rows, slack 3.
        let range = cache.visible_range(30, 6);
        assert!(range.start <= 9 && range.end >= 12, "{range:?}");
        assert!(range.end <= entries.len());
    }

    #[test]
    fn assistant_entries_go_through_formatter() {
        let entry = Entry::from_message(&Message::assistant("**sí**"), ReplyFormatter::Markdown);
        let first: String = entry.body.lines[0]
            .spans
            .iter()
            .map(|s| s.content.as_ref())
            .collect();
        assert_eq!(first, "🍳 sí");

        let error = Entry::from_message(&Message::error("**no**"), ReplyFormatter::Markdown);
        assert_eq!(error.body.lines[0].spans[0].content, "**no**");
    }

    #[test]
    fn replace_drops_pending_and_repins() {
        let mut state = TranscriptState::new();
        state.set_pending(Text::raw("🍳 a medias"));
        state.stick_to_bottom = false;
        state.replace(&[Message::user("hola")], ReplyFormatter::Plain);
        assert!(state.pending().is_none());
        assert!(state.stick_to_bottom);
        assert_eq!(state.entries().len(), 1);
    }

    #[test]
    fn thinking_placeholder_is_pending_until_replaced() {
        let mut state = TranscriptState::new();
        state.set_thinking("Pensando...");
        assert_eq!(state.pending().unwrap().lines[0].spans[0].content, "Pensando...");
        state.set_pending(Text::raw("🍳 Hola"));
        assert_eq!(state.pending().unwrap().lines[0].spans[0].content, "🍳 Hola");
        state.clear_pending();
        assert!(state.pending().is_none());
    }

    #[test]
    fn scrolling_up_unpins() {
        let mut state = TranscriptState::new();
        state.handle_event(&TuiEvent::ScrollUp);
        assert!(!state.stick_to_bottom);
        state.handle_event(&TuiEvent::ScrollToBottom);
        assert!(state.stick_to_bottom);
    }
}
