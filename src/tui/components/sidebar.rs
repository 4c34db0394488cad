//! # Sidebar
//!
//! The reconciled conversation list. Focused with Tab; `n` starts a new
//! recipe, `r` renames inline, `d` twice deletes, Enter opens.
//!
//! Persistent `SidebarState` lives in `TuiState`; `Sidebar` is the
//! transient render wrapper.

use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Padding, Paragraph};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::core::manager::SidebarRow;
use crate::core::strings::Language;
use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

/// What the sidebar asks the conversation manager to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidebarEvent {
    Open(String),
    StartNew,
    Rename { id: String, title: String },
    Delete(String),
    /// Hand focus back to the input box.
    Release,
}

#[derive(Default)]
pub struct SidebarState {
    rows: Vec<SidebarRow>,
    selected: usize,
    pub list_state: ListState,
    confirm_delete: bool,
    /// Inline rename buffer for the selected row.
    renaming: Option<String>,
}

impl SidebarState {
    pub fn rows(&self) -> &[SidebarRow] {
        &self.rows
    }

    pub fn selected_row(&self) -> Option<&SidebarRow> {
        self.rows.get(self.selected)
    }

    pub fn is_confirming_delete(&self) -> bool {
        self.confirm_delete
    }

    pub fn rename_buffer(&self) -> Option<&str> {
        self.renaming.as_deref()
    }

    /// Replace the rows, keeping the cursor on the same conversation when it
    /// survived, otherwise on the active one.
    pub fn set_rows(&mut self, rows: Vec<SidebarRow>) {
        let previous = self.selected_row().map(|r| r.id.clone());
        let kept = previous.and_then(|id| rows.iter().position(|r| r.id == id));
        if kept.is_none() {
            self.renaming = None;
        }
        self.selected = kept
            .or_else(|| rows.iter().position(|r| r.active))
            .unwrap_or(0);
        self.confirm_delete = false;
        self.rows = rows;
        self.list_state
            .select((!self.rows.is_empty()).then_some(self.selected));
    }

    fn move_cursor(&mut self, down: bool) {
        if self.rows.is_empty() {
            return;
        }
        self.selected = if down {
            (self.selected + 1).min(self.rows.len() - 1)
        } else {
            self.selected.saturating_sub(1)
        };
        self.list_state.select(Some(self.selected));
    }

    fn handle_rename(&mut self, event: &TuiEvent) -> Option<SidebarEvent> {
        let buffer = self.renaming.as_mut()?;
        match event {
            TuiEvent::InputChar('\n') => {}
            TuiEvent::InputChar(c) => buffer.push(*c),
            TuiEvent::Paste(text) => buffer.extend(text.chars().filter(|c| *c != '\n')),
            TuiEvent::Backspace => {
                buffer.pop();
            }
            TuiEvent::Escape => self.renaming = None,
            TuiEvent::Submit => {
                let title = self.renaming.take()?;
                let row = self.selected_row()?;
                return Some(SidebarEvent::Rename {
                    id: row.id.clone(),
                    title,
                });
            }
            _ => {}
        }
        None
    }
}

impl EventHandler for SidebarState {
    type Event = SidebarEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<SidebarEvent> {
        if self.renaming.is_some() {
            return self.handle_rename(event);
        }

        // Any other key cancels a pending delete
        if !matches!(event, TuiEvent::InputChar('d')) {
            self.confirm_delete = false;
        }

        match event {
            TuiEvent::Escape | TuiEvent::Tab => Some(SidebarEvent::Release),
            TuiEvent::CursorUp => {
                self.move_cursor(false);
                None
            }
            TuiEvent::CursorDown => {
                self.move_cursor(true);
                None
            }
            TuiEvent::Submit => self
                .selected_row()
                .filter(|row| !row.active)
                .map(|row| SidebarEvent::Open(row.id.clone())),
            TuiEvent::InputChar('n') => Some(SidebarEvent::StartNew),
            TuiEvent::InputChar('r') => {
                let row = self.selected_row().filter(|row| !row.unsaved)?;
                self.renaming = Some(row.title.clone());
                None
            }
            TuiEvent::InputChar('d') => {
                let id = self.selected_row().filter(|row| !row.unsaved)?.id.clone();
                if self.confirm_delete {
                    self.confirm_delete = false;
                    Some(SidebarEvent::Delete(id))
                } else {
                    self.confirm_delete = true;
                    None
                }
            }
            _ => None,
        }
    }
}

pub struct Sidebar<'a> {
    state: &'a mut SidebarState,
    focused: bool,
    language: Language,
}

impl<'a> Sidebar<'a> {
    pub fn new(state: &'a mut SidebarState, focused: bool, language: Language) -> Self {
        Self {
            state,
            focused,
            language,
        }
    }

    fn help(&self) -> &'static str {
        if self.state.renaming.is_some() {
            self.language.rename_help()
        } else if self.state.confirm_delete {
            self.language.confirm_delete()
        } else {
            self.language.sidebar_help()
        }
    }

    fn row_line(&self, index: usize, row: &SidebarRow, width: usize) -> Line<'static> {
        let selected = self.focused && index == self.state.selected;
        let marker = if row.active { "▸ " } else { "  " };

        let mut style = if row.active {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        if row.unsaved {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if selected {
            style = if self.state.confirm_delete {
                Style::default()
                    .fg(Color::Red)
                    .add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else {
                style.add_modifier(Modifier::REVERSED)
            };
        }

        let text = match (&self.state.renaming, selected) {
            (Some(buffer), true) => format!("{buffer}▏"),
            _ => row.title.clone(),
        };
        let room = width.saturating_sub(marker.width());
        Line::from(vec![
            Span::styled(marker, style),
            Span::styled(truncate_to_width(&text, room), style),
        ])
    }
}

impl Component for Sidebar<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let border = if self.focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(self.language.sidebar_title())
            .title_alignment(Alignment::Left)
            .title_bottom(Line::from(self.help()).centered())
            .padding(Padding::horizontal(1));

        if self.state.rows.is_empty() {
            let empty = Paragraph::new(self.language.empty_list())
                .style(Style::default().fg(Color::DarkGray))
                .wrap(ratatui::widgets::Wrap { trim: true })
                .block(block);
            frame.render_widget(empty, area);
            return;
        }

        let width = block.inner(area).width as usize;
        let items: Vec<ListItem> = self
            .state
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| ListItem::new(self.row_line(i, row, width)))
            .collect();

        frame.render_stateful_widget(List::new(items).block(block), area, &mut self.state.list_state);
    }
}

/// Cut `s` to at most `max` display columns, ending in "…" when shortened.
pub fn truncate_to_width(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, title: &str, active: bool, unsaved: bool) -> SidebarRow {
        SidebarRow {
            id: id.into(),
            title: title.into(),
            active,
            unsaved,
        }
    }

    fn state() -> SidebarState {
        let mut state = SidebarState::default();
        state.set_rows(vec![
            row("id-new", "(Nueva Receta)", true, true),
            row("a", "Paella", false, false),
            row("b", "Gazpacho", false, false),
        ]);
        state
    }

    #[test]
    fn cursor_starts_on_active_row() {
        let state = state();
        assert_eq!(state.selected_row().unwrap().id, "id-new");
    }

    #[test]
    fn delete_needs_two_presses() {
        let mut state = state();
        state.handle_event(&TuiEvent::CursorDown);
        assert_eq!(state.handle_event(&TuiEvent::InputChar('d')), None);
        assert!(state.is_confirming_delete());
        assert_eq!(
            state.handle_event(&TuiEvent::InputChar('d')),
            Some(SidebarEvent::Delete("a".into()))
        );
        assert!(!state.is_confirming_delete());
    }

    #[test]
    fn other_key_cancels_delete() {
        let mut state = state();
        state.handle_event(&TuiEvent::CursorDown);
        state.handle_event(&TuiEvent::InputChar('d'));
        state.handle_event(&TuiEvent::CursorDown);
        assert!(!state.is_confirming_delete());
        assert_eq!(state.handle_event(&TuiEvent::InputChar('d')), None);
    }

    #[test]
    fn placeholder_cannot_be_deleted_or_renamed() {
        let mut state = state();
        assert_eq!(state.handle_event(&TuiEvent::InputChar('d')), None);
        assert!(!state.is_confirming_delete());
        state.handle_event(&TuiEvent::InputChar('r'));
        assert!(state.rename_buffer().is_none());
    }

    #[test]
    fn rename_edits_inline() {
        let mut state = state();
        state.handle_event(&TuiEvent::CursorDown);
        state.handle_event(&TuiEvent::InputChar('r'));
        assert_eq!(state.rename_buffer(), Some("Paella"));
        state.handle_event(&TuiEvent::Paste(" valenciana".into()));
        // Shortcut keys are plain text while renaming
        state.handle_event(&TuiEvent::InputChar('d'));
        state.handle_event(&TuiEvent::Backspace);
        assert_eq!(
            state.handle_event(&TuiEvent::Submit),
            Some(SidebarEvent::Rename {
                id: "a".into(),
                title: "Paella valenciana".into()
            })
        );
        assert!(state.rename_buffer().is_none());
    }

    #[test]
    fn escape_abandons_rename() {
        let mut state = state();
        state.handle_event(&TuiEvent::CursorDown);
        state.handle_event(&TuiEvent::InputChar('r'));
        assert_eq!(state.handle_event(&TuiEvent::Escape), None);
        assert!(state.rename_buffer().is_none());
        assert_eq!(state.handle_event(&TuiEvent::Escape), Some(SidebarEvent::Release));
    }

    #[test]
    fn enter_opens_other_conversations_only() {
        let mut state = state();
        assert_eq!(state.handle_event(&TuiEvent::Submit), None);
        state.handle_event(&TuiEvent::CursorDown);
        state.handle_event(&TuiEvent::CursorDown);
        assert_eq!(
            state.handle_event(&TuiEvent::Submit),
            Some(SidebarEvent::Open("b".into()))
        );
    }

    #[test]
    fn refresh_keeps_cursor_on_same_conversation() {
        let mut state = state();
        state.handle_event(&TuiEvent::CursorDown);
        state.handle_event(&TuiEvent::CursorDown);
        // Placeholder confirmed and moved down the list
        state.set_rows(vec![
            row("id-new", "Pollo al horno", true, false),
            row("a", "Paella", false, false),
            row("b", "Gazpacho", false, false),
        ]);
        assert_eq!(state.selected_row().unwrap().id, "b");

        state.set_rows(vec![row("id-new", "Pollo al horno", true, false)]);
        assert_eq!(state.selected_row().unwrap().id, "id-new");
    }

    #[test]
    fn truncation_respects_display_width() {
        assert_eq!(truncate_to_width("Paella", 10), "Paella");
        assert_eq!(truncate_to_width("Pollo al horno", 6), "Pollo…");
        assert_eq!(truncate_to_width("🍳🍳🍳", 4), "🍳…");
        assert_eq!(truncate_to_width("abc", 0), "");
    }
}
