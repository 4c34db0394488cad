//! # TitleBar Component
//!
//! One-row header: who is signed in, which conversation is open, and the
//! latest status line. Stateless; everything arrives as props.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::component::Component;

const SPINNER: [&str; 4] = ["◐", "◓", "◑", "◒"];

pub struct TitleBar<'a> {
    pub display_name: &'a str,
    pub conversation: Option<&'a str>,
    pub status: Option<&'a str>,
    pub busy: bool,
    pub spinner_frame: usize,
}

impl TitleBar<'_> {
    fn line(&self) -> Line<'static> {
        let mut spans = vec![
            Span::styled(
                "🍳 Galley",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(" · {}", self.display_name)),
        ];
        if let Some(title) = self.conversation {
            spans.push(Span::styled(
                format!(" · {title}"),
                Style::default().fg(Color::Gray),
            ));
        }
        if self.busy {
            let frame = SPINNER[self.spinner_frame % SPINNER.len()];
            spans.push(Span::styled(format!(" {frame}"), Style::default().fg(Color::Yellow)));
        }
        if let Some(status) = self.status {
            spans.push(Span::styled(
                format!(" | {status}"),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ));
        }
        Line::from(spans)
    }
}

impl Component for TitleBar<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(Paragraph::new(self.line()), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(bar: &TitleBar<'_>) -> String {
        bar.line().spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn shows_name_and_conversation() {
        let bar = TitleBar {
            display_name: "Ana",
            conversation: Some("Paella"),
            status: None,
            busy: false,
            spinner_frame: 0,
        };
        assert_eq!(text(&bar), "🍳 Galley · Ana · Paella");
    }

    #[test]
    fn busy_and_status_are_appended() {
        let bar = TitleBar {
            display_name: "Ana",
            conversation: None,
            status: Some("sin conexión"),
            busy: true,
            spinner_frame: 5,
        };
        assert_eq!(text(&bar), "🍳 Galley · Ana ◓ | sin conexión");
    }
}
