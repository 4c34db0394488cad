use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Text;
use ratatui::widgets::{Block, BorderType, Padding, Paragraph, Widget, Wrap};

use crate::core::transcript::Sender;
use crate::tui::component::Component;
use crate::tui::markdown::REPLY_FG;

/// Horizontal padding (per side) between the border and text content.
const CONTENT_PAD_H: u16 = 1;
/// Borders (1 left + 1 right) plus padding.
const HORIZONTAL_OVERHEAD: u16 = 2 + CONTENT_PAD_H * 2;
/// Borders (1 top + 1 bottom).
const VERTICAL_OVERHEAD: u16 = 2;

/// One bubble in the transcript.
///
/// Transient: built each frame from a borrowed body. Assistant bodies arrive
/// already styled by the reply formatter; user and error bodies are plain
/// text and take the sender color here.
#[derive(Clone, Copy)]
pub struct MessageCard<'a> {
    pub sender: Sender,
    pub body: &'a Text<'static>,
    /// The reply is still streaming in.
    pub streaming: bool,
}

impl<'a> MessageCard<'a> {
    pub fn new(sender: Sender, body: &'a Text<'static>) -> Self {
        Self {
            sender,
            body,
            streaming: false,
        }
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Rows the card occupies at `width`, borders included.
    ///
    /// Counts through the same `Paragraph` wrapping used to draw, so the
    /// scroll canvas matches what ends up on screen.
    pub fn calculate_height(body: &Text<'static>, width: u16) -> u16 {
        let content_width = width.saturating_sub(HORIZONTAL_OVERHEAD);
        if content_width == 0 {
            return 1;
        }
        if body.lines.iter().all(|l| l.width() == 0) {
            return VERTICAL_OVERHEAD + 1;
        }
        let lines = paragraph(body).line_count(content_width);
        u16::try_from(lines).unwrap_or(u16::MAX).max(1) + VERTICAL_OVERHEAD
    }
}

fn paragraph(body: &Text<'static>) -> Paragraph<'static> {
    Paragraph::new(body.clone()).wrap(Wrap { trim: false })
}

fn sender_style(sender: Sender) -> Style {
    match sender {
        Sender::User => Style::default().fg(Color::Green),
        Sender::Assistant => Style::default().fg(REPLY_FG),
        Sender::Error => Style::default().fg(Color::Red),
    }
}

fn sender_label(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "tú",
        Sender::Assistant => "chef",
        Sender::Error => "error",
    }
}

impl Widget for MessageCard<'_> {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        let style = sender_style(self.sender);
        let border_style = if self.streaming {
            style.add_modifier(Modifier::BOLD)
        } else {
            style.add_modifier(Modifier::DIM)
        };

        let block = Block::bordered()
            .title(sender_label(self.sender))
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title_style(border_style)
            .padding(Padding::horizontal(CONTENT_PAD_H));
        let inner = block.inner(area);
        block.render(area, buf);

        paragraph(self.body).style(style).render(inner, buf);
    }
}

impl Component for MessageCard<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(*self, area);
    }
}
