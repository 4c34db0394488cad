//! Assistant replies as styled ratatui `Text`.
//!
//! Recipes arrive as markdown: headings, ingredient lists, numbered steps,
//! the odd nutrition table and fenced snippets. [`render`] walks the
//! `pulldown_cmark` event stream and builds owned `Line`s; code blocks are
//! highlighted with syntect when the fence names a known language.
//! [`ReplyFormatter`] puts the reply prefix in front and is what the
//! conversation manager re-runs on every throttled redraw.

use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use crate::core::stream::{Formatter, PlainFormatter, REPLY_PREFIX};

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const CODE_THEME: &str = "base16-ocean.dark";

/// Foreground of assistant replies.
pub const REPLY_FG: Color = Color::Yellow;

const FRAME: Style = Style::new().fg(Color::DarkGray);

/// How the in-flight and completed assistant replies are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyFormatter {
    #[default]
    Markdown,
    Plain,
}

impl ReplyFormatter {
    pub fn from_config(markdown: bool) -> Self {
        if markdown {
            ReplyFormatter::Markdown
        } else {
            ReplyFormatter::Plain
        }
    }
}

impl Formatter for ReplyFormatter {
    type Output = Text<'static>;

    fn format(&self, text: &str) -> Text<'static> {
        match self {
            ReplyFormatter::Markdown => with_prefix(render(text, REPLY_FG)),
            ReplyFormatter::Plain => {
                let mut out = Text::from(PlainFormatter.format(text));
                out.lines.iter_mut().for_each(|l| l.style = Style::default().fg(REPLY_FG));
                out
            }
        }
    }
}

fn with_prefix(mut text: Text<'static>) -> Text<'static> {
    let prefix = Span::styled(REPLY_PREFIX, Style::default().fg(REPLY_FG));
    match text.lines.first_mut() {
        Some(first) => first.spans.insert(0, prefix),
        None => text.lines.push(Line::from(prefix)),
    }
    text
}

/// Parse markdown into owned, styled `Text` with `base_fg` as body color.
pub fn render(content: &str, base_fg: Color) -> Text<'static> {
    let opts = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS | Options::ENABLE_TABLES;
    let mut renderer = Renderer::new(base_fg);
    for event in Parser::new_ext(content, opts) {
        renderer.on_event(event);
    }
    renderer.out
}

#[derive(Debug, Clone, Copy)]
enum ListKind {
    Bullet,
    Numbered(u64),
}

enum CodeMode {
    Off,
    Plain,
    Highlighted(Box<HighlightLines<'static>>),
}

struct Renderer {
    out: Text<'static>,
    base_fg: Color,
    /// Inline styles; each entry is already patched onto its parent.
    styles: Vec<Style>,
    /// Repeated at the start of every new line (quote bars, code gutter).
    gutters: Vec<Span<'static>>,
    lists: Vec<ListKind>,
    code: CodeMode,
    pending_link: Option<String>,
    /// Cells emitted so far in the current table row.
    cells: usize,
    /// A blank line goes in before the next block.
    spaced: bool,
}

impl Renderer {
    fn new(base_fg: Color) -> Self {
        Self {
            out: Text::default(),
            base_fg,
            styles: Vec::new(),
            gutters: Vec::new(),
            lists: Vec::new(),
            code: CodeMode::Off,
            pending_link: None,
            cells: 0,
            spaced: false,
        }
    }

    fn current(&self) -> Style {
        self.styles
            .last()
            .copied()
            .unwrap_or_else(|| Style::default().fg(self.base_fg))
    }

    fn enter_style(&mut self, overlay: Style) {
        self.styles.push(self.current().patch(overlay));
    }

    fn leave_style(&mut self) {
        self.styles.pop();
    }

    fn new_line(&mut self, line: Line<'static>) {
        let mut line = line;
        for gutter in self.gutters.iter().rev() {
            line.spans.insert(0, gutter.clone());
        }
        self.out.lines.push(line);
    }

    fn append(&mut self, span: Span<'static>) {
        match self.out.lines.last_mut() {
            Some(line) => line.push_span(span),
            None => self.new_line(Line::from(span)),
        }
    }

    fn start_block(&mut self) {
        if self.spaced {
            self.new_line(Line::default());
            self.spaced = false;
        }
    }

    fn on_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.open(tag),
            Event::End(tag) => self.close(tag),
            Event::Text(text) => self.on_text(text),
            Event::Code(code) => self.append(Span::styled(
                code.to_string(),
                Style::default().fg(Color::White).bg(Color::DarkGray),
            )),
            Event::SoftBreak => self.append(Span::raw(" ")),
            Event::HardBreak => self.new_line(Line::default()),
            Event::Rule => {
                self.start_block();
                self.new_line(Line::from(Span::styled("─".repeat(40), FRAME)));
                self.spaced = true;
            }
            Event::TaskListMarker(done) => {
                self.append(Span::raw(if done { "[x] " } else { "[ ] " }));
            }
            _ => {}
        }
    }

    fn open(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.start_block();
                self.new_line(Line::default());
            }
            Tag::Heading { level, .. } => {
                self.start_block();
                let style = heading_style(self.base_fg, level);
                let marks = "#".repeat(level as usize);
                self.new_line(Line::from(Span::styled(format!("{marks} "), style)));
                self.enter_style(style);
            }
            Tag::BlockQuote(_) => {
                self.start_block();
                self.gutters.push(Span::styled("│ ", FRAME));
                self.enter_style(Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC));
            }
            Tag::CodeBlock(kind) => self.open_code(kind),
            Tag::List(first) => {
                if self.lists.is_empty() {
                    self.start_block();
                }
                self.lists.push(match first {
                    Some(n) => ListKind::Numbered(n),
                    None => ListKind::Bullet,
                });
            }
            Tag::Item => {
                self.new_line(Line::default());
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(ListKind::Numbered(n)) => {
                        let marker = format!("{indent}{n}. ");
                        *n += 1;
                        marker
                    }
                    Some(ListKind::Bullet) => format!("{indent}• "),
                    None => return,
                };
                self.append(Span::styled(marker, FRAME));
            }
            Tag::Table(_) => self.start_block(),
            Tag::TableHead => {
                self.new_line(Line::default());
                self.cells = 0;
                self.enter_style(Style::default().add_modifier(Modifier::BOLD));
            }
            Tag::TableRow => {
                self.new_line(Line::default());
                self.cells = 0;
            }
            Tag::TableCell => {
                if self.cells > 0 {
                    self.append(Span::styled(" │ ", FRAME));
                }
                self.cells += 1;
            }
            Tag::Emphasis => self.enter_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.enter_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.enter_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link { dest_url, .. } => {
                self.pending_link = Some(dest_url.to_string());
                self.enter_style(link_style());
            }
            _ => {}
        }
    }

    fn open_code(&mut self, kind: CodeBlockKind<'_>) {
        if !self.out.lines.is_empty() {
            self.new_line(Line::default());
        }
        self.spaced = false;
        let lang = match &kind {
            CodeBlockKind::Fenced(lang) => lang.trim(),
            CodeBlockKind::Indented => "",
        };
        let top = if lang.is_empty() {
            Line::from(Span::styled("╭──", FRAME))
        } else {
            Line::from(vec![
                Span::styled("╭── ", FRAME),
                Span::styled(lang.to_owned(), FRAME.add_modifier(Modifier::BOLD)),
                Span::styled(" ──", FRAME),
            ])
        };
        self.new_line(top);
        self.gutters.push(Span::styled("│ ", FRAME));

        let syntax = (!lang.is_empty())
            .then(|| SYNTAX_SET.find_syntax_by_token(lang))
            .flatten();
        self.code = match (syntax, THEME_SET.themes.get(CODE_THEME)) {
            (Some(syntax), Some(theme)) => {
                CodeMode::Highlighted(Box::new(HighlightLines::new(syntax, theme)))
            }
            _ => CodeMode::Plain,
        };
    }

    fn close(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.spaced = true,
            TagEnd::Heading(_) => {
                self.leave_style();
                self.spaced = true;
            }
            TagEnd::BlockQuote(_) => {
                self.gutters.pop();
                self.leave_style();
                self.spaced = true;
            }
            TagEnd::CodeBlock => {
                self.code = CodeMode::Off;
                self.gutters.pop();
                self.new_line(Line::from(Span::styled("╰──", FRAME)));
                self.spaced = true;
            }
            TagEnd::List(_) => {
                self.lists.pop();
                self.spaced = true;
            }
            TagEnd::TableHead => {
                self.leave_style();
                self.new_line(Line::from(Span::styled("─".repeat(24), FRAME)));
            }
            TagEnd::Table => self.spaced = true,
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.leave_style(),
            TagEnd::Link => {
                self.leave_style();
                if let Some(url) = self.pending_link.take() {
                    self.append(Span::raw(" ("));
                    self.append(Span::styled(url, link_style()));
                    self.append(Span::raw(")"));
                }
            }
            _ => {}
        }
    }

    fn on_text(&mut self, text: CowStr<'_>) {
        // ratatui draws '\t' with zero width
        let text = text.replace('\t', "    ");

        match std::mem::replace(&mut self.code, CodeMode::Off) {
            CodeMode::Highlighted(mut highlighter) => {
                for line in LinesWithEndings::from(&text) {
                    let Ok(ranges) = highlighter.highlight_line(line, &SYNTAX_SET) else {
                        continue;
                    };
                    let spans: Vec<Span<'static>> = ranges
                        .into_iter()
                        .filter_map(|(style, fragment)| {
                            let fragment = fragment.trim_end_matches('\n');
                            (!fragment.is_empty()).then(|| {
                                let fg = style.foreground;
                                Span::styled(
                                    fragment.to_owned(),
                                    Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b)),
                                )
                            })
                        })
                        .collect();
                    if !spans.is_empty() {
                        self.new_line(Line::from(spans));
                    }
                }
                self.code = CodeMode::Highlighted(highlighter);
            }
            CodeMode::Plain => {
                for line in text.lines() {
                    self.new_line(Line::from(Span::styled(
                        line.to_owned(),
                        Style::default().fg(Color::White),
                    )));
                }
                self.code = CodeMode::Plain;
            }
            CodeMode::Off => {
                let style = self.current();
                self.append(Span::styled(text, style));
            }
        }
    }
}

fn link_style() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::UNDERLINED)
}

fn heading_style(base_fg: Color, level: HeadingLevel) -> Style {
    let modifiers = match level {
        HeadingLevel::H1 => Modifier::BOLD | Modifier::UNDERLINED,
        HeadingLevel::H2 => Modifier::BOLD,
        _ => Modifier::BOLD | Modifier::ITALIC,
    };
    Style::default().fg(base_fg).add_modifier(modifiers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_lines(text: &Text<'_>) -> Vec<String> {
        text.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn heading_text_carries_heading_style() {
        let text = render("## Tortilla de patatas", Color::Blue);
        let line = &text.lines[0];
        assert_eq!(line.spans[0].content, "## ");
        let title = &line.spans[1];
        assert_eq!(title.content, "Tortilla de patatas");
        assert!(title.style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(title.style.fg, Some(Color::Blue));
    }

    #[test]
    fn emphasis_nests() {
        let text = render("Sal ***gruesa*** al final", Color::Blue);
        let span = text.lines[0]
            .spans
            .iter()
            .find(|s| s.content == "gruesa")
            .unwrap();
        assert!(span.style.add_modifier.contains(Modifier::BOLD));
        assert!(span.style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn ingredient_list_and_steps() {
        let text = render("- 2 huevos\n- sal\n\n1. Batir\n2. Freír", Color::Blue);
        let lines = plain_lines(&text);
        assert!(lines.contains(&"• 2 huevos".to_string()), "{lines:?}");
        assert!(lines.contains(&"• sal".to_string()), "{lines:?}");
        assert!(lines.contains(&"1. Batir".to_string()), "{lines:?}");
        assert!(lines.contains(&"2. Freír".to_string()), "{lines:?}");
    }

    #[test]
    fn ordered_list_keeps_its_start() {
        let lines = plain_lines(&render("3. Hornear\n4. Servir", Color::Blue));
        assert_eq!(lines, vec!["3. Hornear", "4. Servir"]);
    }

    #[test]
    fn table_rows_are_separated() {
        let md = "| Nutriente | Cantidad |\n|---|---|\n| Proteína | 20 g |\n";
        let text = render(md, Color::Blue);
        let lines = plain_lines(&text);
        assert_eq!(lines[0], "Nutriente │ Cantidad");
        assert!(lines[1].starts_with('─'));
        assert_eq!(lines[2], "Proteína │ 20 g");
        let header = text.lines[0]
            .spans
            .iter()
            .find(|s| s.content == "Nutriente")
            .unwrap();
        assert!(header.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn code_block_is_framed_and_tabs_expanded() {
        let lines = plain_lines(&render("```\n\thorno 180\n```", Color::Blue));
        assert!(lines[0].starts_with('╭'), "{lines:?}");
        assert_eq!(lines[1], "│     horno 180");
        assert!(lines.last().unwrap().starts_with('╰'));
        assert!(lines.iter().all(|l| !l.contains('\t')));
    }

    #[test]
    fn link_url_follows_text() {
        let lines = plain_lines(&render("[receta](https://example.com)", Color::Blue));
        assert_eq!(lines[0], "receta (https://example.com)");
    }

    #[test]
    fn markdown_formatter_prefixes_first_line() {
        let text = ReplyFormatter::Markdown.format("**Listo**\n\nA comer");
        let lines = plain_lines(&text);
        assert_eq!(lines[0], format!("{REPLY_PREFIX}Listo"));
        assert_eq!(lines.last().unwrap(), "A comer");
    }

    #[test]
    fn empty_reply_still_shows_prefix() {
        for formatter in [ReplyFormatter::Markdown, ReplyFormatter::Plain] {
            let lines = plain_lines(&formatter.format(""));
            assert_eq!(lines, vec![REPLY_PREFIX.to_string()]);
        }
    }

    #[test]
    fn plain_formatter_keeps_markup() {
        let lines = plain_lines(&ReplyFormatter::Plain.format("**a**\nb"));
        assert_eq!(lines, vec![format!("{REPLY_PREFIX}**a**"), "b".to_string()]);
    }
}
