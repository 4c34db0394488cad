//! Conversation titles.
//!
//! A title is asked from the server once per new conversation. The local
//! [`heuristic_title`] is computed first and stands in whenever the remote
//! suggestion is missing or unusable.

use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;

use crate::backend::Backend;

pub const MAX_TITLE_CHARS: usize = 30;

/// How much of the assistant reply goes into the suggestion request.
pub const SUGGESTION_CONTEXT_CHARS: usize = 800;

static PICTOGRAPHS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{Extended_Pictographic}\u{FE0F}\u{200D}]").expect("pictograph pattern")
});

// Longer phrases come first so alternation prefers them.
static OPENERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:buenos d[ií]as|buenas tardes|buenas noches|buenas|hola|oye|por favor|porfa|ay[uú]dame a|ay[uú]dame|ayuda|me podr[ií]as|podr[ií]as|puedes|quiero que|quiero|necesito que|necesito|good morning|good evening|hello|hi|hey|please|can you|could you|help me|i need|i want)[\s,.!:;]+",
    )
    .expect("opener pattern")
});

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.?!,]").expect("sentence end pattern"));

static TITLE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:t[ií]tulo|title)\s*[:\-]\s*").expect("title label pattern")
});

const QUOTES: &[char] = &['"', '“', '”', '\'', '‘', '’', '«', '»'];

/// Deterministic short title from the opening user message.
///
/// Never empty, at most `MAX_TITLE_CHARS` characters plus an ellipsis.
pub fn heuristic_title(message: &str, default_title: &str) -> String {
    let without_symbols = PICTOGRAPHS.replace_all(message, "");
    let mut text = without_symbols.trim();

    loop {
        text = text.trim_start_matches(|c: char| c == '¡' || c == '¿' || c.is_whitespace());
        match OPENERS.find(text) {
            Some(m) => text = &text[m.end()..],
            None => break,
        }
    }

    if let Some(m) = SENTENCE_END.find(text) {
        text = &text[..m.start()];
    }

    let text = text.trim();
    let text = if text.is_empty() { default_title } else { text };

    // Uppercasing can add characters (ß -> SS), so it happens before the cap
    let text = capitalize(text);
    if text.chars().count() > MAX_TITLE_CHARS {
        let head: String = text.chars().take(MAX_TITLE_CHARS).collect();
        format!("{}…", head.trim_end())
    } else {
        text
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Strips quotes and a leading `Title:` label from a server suggestion.
fn clean_suggestion(raw: &str) -> String {
    let unquoted = raw.trim().trim_matches(QUOTES).trim();
    let unlabeled = TITLE_LABEL.replace(unquoted, "");
    unlabeled.trim().trim_matches(QUOTES).trim().to_string()
}

pub struct TitleResolver {
    default_title: String,
}

impl TitleResolver {
    pub fn new(default_title: impl Into<String>) -> Self {
        Self {
            default_title: default_title.into(),
        }
    }

    pub fn heuristic(&self, user_message: &str) -> String {
        heuristic_title(user_message, &self.default_title)
    }

    /// Prefers the server's suggestion; any failure yields the heuristic title.
    pub async fn resolve(
        &self,
        backend: &dyn Backend,
        credential: Option<&str>,
        user_message: &str,
        assistant_text: &str,
    ) -> String {
        let fallback = self.heuristic(user_message);
        let context: String = assistant_text
            .chars()
            .take(SUGGESTION_CONTEXT_CHARS)
            .collect();

        match backend
            .suggest_title(credential, user_message, &context)
            .await
        {
            Ok(raw) => {
                let clean = clean_suggestion(&raw);
                if clean.is_empty() {
                    debug!("Empty title suggestion, using \"{}\"", fallback);
                    fallback
                } else {
                    debug!("Server suggested title \"{}\"", clean);
                    clean
                }
            }
            Err(e) => {
                warn!("Title suggestion failed, using \"{}\": {}", fallback, e);
                fallback
            }
        }
    }
}
