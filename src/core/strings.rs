//! User-visible text.
//!
//! The service answers in Spanish by default, so Spanish is the default
//! language. Everything the user reads in the transcript or sidebar comes
//! from here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Es,
    En,
}

impl Language {
    /// Parses `es`, `en`, or a locale like `en_US.UTF-8`.
    pub fn parse(value: &str) -> Option<Self> {
        let lower = value.trim().to_ascii_lowercase();
        if lower.starts_with("es") {
            Some(Language::Es)
        } else if lower.starts_with("en") {
            Some(Language::En)
        } else {
            None
        }
    }

    pub fn welcome_new(self, name: &str) -> String {
        match self {
            Language::Es => format!("👋 ¡Hola {name}! Iniciando una nueva obra maestra."),
            Language::En => format!("👋 Hi {name}! Starting a new masterpiece."),
        }
    }

    pub fn welcome_back(self, name: &str) -> String {
        match self {
            Language::Es => {
                format!("👋 ¡Hola {name}! Conversación cargada. ¿Continuamos con esta receta?")
            }
            Language::En => format!("👋 Hi {name}! Conversation loaded. Shall we continue with this recipe?"),
        }
    }

    /// Sidebar label for the conversation the server has not seen yet.
    pub fn unsaved_label(self) -> &'static str {
        match self {
            Language::Es => "(Nueva Receta)",
            Language::En => "(New recipe)",
        }
    }

    /// Title used when nothing usable can be extracted from a message.
    pub fn default_title(self) -> &'static str {
        match self {
            Language::Es => "Nueva receta",
            Language::En => "New recipe",
        }
    }

    pub fn guest_name(self) -> &'static str {
        match self {
            Language::Es => "Chef Invitado",
            Language::En => "Guest Chef",
        }
    }

    pub fn session_expired(self) -> &'static str {
        match self {
            Language::Es => "Tu sesión ha expirado. Vuelve a iniciar sesión con `galley login`.",
            Language::En => "Your session has expired. Log in again with `galley login`.",
        }
    }

    pub fn logged_in(self, name: &str) -> String {
        match self {
            Language::Es => format!("✅ Sesión iniciada como {name}. Abre el chat con `galley`."),
            Language::En => format!("✅ Logged in as {name}. Open the chat with `galley`."),
        }
    }

    pub fn logged_out(self) -> &'static str {
        match self {
            Language::Es => "👋 Sesión cerrada. ¡Hasta la próxima receta!",
            Language::En => "👋 Logged out. Until the next recipe!",
        }
    }

    pub fn not_logged_in(self) -> &'static str {
        match self {
            Language::Es => "No has iniciado sesión. Usa `galley login` o `galley register`.",
            Language::En => "You are not logged in. Use `galley login` or `galley register`.",
        }
    }

    pub fn connection_error(self, detail: &str) -> String {
        match self {
            Language::Es => format!("❌ Error de conexión: {detail}."),
            Language::En => format!("❌ Connection error: {detail}."),
        }
    }

    pub fn history_error(self, detail: &str) -> String {
        match self {
            Language::Es => format!("❌ No se pudo cargar la conversación: {detail}."),
            Language::En => format!("❌ Could not load the conversation: {detail}."),
        }
    }

    pub fn delete_error(self, detail: &str) -> String {
        match self {
            Language::Es => format!("❌ No se pudo eliminar la conversación: {detail}."),
            Language::En => format!("❌ Could not delete the conversation: {detail}."),
        }
    }

    pub fn thinking(self) -> &'static str {
        match self {
            Language::Es => "🤖 Pensando en una receta...",
            Language::En => "🤖 Thinking of a recipe...",
        }
    }

    pub fn empty_list(self) -> &'static str {
        match self {
            Language::Es => "Aún no hay conversaciones guardadas.",
            Language::En => "No saved conversations yet.",
        }
    }

    pub fn confirm_delete(self) -> &'static str {
        match self {
            Language::Es => "¿Eliminar? Pulsa d otra vez",
            Language::En => "Delete? Press d again",
        }
    }

    pub fn empty_message(self) -> &'static str {
        match self {
            Language::Es => "Escribe un mensaje antes de enviar.",
            Language::En => "Type a message before sending.",
        }
    }

    pub fn input_placeholder(self) -> &'static str {
        match self {
            Language::Es => "Escribe tu mensaje o pega tu receta...",
            Language::En => "Type your message or paste your recipe...",
        }
    }

    pub fn sidebar_title(self) -> &'static str {
        match self {
            Language::Es => " Recetas ",
            Language::En => " Recipes ",
        }
    }

    pub fn sidebar_help(self) -> &'static str {
        match self {
            Language::Es => " n nueva  r renombrar  d borrar ",
            Language::En => " n new  r rename  d delete ",
        }
    }

    pub fn rename_help(self) -> &'static str {
        match self {
            Language::Es => " Enter guardar  Esc cancelar ",
            Language::En => " Enter save  Esc cancel ",
        }
    }

    pub fn busy(self) -> &'static str {
        match self {
            Language::Es => "Espera a que termine la respuesta.",
            Language::En => "Wait for the current reply to finish.",
        }
    }

    pub fn attached(self, name: &str) -> String {
        match self {
            Language::Es => format!("📎 Imagen adjunta: {name}"),
            Language::En => format!("📎 Image attached: {name}"),
        }
    }

    pub fn attach_error(self, detail: &str) -> String {
        match self {
            Language::Es => format!("No se pudo adjuntar la imagen: {detail}"),
            Language::En => format!("Could not attach the image: {detail}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_locales() {
        assert_eq!(Language::parse("es"), Some(Language::Es));
        assert_eq!(Language::parse("en_US.UTF-8"), Some(Language::En));
        assert_eq!(Language::parse("ES-mx"), Some(Language::Es));
        assert_eq!(Language::parse("fr"), None);
    }

    #[test]
    fn welcome_uses_display_name() {
        assert_eq!(
            Language::Es.welcome_new("Ana"),
            "👋 ¡Hola Ana! Iniciando una nueva obra maestra."
        );
        assert!(Language::En.welcome_back("Ana").contains("Ana"));
    }

    #[test]
    fn serde_names_are_lowercase() {
        let lang: Language = serde_json::from_str("\"en\"").unwrap();
        assert_eq!(lang, Language::En);
    }
}
