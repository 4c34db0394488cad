//! # Core Application Logic
//!
//! This module contains Galley's business logic.
//! It knows nothing about any specific UI technology.
//!
//! ```text
//!                    ┌─────────────────────────────┐
//!                    │            CORE             │
//!                    │                             │
//!                    │  • ConversationManager      │
//!                    │  • StreamRenderer           │
//!                    │  • TitleResolver            │
//!                    │  • SessionStore             │
//!                    └──────┬───────────────┬──────┘
//!                           │               │
//!            ConversationView (trait)   Backend (trait)
//!                           │               │
//!                    ┌──────▼─────┐   ┌─────▼──────┐
//!                    │    TUI     │   │    HTTP    │
//!                    │ (ratatui)  │   │ (reqwest)  │
//!                    └────────────┘   └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`manager`]: conversation lifecycle, sidebar reconciliation, the exchange pipeline
//! - [`stream`]: throttled incremental rendering of a streamed reply
//! - [`title`]: remote title suggestion with a local heuristic fallback
//! - [`session`]: the persisted session (credential, active id, transcript snapshot)
//! - [`transcript`]: messages of the active conversation
//! - [`auth`]: login, registration and logout
//! - [`config`]: `~/.galley/config.toml` and its resolution
//! - [`strings`]: user-visible text per language

pub mod auth;
pub mod config;
pub mod manager;
pub mod session;
pub mod stream;
pub mod strings;
pub mod title;
pub mod transcript;

pub use manager::{Command, ConversationManager, ConversationView, ManagerError};
pub use session::SessionStore;
pub use strings::Language;
