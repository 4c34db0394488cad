//! # TUI Components
//!
//! Two kinds of components live here:
//!
//! - **Stateless** (props only, rebuilt every frame): `TitleBar`, `MessageCard`.
//! - **Stateful** (persistent state in `TuiState`, transient render wrapper):
//!   `TranscriptState`/`TranscriptView`, `SidebarState`/`Sidebar`, and
//!   `InputBox`, which keeps its own buffer.
//!
//! Stateful components implement [`EventHandler`](super::component::EventHandler)
//! and emit high-level events (`SidebarEvent`, `InputEvent`) that the event
//! loop maps to conversation commands.
//!
//! ```text
//! components/
//! ├── mod.rs
//! ├── title_bar.rs     (user, conversation, status)
//! ├── transcript.rs    (scrolling list + in-flight reply)
//! ├── message.rs       (one bordered message card)
//! ├── sidebar.rs       (conversation list, rename, delete)
//! └── input_box.rs     (composer + slash commands)
//! ```

pub mod input_box;
pub mod message;
pub mod sidebar;
pub mod title_bar;
pub mod transcript;

pub use input_box::{InputBox, InputEvent, Submission};
pub use sidebar::{Sidebar, SidebarEvent, SidebarState};
pub use title_bar::TitleBar;
pub use transcript::{TranscriptState, TranscriptView};
