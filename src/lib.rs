//! Galley: a terminal client for a recipe-assistant chat service.
//!
//! - [`backend`]: the HTTP service behind a [`backend::Backend`] trait
//! - [`core`]: conversations, streaming, titles and the persisted session
//! - [`tui`]: the ratatui front end

pub mod backend;
pub mod core;
pub mod tui;

#[cfg(test)]
mod test_support;
