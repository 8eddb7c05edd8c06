//! Open documents and the process-wide state they share.
//!
//! - [`workspace::Workspace`] owns the configuration and the single scratch
//!   store all edits are appended to.
//! - [`document::Document`] binds a [`editor_core::text::TextBuffer`] to a
//!   path and handles saving it back atomically.

pub mod config;
pub mod document;
pub mod errors;
pub mod workspace;
