//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//! - [`render`] - Indented BOM tree reports
//!
//! # Design
//!
//! Results a user asked for (tree reports, run summaries) print through
//! this module; diagnostics go to the tracing subscriber instead. The
//! split keeps command output stable under different log levels.

pub mod output;
pub mod render;
