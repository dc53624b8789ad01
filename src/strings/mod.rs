//! # Strings Module
//!
//! Centralizes user-facing strings, log lines and help text.
//! Keeps handler code free of presentation details.

pub mod help;
pub mod logs;
pub mod messages;
