//! # Interface Layer
//!
//! Handlers exposed to users through the dispatcher.

pub mod commands;
