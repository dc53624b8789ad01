//! # Infrastructure Layer
//!
//! Handles interactions with external systems and services.
//! Implements the traits defined in the Domain layer (Cache, EventSource, ActionSink).

pub mod cache;
pub mod console;
pub mod logging;
