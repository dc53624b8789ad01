//! # Domain Layer
//!
//! Core definitions, types, and traits that define the business domain of the agent.
//! Independent of any specific messaging platform, serving as the contract for the other layers.

pub mod config;
pub mod error;
pub mod event;
pub mod traits;
