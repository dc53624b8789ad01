//! # Herald
//!
//! Command-dispatch and aggregation core of a messaging automation agent:
//! - Domain: events, collaborator traits, configuration and errors
//! - Application: pattern compiler, registry, rate limiter, aggregation scheduler, dispatcher
//! - Infrastructure: cache backends, console adapter, logging
//! - Interface: built-in command handlers
//!

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interface;
pub mod strings;
