//! # Application Layer
//!
//! Contains the dispatch core of the agent.
//! This includes pattern compilation, the handler registry, rate limiting,
//! access control, the aggregation scheduler and the dispatcher that ties them together.

pub mod aggregator;
pub mod auth;
pub mod dispatcher;
pub mod handler;
pub mod pattern;
pub mod rate_limit;
pub mod registry;

#[cfg(test)]
pub mod testing;
