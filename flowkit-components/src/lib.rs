//! Standard component library for flowkit.
//!
//! This crate provides the built-in components a host registers at startup:
//!
//! ## Common (`common::*`)
//! - [`common::Scheduler`] - Time-indexed task queue with at-most-one
//!   schedule per ID and state snapshots
//! - [`common::Router`] - Condition-ordered routing with a dynamic port set
//! - [`common::Mixer`] - Latest-value combiner with a settings-driven input
//!   list and composed output schema
//! - [`common::Signal`] - Emit a configured context on start or on demand
//! - [`common::Modify`] - One-in, one-out record rewrite
//! - [`common::Async`] - Detached passthrough
//! - [`common::Delay`] - Hold messages for a configured time
//! - [`common::Debug`] - Terminal sink with a dashboard view
//! - [`common::Ticker`] - Periodic emission
//!
//! ## Array (`array::*`)
//! - [`array::Split`] - Fan an array out into individual messages
//!
//! ## HTTP (`http::*`)
//! - [`http::HttpServer`] - Request/response correlation through the graph
//! - [`http::HttpClient`] - Outbound HTTP requests

pub mod array;
pub mod common;
pub mod http;

use flowkit_core::prelude::*;

/// Register every built-in component.
///
/// A host calls this once at startup; see
/// [`ComponentRegistry::register`] for the conflict semantics.
pub fn register_all(registry: &mut ComponentRegistry) -> Result<()> {
    registry.register::<common::Scheduler>()?;
    registry.register::<common::Router>()?;
    registry.register::<common::Mixer>()?;
    registry.register::<common::Signal>()?;
    registry.register::<common::Modify>()?;
    registry.register::<common::Async>()?;
    registry.register::<common::Delay>()?;
    registry.register::<common::Debug>()?;
    registry.register::<common::Ticker>()?;
    registry.register::<array::Split>()?;
    registry.register::<http::HttpServer>()?;
    registry.register::<http::HttpClient>()?;
    Ok(())
}
