//! Prelude for convenient imports.
//!
//! This module re-exports the most commonly used types and traits.
//!
//! # Example
//!
//! ```ignore
//! use flowkit_core::prelude::*;
//! ```

// Error handling
pub use crate::error::{FlowError, Result};

// Component contract
pub use crate::component::{
    Component, ComponentFuture, ComponentInfo, Handler, HandlerFuture, Runnable, Stateful,
    handler_fn, noop_handler,
};

// Messages and host-injected payloads
pub use crate::message::{
    GraphNode, LocalClient, Message, PlatformClient, SUGGESTED_HTTP_PORT_ANNOTATION,
};

// Ports
pub use crate::port::{
    CLIENT_PORT, CONTROL_PORT, NODE_PORT, Port, PortPosition, RECONCILE_PORT, RESERVED_PORTS,
    SETTINGS_PORT, STATUS_PORT,
};

// Registry
pub use crate::registry::ComponentRegistry;

// Host-side driver
pub use crate::runtime::{ComponentRuntime, Emission};

// Cancellation context used across the contract
pub use tokio_util::sync::CancellationToken;
