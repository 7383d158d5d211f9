//! flowkit core library
//!
//! This crate provides the contracts shared by every flowkit component:
//! the component trait and its optional capabilities, the port and message
//! model, the JSON Schema surface, and the prototype registry a host uses
//! to instantiate components.
//!
//! # Overview
//!
//! A host orchestrator drives the whole lifecycle: it takes a fresh
//! instance from the [`registry::ComponentRegistry`], injects environmental
//! payloads (`node`, `client`), delivers a `settings` message, starts the
//! background loop of [`component::Runnable`] components, and then routes
//! graph messages through [`Component::handle`]. Outbound traffic flows
//! through the [`component::Handler`] callback; a component asks for its
//! port surface to be re-read by emitting on the reserved `reconcile` port.
//!
//! # Example
//!
//! ```ignore
//! use flowkit_core::prelude::*;
//!
//! let mut registry = ComponentRegistry::new();
//! registry.register::<MyComponent>()?;
//!
//! let component = registry.instance("my_component")?;
//! let ports = component.ports();
//! ```
//!
//! [`Component::handle`]: component::Component::handle

#![warn(missing_docs)]

pub mod component;
pub mod error;
pub mod message;
pub mod port;
pub mod prelude;
pub mod registry;
pub mod runtime;
pub mod schema;

// Re-export key types at crate root for convenience
pub use component::{Component, ComponentInfo, Handler, Runnable, Stateful};
pub use error::{FlowError, Result};
pub use message::{GraphNode, Message, PlatformClient};
pub use port::{Port, PortPosition};
pub use registry::ComponentRegistry;
pub use runtime::ComponentRuntime;
