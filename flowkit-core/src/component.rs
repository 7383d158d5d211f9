//! Component trait and related types.
//!
//! A component is a self-describing unit in a dataflow graph: it exposes
//! metadata, a set of typed ports, and reacts to messages delivered by the
//! host. Outbound traffic goes through the [`Handler`] callback the host
//! supplies with every delivery.

use crate::error::Result;
use crate::message::Message;
use crate::port::Port;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A boxed future for async component operations.
pub type ComponentFuture<'a, T = ()> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The future returned by a [`Handler`] invocation.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// The emit-callback a component is given with each delivery.
///
/// Calling it routes an outbound `(port, payload)` into the graph. Calling
/// it with [`crate::port::RECONCILE_PORT`] and an empty payload asks the
/// host to re-read the component's port surface.
pub type Handler = Arc<dyn Fn(&str, Message) -> HandlerFuture + Send + Sync>;

/// Static descriptor of a component type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Unique component name (the registry key).
    pub name: String,
    /// Short human description.
    pub description: String,
    /// Longer explanatory text for UIs.
    pub info: String,
    /// Tag set for catalog grouping.
    pub tags: Vec<String>,
}

impl ComponentInfo {
    /// Create a descriptor with the given unique name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the short description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the explanatory text.
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    /// Set the tag list.
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| (*t).to_string()).collect();
        self
    }
}

/// The core trait every flow-graph component implements.
///
/// The host obtains a prototype from the registry, calls [`instance`] for a
/// working copy, learns the port surface from [`ports`], and delivers
/// messages through [`handle`]. `ports` may depend on current settings and
/// must stay cheap: the host re-reads it whenever the component asks for a
/// reconcile.
///
/// Concurrent `handle` calls on one instance are allowed; components guard
/// their own mutable state.
///
/// [`instance`]: Component::instance
/// [`ports`]: Component::ports
/// [`handle`]: Component::handle
pub trait Component: Send + Sync {
    /// Get metadata about this component. Pure and stable for the process.
    fn info(&self) -> ComponentInfo;

    /// Create a fresh, independent instance. Prior state must not leak.
    fn instance(&self) -> Box<dyn Component>;

    /// The current port surface, in display order.
    fn ports(&self) -> Vec<Port>;

    /// React to a message delivered on `port`.
    ///
    /// Returns once the message is fully processed. Components whose
    /// contract is "runs inline" (the HTTP server's `start`) block here
    /// until the work is stopped or `ctx` is cancelled.
    fn handle<'a>(
        &'a self,
        ctx: CancellationToken,
        handler: Handler,
        port: &'a str,
        msg: Message,
    ) -> ComponentFuture<'a>;

    /// Access the background-loop capability, if this component has one.
    fn as_runnable(&self) -> Option<&dyn Runnable> {
        None
    }

    /// Access the state-snapshot capability, if this component has one.
    fn as_stateful(&self) -> Option<&dyn Stateful> {
        None
    }
}

/// Optional capability: a long-running background loop.
pub trait Runnable: Component {
    /// Run until `ctx` is cancelled. The host calls this once after
    /// initialization; the method must return promptly on cancellation.
    fn run<'a>(&'a self, ctx: CancellationToken, handler: Handler) -> ComponentFuture<'a>;
}

/// Optional capability: snapshot and restore component-internal state.
pub trait Stateful: Component {
    /// Serialize the component's internal state.
    fn state(&self) -> Result<Vec<u8>>;

    /// Replace the component's internal state from a snapshot.
    fn set_state(&self, state: &[u8]) -> Result<()>;
}

/// Build a handler from a closure over `(port, payload)`.
///
/// Convenience for hosts and tests; the closure receives an owned port name
/// so the returned future can be `'static`.
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(String, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |port, msg| -> HandlerFuture { Box::pin(f(port.to_string(), msg)) })
}

/// A handler that accepts and discards everything.
pub fn noop_handler() -> Handler {
    handler_fn(|_, _| async { Ok(()) })
}
