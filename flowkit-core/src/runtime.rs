//! Host-side driver for a single component instance.
//!
//! The platform's orchestrator wires many components together; this module
//! is the per-component slice of that work, shared by hosts and tests:
//! inject environmental payloads, deliver settings, start the background
//! loop, route messages in, and collect what the component emits. Reconcile
//! requests are intercepted and surfaced as a flag instead of being
//! forwarded, mirroring how a host re-reads the port surface.

use crate::component::{Component, Handler, Runnable, handler_fn};
use crate::error::Result;
use crate::message::{GraphNode, Message, PlatformClient};
use crate::port::{CLIENT_PORT, NODE_PORT, RECONCILE_PORT, SETTINGS_PORT};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One message emitted by the driven component.
#[derive(Debug)]
pub struct Emission {
    /// The port the component emitted on.
    pub port: String,
    /// The emitted payload.
    pub message: Message,
}

/// Drives one component instance through its lifecycle.
pub struct ComponentRuntime {
    component: Arc<dyn Component>,
    handler: Handler,
    outputs: mpsc::UnboundedReceiver<Emission>,
    reconcile_requested: Arc<AtomicBool>,
    ctx: CancellationToken,
    run_task: Option<JoinHandle<Result<()>>>,
}

impl ComponentRuntime {
    /// Wrap a freshly instantiated component.
    pub fn new(component: Box<dyn Component>) -> Self {
        let (tx, outputs) = mpsc::unbounded_channel();
        let reconcile_requested = Arc::new(AtomicBool::new(false));

        let reconcile = Arc::clone(&reconcile_requested);
        let handler = handler_fn(move |port, message| {
            let tx = tx.clone();
            let reconcile = Arc::clone(&reconcile);
            async move {
                if port == RECONCILE_PORT {
                    reconcile.store(true, Ordering::SeqCst);
                    return Ok(());
                }
                // the component outlives any one receiver; a closed
                // channel just means nobody is listening anymore
                let _ = tx.send(Emission { port, message });
                Ok(())
            }
        });

        Self {
            component: Arc::from(component),
            handler,
            outputs,
            reconcile_requested,
            ctx: CancellationToken::new(),
            run_task: None,
        }
    }

    /// The driven component.
    pub fn component(&self) -> &dyn Component {
        self.component.as_ref()
    }

    /// The component's current port surface.
    pub fn ports(&self) -> Vec<crate::port::Port> {
        self.component.ports()
    }

    /// Inject the graph-node identity, if the component declares the port.
    pub async fn set_node(&self, node: GraphNode) -> Result<()> {
        self.deliver(NODE_PORT, Message::Node(node)).await
    }

    /// Inject a platform client, if the component declares the port.
    pub async fn set_client(&self, client: Arc<dyn PlatformClient>) -> Result<()> {
        self.deliver(CLIENT_PORT, Message::Client(client)).await
    }

    /// Deliver a settings payload.
    pub async fn configure<T: Serialize>(&self, settings: &T) -> Result<()> {
        self.deliver(SETTINGS_PORT, Message::encode(settings)?).await
    }

    /// Deliver a message to a port.
    pub async fn deliver(&self, port: &str, msg: Message) -> Result<()> {
        self.component
            .handle(self.ctx.clone(), self.handler.clone(), port, msg)
            .await
    }

    /// Start the component's background loop, if it has one.
    ///
    /// Returns whether a loop was started. Call once; the loop ends when
    /// [`shutdown`] cancels the run context.
    ///
    /// [`shutdown`]: ComponentRuntime::shutdown
    pub fn start(&mut self) -> bool {
        if self.run_task.is_some() || self.component.as_runnable().is_none() {
            return false;
        }
        let component = Arc::clone(&self.component);
        let ctx = self.ctx.clone();
        let handler = self.handler.clone();
        self.run_task = Some(tokio::spawn(async move {
            match component.as_runnable() {
                Some(runnable) => runnable.run(ctx, handler).await,
                None => Ok(()),
            }
        }));
        true
    }

    /// Receive the next emission, waiting for it.
    pub async fn recv(&mut self) -> Option<Emission> {
        self.outputs.recv().await
    }

    /// Receive the next emission if one is already queued.
    pub fn try_recv(&mut self) -> Option<Emission> {
        self.outputs.try_recv().ok()
    }

    /// Whether the component asked for its port surface to be re-read
    /// since the last call. Reading clears the flag.
    pub fn take_reconcile_request(&self) -> bool {
        self.reconcile_requested.swap(false, Ordering::SeqCst)
    }

    /// Cancel the run context and wait for the background loop to return.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.ctx.cancel();
        if let Some(task) = self.run_task.take() {
            match task.await {
                Ok(result) => result?,
                Err(join_error) => {
                    tracing::error!(%join_error, "component run task failed");
                }
            }
        }
        Ok(())
    }
}
