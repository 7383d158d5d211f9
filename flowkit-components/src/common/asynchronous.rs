//! Async component (detached one-in, one-out passthrough).
//!
//! Accepts a message and emits it from a spawned task, returning to the
//! host immediately. Useful for decoupling a slow downstream branch from
//! the submitting side of the graph.

use flowkit_core::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Component name.
pub const ASYNC_COMPONENT: &str = "common_async";
/// Input port.
pub const ASYNC_IN_PORT: &str = "in";
/// Output port.
pub const ASYNC_OUT_PORT: &str = "out";

/// Payload of the `in` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AsyncInMessage {
    /// Arbitrary message to be passed on.
    #[schemars(
        title = "Context",
        description = "Arbitrary message to be passed on",
        extend("configurable" = true)
    )]
    #[serde(default)]
    pub context: Value,
}

/// Payload of the `out` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AsyncOutMessage {
    /// The forwarded message.
    #[serde(default)]
    pub context: Value,
}

/// The async component.
#[derive(Default)]
pub struct Async;

impl Component for Async {
    fn info(&self) -> ComponentInfo {
        ComponentInfo::new(ASYNC_COMPONENT)
            .with_description("Async")
            .with_info("Asynchronously sends a new message after an incoming message is received")
            .with_tags(&["SDK"])
    }

    fn instance(&self) -> Box<dyn Component> {
        Box::new(Self)
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::source(ASYNC_IN_PORT, "In")
                .with_position(PortPosition::Left)
                .with_config(&AsyncInMessage::default()),
            Port::sink(ASYNC_OUT_PORT, "Out")
                .with_position(PortPosition::Right)
                .with_config(&AsyncOutMessage::default()),
        ]
    }

    fn handle<'a>(
        &'a self,
        _ctx: CancellationToken,
        handler: Handler,
        port: &'a str,
        msg: Message,
    ) -> ComponentFuture<'a> {
        Box::pin(async move {
            if port != ASYNC_IN_PORT {
                return Err(FlowError::unknown_port(port));
            }
            let input: AsyncInMessage = msg.decode(port)?;
            let out = Message::encode(&AsyncOutMessage {
                context: input.context,
            })?;
            tokio::spawn(async move {
                // the submitting caller is long gone; a rejection only gets logged
                if let Err(error) = handler(ASYNC_OUT_PORT, out).await {
                    tracing::warn!(component = ASYNC_COMPONENT, %error, "detached send rejected");
                }
            });
            Ok(())
        })
    }
}
