//! Delay component (sleep before passing messages on).

use flowkit_core::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Component name.
pub const DELAY_COMPONENT: &str = "delay";
/// Input port.
pub const DELAY_IN_PORT: &str = "in";
/// Output port.
pub const DELAY_OUT_PORT: &str = "out";

/// Payload of the `in` port.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DelayInMessage {
    /// Arbitrary message to be delayed.
    #[schemars(
        title = "Context",
        description = "Arbitrary message to be delayed",
        extend("configurable" = true, "propertyOrder" = 1)
    )]
    #[serde(default)]
    pub context: Value,
    /// How long to hold the message, in milliseconds.
    #[schemars(title = "Delay (ms)", extend("propertyOrder" = 2))]
    pub delay: i64,
}

impl Default for DelayInMessage {
    fn default() -> Self {
        Self {
            context: Value::Null,
            delay: 1000,
        }
    }
}

/// Payload of the `out` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DelayOutMessage {
    /// The delay that was applied, in milliseconds.
    pub delay: i64,
    /// The delayed message.
    #[serde(default)]
    pub context: Value,
}

/// The delay component.
#[derive(Default)]
pub struct Delay;

impl Component for Delay {
    fn info(&self) -> ComponentInfo {
        ComponentInfo::new(DELAY_COMPONENT)
            .with_description("Delay")
            .with_info("Sleeps before passing incoming messages further")
            .with_tags(&["SDK"])
    }

    fn instance(&self) -> Box<dyn Component> {
        Box::new(Self)
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::source(DELAY_IN_PORT, "In")
                .with_position(PortPosition::Left)
                .with_config(&DelayInMessage::default()),
            Port::sink(DELAY_OUT_PORT, "Out")
                .with_position(PortPosition::Right)
                .with_config(&DelayOutMessage::default()),
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
            if port != DELAY_IN_PORT {
                return Err(FlowError::unknown_port(port));
            }
            let input: DelayInMessage = msg.decode(port)?;
            if input.delay <= 0 {
                return Err(FlowError::InvalidConfiguration {
                    field: "delay".to_string(),
                    cause: "delay must be a positive number of milliseconds".to_string(),
                });
            }

            tokio::time::sleep(Duration::from_millis(input.delay as u64)).await;

            let out = DelayOutMessage {
                delay: input.delay,
                context: input.context,
            };
            handler(DELAY_OUT_PORT, Message::encode(&out)?).await
        })
    }
}
