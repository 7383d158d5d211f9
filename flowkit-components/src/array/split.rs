//! Array split component (fan an array out into individual messages).

use flowkit_core::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Component name.
pub const SPLIT_COMPONENT: &str = "split";
/// Input port.
pub const SPLIT_IN_PORT: &str = "in";
/// Output port.
pub const SPLIT_OUT_PORT: &str = "out";

/// Payload of the `in` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SplitInMessage {
    /// Message sent along with every item.
    #[schemars(
        title = "Context",
        description = "Message to be sent further with each item",
        extend("configurable" = true)
    )]
    #[serde(default)]
    pub context: Value,
    /// The items to fan out.
    #[schemars(title = "Array", description = "Array of items to be split")]
    pub array: Vec<Value>,
}

/// Payload of the `out` port, one per item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SplitOutMessage {
    /// The shared context.
    #[serde(default)]
    pub context: Value,
    /// One item of the input array.
    #[serde(default)]
    pub item: Value,
}

/// The split component.
#[derive(Default)]
pub struct Split;

impl Component for Split {
    fn info(&self) -> ComponentInfo {
        ComponentInfo::new(SPLIT_COMPONENT)
            .with_description("Array split")
            .with_info("Splits an array and sends each item further as a separate message")
            .with_tags(&["SDK", "ARRAY"])
    }

    fn instance(&self) -> Box<dyn Component> {
        Box::new(Self)
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::source(SPLIT_IN_PORT, "In")
                .with_position(PortPosition::Left)
                .with_config(&SplitInMessage::default()),
            Port::sink(SPLIT_OUT_PORT, "Out")
                .with_position(PortPosition::Right)
                .with_config(&SplitOutMessage::default()),
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
            if port != SPLIT_IN_PORT {
                return Err(FlowError::unknown_port(port));
            }
            let input: SplitInMessage = msg.decode(port)?;
            for item in input.array {
                let out = SplitOutMessage {
                    context: input.context.clone(),
                    item,
                };
                handler(SPLIT_OUT_PORT, Message::encode(&out)?).await?;
            }
            Ok(())
        })
    }
}
