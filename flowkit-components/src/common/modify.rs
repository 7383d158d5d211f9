//! Modify component (one-in, one-out record rewrite).

use flowkit_core::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Component name.
pub const MODIFY_COMPONENT: &str = "common_modify";
/// Input port.
pub const MODIFY_IN_PORT: &str = "in";
/// Output port.
pub const MODIFY_OUT_PORT: &str = "out";

/// Payload of the `in` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModifyInMessage {
    /// Arbitrary message to be modified.
    #[schemars(
        title = "Context",
        description = "Arbitrary message to be modified",
        extend("configurable" = true)
    )]
    #[serde(default)]
    pub context: Value,
}

/// Payload of the `out` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModifyOutMessage {
    /// The rewritten message.
    #[serde(default)]
    pub context: Value,
}

/// The modify component.
#[derive(Default)]
pub struct Modify;

impl Component for Modify {
    fn info(&self) -> ComponentInfo {
        ComponentInfo::new(MODIFY_COMPONENT)
            .with_description("Modify")
            .with_info("Sends a new message after an incoming message is received")
            .with_tags(&["SDK"])
    }

    fn instance(&self) -> Box<dyn Component> {
        Box::new(Self)
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::source(MODIFY_IN_PORT, "In")
                .with_position(PortPosition::Left)
                .with_config(&ModifyInMessage::default()),
            Port::sink(MODIFY_OUT_PORT, "Out")
                .with_position(PortPosition::Right)
                .with_config(&ModifyOutMessage::default()),
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
            if port != MODIFY_IN_PORT {
                return Err(FlowError::unknown_port(port));
            }
            let input: ModifyInMessage = msg.decode(port)?;
            let out = ModifyOutMessage {
                context: input.context,
            };
            handler(MODIFY_OUT_PORT, Message::encode(&out)?).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn passes_context_through() {
        let modify = Modify;
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = handler_fn(move |port, msg| {
            let sink = sink.clone();
            async move {
                sink.lock()
                    .push((port, msg.as_value().cloned().unwrap_or_default()));
                Ok(())
            }
        });

        let input = Message::encode(&ModifyInMessage {
            context: json!({"v": 1}),
        })
        .unwrap();
        modify
            .handle(CancellationToken::new(), handler, MODIFY_IN_PORT, input)
            .await
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen[0].0, MODIFY_OUT_PORT);
        assert_eq!(seen[0].1["context"], json!({"v": 1}));
    }

    #[tokio::test]
    async fn rejects_malformed_payload() {
        let modify = Modify;
        let err = modify
            .handle(
                CancellationToken::new(),
                noop_handler(),
                MODIFY_IN_PORT,
                Message::Value(json!([1, 2, 3])),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidMessage { .. }));
    }
}
