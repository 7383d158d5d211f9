//! Debug component (terminal sink with a dashboard view).
//!
//! Consumes any message without sending it anywhere; the last value is
//! shown readonly on the control port, so the component asks the host to
//! reconcile after each update.

use flowkit_core::port::{RECONCILE_PORT, SETTINGS_PORT};
use flowkit_core::prelude::*;
use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Component name.
pub const DEBUG_COMPONENT: &str = "debug";
/// Input port.
pub const DEBUG_IN_PORT: &str = "in";

/// Debug settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DebugSettings {
    /// The value shown on the dashboard.
    #[schemars(
        title = "Context",
        description = "Debug message",
        extend("configurable" = true, "propertyOrder" = 1)
    )]
    #[serde(default)]
    pub context: Value,
}

/// Payload of the `in` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DebugIn {
    /// The observed value.
    #[schemars(title = "Context", extend("propertyOrder" = 1))]
    #[serde(default)]
    pub context: Value,
}

/// Dashboard payload of the control port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DebugControl {
    /// The last observed value.
    #[schemars(title = "Context", extend("readonly" = true, "propertyOrder" = 1))]
    #[serde(default)]
    pub context: Value,
}

/// The debug component.
#[derive(Default)]
pub struct Debug {
    settings: RwLock<DebugSettings>,
}

impl Component for Debug {
    fn info(&self) -> ComponentInfo {
        ComponentInfo::new(DEBUG_COMPONENT)
            .with_description("Debug")
            .with_info("Consumes any data without sending it anywhere")
            .with_tags(&["SDK"])
    }

    fn instance(&self) -> Box<dyn Component> {
        Box::new(Self::default())
    }

    fn ports(&self) -> Vec<Port> {
        let settings = self.settings.read().clone();
        vec![
            Port::source(DEBUG_IN_PORT, "In")
                .with_position(PortPosition::Left)
                .with_config(&DebugIn::default()),
            Port::control(&DebugControl {
                context: settings.context.clone(),
            }),
            Port::settings(&settings),
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
            match port {
                SETTINGS_PORT => {
                    let settings: DebugSettings = msg.decode_settings(DEBUG_COMPONENT)?;
                    *self.settings.write() = settings;
                    Ok(())
                }
                DEBUG_IN_PORT => {
                    let input: DebugIn = msg.decode(port)?;
                    self.settings.write().context = input.context;
                    // refresh the dashboard view
                    handler(RECONCILE_PORT, Message::null()).await
                }
                _ => Err(FlowError::unknown_port(port)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn stores_last_value_and_reconciles() {
        let debug = Debug::default();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = handler_fn(move |port, _msg| {
            let sink = sink.clone();
            async move {
                sink.lock().push(port);
                Ok(())
            }
        });

        let input = Message::encode(&DebugIn {
            context: json!({"observed": 1}),
        })
        .unwrap();
        debug
            .handle(CancellationToken::new(), handler, DEBUG_IN_PORT, input)
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec![RECONCILE_PORT.to_string()]);

        // dashboard port carries the stored value
        let ports = debug.ports();
        let control = ports.iter().find(|p| p.name == "control").unwrap();
        assert_eq!(control.default_value["context"], json!({"observed": 1}));
    }
}
