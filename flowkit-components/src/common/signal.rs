//! Signal component (emit a configured context on an event).
//!
//! One component covers both "send when the flow starts" and "send when the
//! dashboard button is pressed": settings decide whether the context goes
//! out automatically on start, and the control port triggers a send at any
//! time.

use flowkit_core::port::{CONTROL_PORT, SETTINGS_PORT};
use flowkit_core::prelude::*;
use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Component name.
pub const SIGNAL_COMPONENT: &str = "signal";
/// Emission port.
pub const SIGNAL_OUT_PORT: &str = "out";

/// Signal settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignalSettings {
    /// The message to send.
    #[schemars(
        title = "Context",
        description = "Arbitrary message to send",
        extend("configurable" = true, "propertyOrder" = 1)
    )]
    #[serde(default)]
    pub context: Value,
    /// Send the context automatically when the flow starts.
    #[schemars(title = "Auto send", extend("propertyOrder" = 2))]
    #[serde(default)]
    pub auto: bool,
}

/// Dashboard payload of the control port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignalControl {
    /// Send button.
    #[schemars(title = "Send", extend("format" = "button", "propertyOrder" = 1))]
    pub send: bool,
    /// The message to send.
    #[schemars(title = "Context", extend("propertyOrder" = 2))]
    #[serde(default)]
    pub context: Value,
}

/// The signal component.
#[derive(Default)]
pub struct Signal {
    settings: RwLock<SignalSettings>,
}

impl Component for Signal {
    fn info(&self) -> ComponentInfo {
        ComponentInfo::new(SIGNAL_COMPONENT)
            .with_description("Signal")
            .with_info(
                "Sends a configured message when the flow starts or on demand \
                 from the dashboard",
            )
            .with_tags(&["SDK"])
    }

    fn instance(&self) -> Box<dyn Component> {
        Box::new(Self::default())
    }

    fn ports(&self) -> Vec<Port> {
        let settings = self.settings.read().clone();
        vec![
            Port::settings(&settings),
            Port::sink(SIGNAL_OUT_PORT, "Out")
                .with_position(PortPosition::Right)
                .with_config(&Value::Null),
            Port::control(&SignalControl {
                send: false,
                context: settings.context,
            }),
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
                    let settings: SignalSettings = msg.decode_settings(SIGNAL_COMPONENT)?;
                    *self.settings.write() = settings;
                    Ok(())
                }
                CONTROL_PORT => {
                    let control: SignalControl = msg.decode(port)?;
                    handler(SIGNAL_OUT_PORT, Message::Value(control.context)).await
                }
                _ => Err(FlowError::unknown_port(port)),
            }
        })
    }

    fn as_runnable(&self) -> Option<&dyn Runnable> {
        Some(self)
    }
}

impl Runnable for Signal {
    fn run<'a>(&'a self, ctx: CancellationToken, handler: Handler) -> ComponentFuture<'a> {
        Box::pin(async move {
            let settings = self.settings.read().clone();
            if settings.auto {
                // start-up emission has no synchronous caller; log and move on
                if let Err(error) = handler(SIGNAL_OUT_PORT, Message::Value(settings.context)).await
                {
                    tracing::warn!(component = SIGNAL_COMPONENT, %error, "auto send rejected");
                }
            }
            ctx.cancelled().await;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn collecting_handler() -> (Handler, Arc<parking_lot::Mutex<Vec<(String, Value)>>>) {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = handler_fn(move |port, msg| {
            let sink = sink.clone();
            async move {
                sink.lock()
                    .push((port, msg.as_value().cloned().unwrap_or(Value::Null)));
                Ok(())
            }
        });
        (handler, seen)
    }

    #[tokio::test]
    async fn control_send_emits_context() {
        let signal = Signal::default();
        let (handler, seen) = collecting_handler();

        let control = Message::encode(&SignalControl {
            send: true,
            context: json!("pressed"),
        })
        .unwrap();
        signal
            .handle(CancellationToken::new(), handler, CONTROL_PORT, control)
            .await
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], ("out".to_string(), json!("pressed")));
    }

    #[tokio::test]
    async fn auto_send_on_run_start() {
        let signal = Signal::default();
        let settings = Message::encode(&SignalSettings {
            context: json!({"boot": true}),
            auto: true,
        })
        .unwrap();
        signal
            .handle(
                CancellationToken::new(),
                noop_handler(),
                SETTINGS_PORT,
                settings,
            )
            .await
            .unwrap();

        let (handler, seen) = collecting_handler();
        let ctx = CancellationToken::new();
        let run_ctx = ctx.clone();
        let run = async { signal.run(run_ctx, handler).await };
        ctx.cancel();
        run.await.unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, json!({"boot": true}));
    }

    #[tokio::test]
    async fn no_auto_send_when_disabled() {
        let signal = Signal::default();
        let (handler, seen) = collecting_handler();
        let ctx = CancellationToken::new();
        ctx.cancel();
        signal.run(ctx, handler).await.unwrap();
        assert!(seen.lock().is_empty());
    }
}
