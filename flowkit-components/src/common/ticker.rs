//! Ticker component (periodic emission).

use flowkit_core::port::{CONTROL_PORT, SETTINGS_PORT, STATUS_PORT};
use flowkit_core::prelude::*;
use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Component name.
pub const TICKER_COMPONENT: &str = "ticker";
/// Emission port.
pub const TICKER_OUT_PORT: &str = "out";

/// The shortest accepted period, in milliseconds.
const MIN_PERIOD_MS: i64 = 10;

/// Ticker settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TickerSettings {
    /// How often to emit, in milliseconds.
    #[schemars(
        title = "Periodicity (ms)",
        extend("minimum" = 10, "default" = 1000, "propertyOrder" = 1)
    )]
    pub period: i64,
    /// Whether the ticker can be controlled externally.
    #[schemars(
        title = "Enable control port",
        description = "Control port allows controlling the ticker externally",
        extend("propertyOrder" = 2)
    )]
    #[serde(default)]
    pub enable_control_port: bool,
    /// The message sent on every tick.
    #[schemars(
        title = "Context",
        description = "Arbitrary message to be sent each period of time",
        extend("configurable" = true, "propertyOrder" = 3)
    )]
    #[serde(default)]
    pub context: Value,
}

impl Default for TickerSettings {
    fn default() -> Self {
        Self {
            period: 1000,
            enable_control_port: false,
            context: Value::Null,
        }
    }
}

/// Dashboard payload of the status port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TickerStatus {
    /// Human status line.
    #[schemars(
        title = "Status",
        extend("readonly" = true, "colSpan" = "col-span-6", "propertyOrder" = 1)
    )]
    pub status: String,
    /// Reset button.
    #[schemars(
        title = "Reset",
        extend("format" = "button", "colSpan" = "col-span-6", "propertyOrder" = 2)
    )]
    pub reset: bool,
}

/// External-control payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TickerControl {
    /// Whether the ticker should be emitting.
    #[schemars(title = "Ticker state")]
    pub start: bool,
}

/// The ticker component.
#[derive(Default)]
pub struct Ticker {
    settings: RwLock<TickerSettings>,
    counter: AtomicI64,
}

impl Component for Ticker {
    fn info(&self) -> ComponentInfo {
        ComponentInfo::new(TICKER_COMPONENT)
            .with_description("Ticker")
            .with_info("Sends messages periodically")
            .with_tags(&["SDK"])
    }

    fn instance(&self) -> Box<dyn Component> {
        Box::new(Self::default())
    }

    fn ports(&self) -> Vec<Port> {
        let settings = self.settings.read().clone();
        let mut ports = vec![
            Port::sink(STATUS_PORT, "Status").with_config(&TickerStatus {
                status: format!("Ticks: {}", self.counter.load(Ordering::Relaxed)),
                reset: false,
            }),
            Port::settings(&settings),
            Port::sink(TICKER_OUT_PORT, "Out")
                .with_position(PortPosition::Right)
                .with_config(&Value::Null),
        ];
        if settings.enable_control_port {
            ports.push(
                Port::control(&TickerControl::default()).with_position(PortPosition::Left),
            );
        }
        ports
    }

    fn handle<'a>(
        &'a self,
        _ctx: CancellationToken,
        _handler: Handler,
        port: &'a str,
        msg: Message,
    ) -> ComponentFuture<'a> {
        Box::pin(async move {
            match port {
                SETTINGS_PORT => {
                    let settings: TickerSettings = msg.decode_settings(TICKER_COMPONENT)?;
                    if settings.period < MIN_PERIOD_MS {
                        return Err(FlowError::InvalidConfiguration {
                            field: "period".to_string(),
                            cause: format!("period should be at least {} milliseconds", MIN_PERIOD_MS),
                        });
                    }
                    *self.settings.write() = settings;
                    Ok(())
                }
                CONTROL_PORT if self.settings.read().enable_control_port => {
                    let _control: TickerControl = msg.decode(port)?;
                    Ok(())
                }
                _ => Err(FlowError::unknown_port(port)),
            }
        })
    }

    fn as_runnable(&self) -> Option<&dyn Runnable> {
        Some(self)
    }
}

impl Runnable for Ticker {
    fn run<'a>(&'a self, ctx: CancellationToken, handler: Handler) -> ComponentFuture<'a> {
        Box::pin(async move {
            let (period, context) = {
                let settings = self.settings.read();
                (settings.period.max(MIN_PERIOD_MS), settings.context.clone())
            };
            let mut interval = tokio::time::interval(Duration::from_millis(period as u64));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // the first tick of a tokio interval is immediate
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = ctx.cancelled() => return Ok(()),
                    _ = interval.tick() => {
                        self.counter.fetch_add(1, Ordering::Relaxed);
                        // periodic emission has no synchronous caller
                        if let Err(error) = handler(TICKER_OUT_PORT, Message::Value(context.clone())).await {
                            tracing::warn!(component = TICKER_COMPONENT, %error, "tick rejected downstream");
                        }
                    }
                }
            }
        })
    }
}
