//! Router component (condition-ordered message routing).
//!
//! Routes incoming messages to one of the configured route ports depending
//! on the message itself. The set of out ports — and the route options
//! offered in the input schema — are regenerated from current settings.

use flowkit_core::port::SETTINGS_PORT;
use flowkit_core::prelude::*;
use flowkit_core::schema;
use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Component name.
pub const ROUTER_COMPONENT: &str = "router";
/// Message input port.
pub const ROUTER_IN_PORT: &str = "input";
/// Fallback port used when no condition matches (conditional on settings).
pub const ROUTER_DEFAULT_PORT: &str = "default";

/// Router settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouterSettings {
    /// Ordered, unique route names; one out port per route.
    #[schemars(title = "Routes", extend("minItems" = 1, "uniqueItems" = true))]
    pub routes: Vec<String>,
    /// Whether unmatched messages are emitted on the `default` port.
    /// When disabled they are silently consumed.
    #[schemars(
        title = "Enable default port",
        description = "Emit messages that match no condition on a default port"
    )]
    #[serde(default)]
    pub enable_default_port: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            routes: vec!["A".to_string(), "B".to_string()],
            enable_default_port: true,
        }
    }
}

/// One routing decision inside an input message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// The route to take when the condition holds.
    #[schemars(title = "Route", extend("propertyOrder" = 1))]
    pub route: String,
    /// Whether this route is taken.
    #[schemars(title = "Condition", extend("propertyOrder" = 2))]
    #[serde(default)]
    pub condition: bool,
}

/// Payload of the `input` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouterInMessage {
    /// Arbitrary message to be routed.
    #[schemars(
        title = "Context",
        description = "Arbitrary message to be routed",
        extend("configurable" = true, "propertyOrder" = 1)
    )]
    #[serde(default)]
    pub context: Value,
    /// Conditions evaluated in the given order; first match wins.
    #[schemars(
        title = "Conditions",
        extend("minItems" = 1, "uniqueItems" = true, "propertyOrder" = 2)
    )]
    pub conditions: Vec<Condition>,
}

/// Payload of every out port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouterOutMessage {
    /// The route that was selected.
    #[schemars(title = "Selected route")]
    pub route: String,
    /// The routed message.
    #[serde(default)]
    pub context: Value,
}

/// The router component.
#[derive(Default)]
pub struct Router {
    settings: RwLock<RouterSettings>,
}

fn port_name_from_route(route: &str) -> String {
    format!("out_{}", route.to_lowercase())
}

impl Component for Router {
    fn info(&self) -> ComponentInfo {
        ComponentInfo::new(ROUTER_COMPONENT)
            .with_description("Router")
            .with_info("Routes incoming messages depending on the message itself")
            .with_tags(&["SDK"])
    }

    fn instance(&self) -> Box<dyn Component> {
        Box::new(Self::default())
    }

    fn ports(&self) -> Vec<Port> {
        let settings = self.settings.read().clone();

        // Offer exactly the configured routes in the condition editor.
        let input_config = RouterInMessage {
            context: Value::Null,
            conditions: vec![Condition {
                route: settings.routes.first().cloned().unwrap_or_default(),
                condition: true,
            }],
        };
        let mut input_port = Port::source(ROUTER_IN_PORT, "In")
            .with_position(PortPosition::Left)
            .with_config(&input_config);
        schema::set_enum(
            &mut input_port.schema,
            "/properties/conditions/items/properties/route",
            &settings.routes,
            None,
        );

        let mut ports = vec![Port::settings(&settings), input_port];

        for route in &settings.routes {
            ports.push(
                Port::sink(port_name_from_route(route), route.to_uppercase())
                    .with_position(PortPosition::Right)
                    .with_config(&RouterOutMessage::default()),
            );
        }
        if settings.enable_default_port {
            ports.push(
                Port::sink(ROUTER_DEFAULT_PORT, "DEFAULT")
                    .with_position(PortPosition::Bottom)
                    .with_config(&RouterOutMessage {
                        route: ROUTER_DEFAULT_PORT.to_string(),
                        context: Value::Null,
                    }),
            );
        }
        ports
    }

    fn handle<'a>(
        &'a self,
        _ctx: CancellationToken,
        handler: Handler,
        port: &'a str,
        msg: Message,
    ) -> ComponentFuture<'a> {
        Box::pin(async move {
            if port == SETTINGS_PORT {
                let settings: RouterSettings = msg.decode_settings(ROUTER_COMPONENT)?;
                *self.settings.write() = settings;
                return Ok(());
            }
            if port != ROUTER_IN_PORT {
                return Err(FlowError::unknown_port(port));
            }

            let input: RouterInMessage = msg.decode(port)?;
            for condition in &input.conditions {
                if condition.condition {
                    let out = RouterOutMessage {
                        route: condition.route.clone(),
                        context: input.context,
                    };
                    return handler(
                        &port_name_from_route(&condition.route),
                        Message::encode(&out)?,
                    )
                    .await;
                }
            }

            if self.settings.read().enable_default_port {
                let out = RouterOutMessage {
                    route: ROUTER_DEFAULT_PORT.to_string(),
                    context: input.context,
                };
                return handler(ROUTER_DEFAULT_PORT, Message::encode(&out)?).await;
            }
            tracing::debug!(component = ROUTER_COMPONENT, "no condition matched, consumed");
            Ok(())
        })
    }
}
