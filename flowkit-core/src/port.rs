//! Ports: the typed attachments on a component.
//!
//! A port couples a stable name with a direction, a UI position hint, and a
//! shape: the JSON Schema of the messages crossing it plus a default-valued
//! instance of that shape. Source ports are written by the host; non-source
//! ports are emitted by the component.

use crate::schema;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

/// The settings port: its payload redefines the component's configuration
/// and may reshape the port surface.
pub const SETTINGS_PORT: &str = "settings";
/// The control port: dashboard-originated commands and UI state.
pub const CONTROL_PORT: &str = "control";
/// The status port: lifecycle notifications emitted by a component.
pub const STATUS_PORT: &str = "status";
/// The reconcile port: an empty payload asking the host to re-read ports.
pub const RECONCILE_PORT: &str = "reconcile";
/// The node port: the host injects the caller's graph-node identity.
pub const NODE_PORT: &str = "node";
/// The client port: the host injects a platform capability handle.
pub const CLIENT_PORT: &str = "client";

/// All names reserved by the host. Component authors must not reuse them
/// for domain ports.
pub const RESERVED_PORTS: [&str; 6] = [
    SETTINGS_PORT,
    CONTROL_PORT,
    STATUS_PORT,
    RECONCILE_PORT,
    NODE_PORT,
    CLIENT_PORT,
];

/// Where a port is drawn on the node. Pure UI metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortPosition {
    /// Left edge (conventional for inputs).
    Left,
    /// Right edge (conventional for outputs).
    Right,
    /// Bottom edge (conventional for ancillary ports).
    Bottom,
    /// Top edge.
    Top,
}

/// A named attachment on a component.
#[derive(Debug, Clone, Serialize)]
pub struct Port {
    /// Port name, unique per component and stable while its role is
    /// unchanged.
    pub name: String,
    /// Human label.
    pub label: String,
    /// `true` when the host sends into this port; `false` when the
    /// component emits from it.
    pub source: bool,
    /// UI position hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<PortPosition>,
    /// JSON Schema describing the port's message shape.
    pub schema: Value,
    /// A default-valued instance of the message shape.
    pub default_value: Value,
}

impl Port {
    fn new(name: impl Into<String>, label: impl Into<String>, source: bool) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            source,
            position: None,
            // the permissive schema; refined by with_config
            schema: Value::Bool(true),
            default_value: Value::Null,
        }
    }

    /// A port the host writes into.
    pub fn source(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, true)
    }

    /// A port the component emits from.
    pub fn sink(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, false)
    }

    /// The settings port carrying the given configuration shape.
    pub fn settings<T: JsonSchema + Serialize>(config: &T) -> Self {
        Self::new(SETTINGS_PORT, "Settings", true).with_config(config)
    }

    /// The control port carrying the given dashboard shape.
    pub fn control<T: JsonSchema + Serialize>(config: &T) -> Self {
        Self::new(CONTROL_PORT, "Control", true).with_config(config)
    }

    /// The environmental port for the graph-node identity.
    pub fn node() -> Self {
        Self::new(NODE_PORT, "", true)
    }

    /// The environmental port for the platform client handle.
    pub fn client() -> Self {
        Self::new(CLIENT_PORT, "", true)
    }

    /// Derive the port's schema and default value from a shape-carrying
    /// instance.
    pub fn with_config<T: JsonSchema + Serialize>(mut self, config: &T) -> Self {
        let (schema, default_value) = schema::config_of(config);
        self.schema = schema;
        self.default_value = default_value;
        self
    }

    /// Replace the schema document (after dynamic post-processing).
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    /// Set the UI position hint.
    pub fn with_position(mut self, position: PortPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Whether this port uses one of the host-reserved names.
    pub fn is_reserved(&self) -> bool {
        RESERVED_PORTS.contains(&self.name.as_str())
    }
}
