//! Messages and host-injected payloads.
//!
//! Everything that travels through a graph edge is a [`Message`]. Ordinary
//! payloads are JSON values whose shape is described by the receiving port's
//! schema; the two environmental ports (`node`, `client`) carry values the
//! host injects directly and that never cross a serialization boundary.

use crate::component::ComponentFuture;
use crate::error::{FlowError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Annotation key a host may set to suggest a TCP listen port.
pub const SUGGESTED_HTTP_PORT_ANNOTATION: &str = "suggested-http-port";

/// A payload delivered to, or emitted by, a component.
#[derive(Clone)]
pub enum Message {
    /// A schema-described graph payload.
    Value(Value),
    /// The caller's graph-node identity, injected on the `node` port.
    Node(GraphNode),
    /// A platform capability handle, injected on the `client` port.
    Client(Arc<dyn PlatformClient>),
}

impl Message {
    /// The empty payload (used for `reconcile` and other signal-only ports).
    pub fn null() -> Self {
        Self::Value(Value::Null)
    }

    /// Wrap any serializable value as a graph payload.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self::Value)
            .map_err(|e| FlowError::Serialization(e.to_string()))
    }

    /// Decode the payload into the message type declared for `port`.
    ///
    /// Fails with [`FlowError::InvalidMessage`] when the payload is not a
    /// graph value or does not match the expected shape.
    pub fn decode<T: DeserializeOwned>(&self, port: &str) -> Result<T> {
        match self {
            Self::Value(value) => serde_json::from_value(value.clone())
                .map_err(|e| FlowError::invalid_message(port, e)),
            _ => Err(FlowError::invalid_message(port, "expected a graph value")),
        }
    }

    /// Decode the payload as a settings record for `component`.
    pub fn decode_settings<T: DeserializeOwned>(&self, component: &str) -> Result<T> {
        match self {
            Self::Value(value) => serde_json::from_value(value.clone())
                .map_err(|e| FlowError::invalid_settings(component, e)),
            _ => Err(FlowError::invalid_settings(
                component,
                "expected a graph value",
            )),
        }
    }

    /// Borrow the graph value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Take the graph-node identity, if this is one.
    pub fn into_node(self) -> Option<GraphNode> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Take the platform client handle, if this is one.
    pub fn into_client(self) -> Option<Arc<dyn PlatformClient>> {
        match self {
            Self::Client(client) => Some(client),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Self::Client(_) => f.write_str("Client(..)"),
        }
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// The identity of the graph node a component instance is attached to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphNode {
    /// Dot-separated hierarchical node name.
    pub name: String,
    /// Free-form annotations set by the host.
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

impl GraphNode {
    /// Create a node identity with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotations: HashMap::new(),
        }
    }

    /// Add an annotation.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// The label used for automatic hostname generation: the last
    /// dot-separated segment of the node name.
    pub fn auto_host_label(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// The TCP port suggested via annotations, if present and parseable.
    pub fn suggested_http_port(&self) -> Option<u16> {
        self.annotations
            .get(SUGGESTED_HTTP_PORT_ANNOTATION)
            .and_then(|v| v.parse().ok())
    }
}

/// Capabilities the platform grants a component through the `client` port.
///
/// The contract mirrors what an ingress-aware host provides: publish a local
/// TCP port under one or more public hostnames, and withdraw the exposure
/// again. Implementations must be cheap to clone behind an `Arc`.
pub trait PlatformClient: Send + Sync {
    /// Bind `local_port` to public hostnames and return the public URLs.
    ///
    /// `auto_host_name` is a label the platform may use to derive a
    /// subdomain; `hostnames` are explicit virtual hosts to bind.
    fn expose_port<'a>(
        &'a self,
        auto_host_name: Option<&'a str>,
        hostnames: &'a [String],
        local_port: u16,
    ) -> ComponentFuture<'a, Vec<String>>;

    /// Remove any exposure previously created for `local_port`.
    fn disclose_port<'a>(&'a self, local_port: u16) -> ComponentFuture<'a, ()>;
}

/// The bare-minimum [`PlatformClient`]: no ingress, loopback URLs only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClient;

impl PlatformClient for LocalClient {
    fn expose_port<'a>(
        &'a self,
        _auto_host_name: Option<&'a str>,
        _hostnames: &'a [String],
        local_port: u16,
    ) -> ComponentFuture<'a, Vec<String>> {
        Box::pin(async move { Ok(vec![format!("http://localhost:{}", local_port)]) })
    }

    fn disclose_port<'a>(&'a self, _local_port: u16) -> ComponentFuture<'a, ()> {
        Box::pin(async move { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Probe {
        context: Value,
        count: u32,
    }

    #[test]
    fn message_decode_roundtrip() {
        let msg = Message::encode(&Probe {
            context: json!({"k": "v"}),
            count: 3,
        })
        .unwrap();

        let decoded: Probe = msg.decode("in").unwrap();
        assert_eq!(decoded.count, 3);
        assert_eq!(decoded.context, json!({"k": "v"}));
    }

    #[test]
    fn message_decode_wrong_shape() {
        let msg = Message::Value(json!({"count": "not a number"}));
        let err = msg.decode::<Probe>("in").unwrap_err();
        assert!(matches!(err, FlowError::InvalidMessage { ref port, .. } if port == "in"));
    }

    #[test]
    fn node_auto_host_label() {
        let node = GraphNode::new("tenant.flow.webserver");
        assert_eq!(node.auto_host_label(), "webserver");

        let flat = GraphNode::new("solo");
        assert_eq!(flat.auto_host_label(), "solo");
    }

    #[test]
    fn node_suggested_port() {
        let node = GraphNode::new("n").with_annotation(SUGGESTED_HTTP_PORT_ANNOTATION, "8081");
        assert_eq!(node.suggested_http_port(), Some(8081));

        let bad = GraphNode::new("n").with_annotation(SUGGESTED_HTTP_PORT_ANNOTATION, "eighty");
        assert_eq!(bad.suggested_http_port(), None);
    }

    #[tokio::test]
    async fn local_client_exposes_loopback() {
        let client = LocalClient;
        let urls = client.expose_port(None, &[], 8080).await.unwrap();
        assert_eq!(urls, vec!["http://localhost:8080".to_string()]);
        client.disclose_port(8080).await.unwrap();
    }
}
