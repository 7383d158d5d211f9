//! Error types for flowkit.
//!
//! Components report failures through one strongly-typed enum so that a host
//! can tell configuration mistakes apart from protocol violations and from
//! genuine runtime trouble. Variants carry the identifiers a host needs to
//! act (port name, component name, request ID).

use thiserror::Error;

/// The main error type for component operations.
#[derive(Error, Debug)]
pub enum FlowError {
    /// A settings payload did not decode into the component's settings type.
    #[error("invalid settings for component '{component}': {cause}")]
    InvalidSettings {
        /// The component that rejected the settings.
        component: String,
        /// Reason for the rejection.
        cause: String,
    },

    /// A message payload did not decode into the port's message type.
    #[error("invalid message on port '{port}': {cause}")]
    InvalidMessage {
        /// The port the message arrived on.
        port: String,
        /// Reason for the rejection.
        cause: String,
    },

    /// The port is not part of the component's current shape.
    #[error("port '{port}' is not supported")]
    UnknownPort {
        /// The unrecognised port name.
        port: String,
    },

    /// A configuration value is out of range or otherwise unusable.
    #[error("invalid configuration '{field}': {cause}")]
    InvalidConfiguration {
        /// The offending field.
        field: String,
        /// Why the value is unusable.
        cause: String,
    },

    /// A different prototype is already registered under this name.
    #[error("component '{name}' already registered with a different prototype")]
    RegistryConflict {
        /// The contested component name.
        name: String,
    },

    /// No prototype is registered under this name.
    #[error("component '{name}' is not registered")]
    ComponentNotFound {
        /// The requested component name.
        name: String,
    },

    /// A response arrived for a request that is not pending.
    #[error("unknown request ID '{id}'")]
    UnknownRequestId {
        /// The unmatched request identifier.
        id: String,
    },

    /// The component needs a platform client and none was injected.
    #[error("no platform client available")]
    NoClient,

    /// A state snapshot could not be produced or restored.
    #[error("state snapshot error: {0}")]
    State(String),

    /// Network-level failure (bind, connect, transfer).
    #[error("network error: {cause}")]
    Network {
        /// Description of the failure.
        cause: String,
    },

    /// An operation exceeded its deadline.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout {
        /// The deadline that was exceeded, in milliseconds.
        timeout_ms: u64,
    },

    /// Serialization or deserialization failure outside a port boundary.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl FlowError {
    /// Invalid-settings error from any displayable cause.
    pub fn invalid_settings(component: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::InvalidSettings {
            component: component.into(),
            cause: cause.to_string(),
        }
    }

    /// Invalid-message error from any displayable cause.
    pub fn invalid_message(port: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::InvalidMessage {
            port: port.into(),
            cause: cause.to_string(),
        }
    }

    /// Unknown-port error.
    pub fn unknown_port(port: impl Into<String>) -> Self {
        Self::UnknownPort { port: port.into() }
    }

    /// Check if this error is a configuration error (bad settings or values).
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSettings { .. } | Self::InvalidConfiguration { .. } | Self::NoClient
        )
    }

    /// Check if this error is a protocol error (wrong payload or port).
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidMessage { .. } | Self::UnknownPort { .. } | Self::UnknownRequestId { .. }
        )
    }
}

/// Result type alias using [`FlowError`].
pub type Result<T> = std::result::Result<T, FlowError>;
