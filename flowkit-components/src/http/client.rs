//! HTTP Client component.
//!
//! Performs one HTTP request per incoming message and emits the decoded
//! response. Failures go to the error port when it is enabled, otherwise
//! they are returned to the host.

use super::types::{self, ContentType, Header, MIME_APPLICATION_JSON};
use flowkit_core::port::SETTINGS_PORT;
use flowkit_core::prelude::*;
use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Component name.
pub const CLIENT_COMPONENT: &str = "http_client";
/// Request ingestion port.
pub const CLIENT_REQUEST_PORT: &str = "request";
/// Response emission port.
pub const CLIENT_RESPONSE_PORT: &str = "response";
/// Failure emission port (conditional on settings).
pub const CLIENT_ERROR_PORT: &str = "error";

/// HTTP client settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    /// Whether failures are emitted as messages instead of returned.
    #[schemars(
        title = "Enable Error Port",
        description = "If the request may fail, the error port will emit an error message"
    )]
    #[serde(default)]
    pub enable_error_port: bool,
}

/// The request to perform.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequestSpec {
    /// Request method.
    #[schemars(
        title = "Method",
        extend("enum" = ["GET", "POST", "PATCH", "PUT", "DELETE"],
                "enumTitles" = ["GET", "POST", "PATCH", "PUT", "DELETE"],
                "colSpan" = "col-span-6")
    )]
    pub method: String,
    /// Per-request timeout, in seconds.
    #[schemars(title = "Request Timeout", extend("colSpan" = "col-span-6"))]
    pub timeout: u64,
    /// Target URL.
    #[schemars(title = "URL", extend("format" = "uri"))]
    pub url: String,
    /// Request content type.
    pub content_type: ContentType,
    /// Extra request headers.
    #[schemars(title = "Headers")]
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Request body, serialized according to the content type.
    #[schemars(title = "Request Body", extend("configurable" = true))]
    #[serde(default)]
    pub body: Value,
}

impl Default for ClientRequestSpec {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            timeout: 10,
            url: "http://example.com".to_string(),
            content_type: ContentType::default(),
            headers: Vec::new(),
            body: Value::Null,
        }
    }
}

/// Payload of the `request` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequest {
    /// Message to be sent further.
    #[schemars(
        title = "Context",
        description = "Message to be sent further",
        extend("configurable" = true)
    )]
    #[serde(default)]
    pub context: Value,
    /// The request to perform.
    #[schemars(title = "Request", description = "HTTP Request")]
    pub request: ClientRequestSpec,
}

/// The decoded HTTP response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponseData {
    /// Response headers.
    #[schemars(title = "Headers")]
    pub headers: Vec<Header>,
    /// Status line, e.g. `200 OK`.
    pub status: String,
    /// Numeric status code.
    pub status_code: u16,
    /// Decoded response body.
    #[schemars(title = "Body")]
    #[serde(default)]
    pub body: Value,
}

/// Payload of the `response` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    /// The context of the originating request message.
    #[serde(default)]
    pub context: Value,
    /// The request that was performed.
    pub request: ClientRequestSpec,
    /// The response received.
    pub response: ClientResponseData,
}

/// Payload of the `error` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientError {
    /// The context of the originating request message.
    #[serde(default)]
    pub context: Value,
    /// The request that failed.
    pub request: ClientRequestSpec,
    /// Failure description.
    pub error: String,
}

/// The HTTP client component.
pub struct HttpClient {
    settings: RwLock<ClientSettings>,
    http: reqwest::Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self {
            settings: RwLock::new(ClientSettings::default()),
            http: reqwest::Client::new(),
        }
    }
}

impl HttpClient {
    /// Route a failure to the error port when enabled, otherwise return it.
    async fn fail(
        &self,
        handler: &Handler,
        context: Value,
        request: ClientRequestSpec,
        cause: String,
    ) -> Result<()> {
        if !self.settings.read().enable_error_port {
            return Err(FlowError::Network { cause });
        }
        let error = ClientError {
            context,
            request,
            error: cause,
        };
        handler(CLIENT_ERROR_PORT, Message::encode(&error)?).await
    }

    async fn perform(&self, spec: &ClientRequestSpec) -> std::result::Result<ClientResponseData, String> {
        let method = reqwest::Method::from_bytes(spec.method.as_bytes())
            .map_err(|_| format!("invalid HTTP method: {}", spec.method))?;

        let mut builder = self
            .http
            .request(method, &spec.url)
            .timeout(Duration::from_secs(spec.timeout.max(1)));
        for header in &spec.headers {
            builder = builder.header(header.key.as_str(), header.value.as_str());
        }
        if !spec.body.is_null() {
            builder = if spec.content_type.as_str() == MIME_APPLICATION_JSON {
                builder.json(&spec.body)
            } else {
                let (bytes, mime) = types::render_body(&spec.content_type, &spec.body);
                builder
                    .header(reqwest::header::CONTENT_TYPE, mime)
                    .body(bytes.to_vec())
            };
        }

        let response = builder.send().await.map_err(|e| e.to_string())?;
        let status_code = response.status().as_u16();
        let status = response.status().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| Header {
                key: name.as_str().to_string(),
                value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            })
            .collect();

        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        let body = types::parse_body(&content_type, &bytes)?;

        Ok(ClientResponseData {
            headers,
            status,
            status_code,
            body,
        })
    }
}

impl Component for HttpClient {
    fn info(&self) -> ComponentInfo {
        ComponentInfo::new(CLIENT_COMPONENT)
            .with_description("HTTP Client")
            .with_info("Performs HTTP requests")
            .with_tags(&["HTTP", "Client"])
    }

    fn instance(&self) -> Box<dyn Component> {
        Box::new(Self::default())
    }

    fn ports(&self) -> Vec<Port> {
        let settings = self.settings.read().clone();
        let mut ports = vec![
            Port::source(CLIENT_REQUEST_PORT, "Request")
                .with_position(PortPosition::Left)
                .with_config(&ClientRequest::default()),
            Port::sink(CLIENT_RESPONSE_PORT, "Response")
                .with_position(PortPosition::Right)
                .with_config(&ClientResponse::default()),
            Port::settings(&settings),
        ];
        if settings.enable_error_port {
            ports.push(
                Port::sink(CLIENT_ERROR_PORT, "Error")
                    .with_position(PortPosition::Bottom)
                    .with_config(&ClientError::default()),
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
            match port {
                SETTINGS_PORT => {
                    let settings: ClientSettings = msg.decode_settings(CLIENT_COMPONENT)?;
                    *self.settings.write() = settings;
                    Ok(())
                }
                CLIENT_REQUEST_PORT => {
                    let input: ClientRequest = msg.decode(port)?;
                    match self.perform(&input.request).await {
                        Ok(response) => {
                            let out = ClientResponse {
                                context: input.context,
                                request: input.request,
                                response,
                            };
                            handler(CLIENT_RESPONSE_PORT, Message::encode(&out)?).await
                        }
                        Err(cause) => {
                            self.fail(&handler, input.context, input.request, cause).await
                        }
                    }
                }
                _ => Err(FlowError::unknown_port(port)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_method_without_error_port_returns_failure() {
        let client = HttpClient::default();
        let input = Message::encode(&ClientRequest {
            context: Value::Null,
            request: ClientRequestSpec {
                method: "NOT A METHOD".to_string(),
                ..ClientRequestSpec::default()
            },
        })
        .unwrap();

        let err = client
            .handle(
                CancellationToken::new(),
                noop_handler(),
                CLIENT_REQUEST_PORT,
                input,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Network { .. }));
    }

    #[tokio::test]
    async fn invalid_method_with_error_port_emits_error() {
        let client = HttpClient::default();
        let settings = Message::encode(&ClientSettings {
            enable_error_port: true,
        })
        .unwrap();
        client
            .handle(
                CancellationToken::new(),
                noop_handler(),
                SETTINGS_PORT,
                settings,
            )
            .await
            .unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handler = handler_fn(move |port, msg| {
            let tx = tx.clone();
            async move {
                let _ = tx.send((port, msg.as_value().cloned().unwrap_or_default()));
                Ok(())
            }
        });

        let input = Message::encode(&ClientRequest {
            context: Value::Null,
            request: ClientRequestSpec {
                method: "NOT A METHOD".to_string(),
                ..ClientRequestSpec::default()
            },
        })
        .unwrap();
        client
            .handle(CancellationToken::new(), handler, CLIENT_REQUEST_PORT, input)
            .await
            .unwrap();

        let (port, value) = rx.recv().await.unwrap();
        assert_eq!(port, CLIENT_ERROR_PORT);
        assert!(value["error"].as_str().unwrap().contains("invalid HTTP method"));
    }

    #[tokio::test]
    async fn error_port_appears_with_settings() {
        let client = HttpClient::default();
        assert_eq!(client.ports().len(), 3);

        let settings = Message::encode(&ClientSettings {
            enable_error_port: true,
        })
        .unwrap();
        client
            .handle(
                CancellationToken::new(),
                noop_handler(),
                SETTINGS_PORT,
                settings,
            )
            .await
            .unwrap();

        let ports = client.ports();
        assert_eq!(ports.len(), 4);
        assert_eq!(ports[3].name, CLIENT_ERROR_PORT);
    }
}
