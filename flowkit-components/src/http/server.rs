//! HTTP Server component.
//!
//! Serves HTTP requests. Each request becomes a message on the `request`
//! port; to produce an HTTP response, a message carrying the same request
//! ID must find its way to the `response` port before the read timeout
//! elapses, otherwise the client sees a timeout error. The listener binds
//! an OS-assigned port (or the one suggested by the graph node) and asks
//! the injected platform client to publish it.

use super::pending::PendingMap;
use super::types::{self, ContentType, Header};
use bytes::Bytes;
use flowkit_core::port::{
    CLIENT_PORT, CONTROL_PORT, NODE_PORT, RECONCILE_PORT, SETTINGS_PORT, STATUS_PORT,
};
use flowkit_core::prelude::*;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Response, StatusCode, header};
use hyper_util::rt::TokioIo;
use parking_lot::{Mutex, RwLock};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Component name.
pub const SERVER_COMPONENT: &str = "http_server";
/// Per-request emission port.
pub const SERVER_REQUEST_PORT: &str = "request";
/// Correlated-response ingestion port.
pub const SERVER_RESPONSE_PORT: &str = "response";
/// Programmatic start port (conditional on settings).
pub const SERVER_START_PORT: &str = "start";
/// Programmatic stop port (conditional on settings).
pub const SERVER_STOP_PORT: &str = "stop";

/// Grace period for shutdown and port disclosure.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// HTTP server settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    /// Whether lifecycle notifications are emitted on a status port.
    #[schemars(
        title = "Enable status port",
        description = "Status port notifies when the server is up or down"
    )]
    #[serde(default)]
    pub enable_status_port: bool,
    /// Whether the server can be stopped from the graph.
    #[schemars(
        title = "Enable stop port",
        description = "Stop port allows you to stop the server"
    )]
    #[serde(default)]
    pub enable_stop_port: bool,
    /// Whether the server can be started from the graph.
    #[schemars(
        title = "Enable start port",
        description = "Start port allows you to start the server"
    )]
    #[serde(default)]
    pub enable_start_port: bool,
}

/// Parameters of one server instance.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerStart {
    /// Carried into every request emitted while this instance runs.
    #[schemars(
        title = "Context",
        description = "Start context",
        extend("configurable" = true, "propertyOrder" = 1)
    )]
    #[serde(default)]
    pub context: Value,
    /// Derive a public hostname from the graph-node name.
    #[schemars(
        title = "Automatically generate hostname",
        description = "Use the cluster auto-subdomain setup if any",
        extend("propertyOrder" = 2)
    )]
    #[serde(default)]
    pub auto_host_name: bool,
    /// Virtual hosts this server should be bound to.
    #[schemars(title = "Hostnames", extend("propertyOrder" = 3))]
    #[serde(default)]
    pub hostnames: Vec<String>,
    /// Maximum seconds to wait for the graph to answer a request.
    #[schemars(
        title = "Read Timeout",
        description = "Maximum duration in seconds to wait for a response message",
        extend("propertyOrder" = 4)
    )]
    pub read_timeout: u64,
    /// Maximum seconds for writing a response back to the client.
    #[schemars(
        title = "Write Timeout",
        description = "Maximum duration in seconds before timing out a response write",
        extend("propertyOrder" = 5)
    )]
    pub write_timeout: u64,
}

impl Default for ServerStart {
    fn default() -> Self {
        Self {
            context: Value::Null,
            auto_host_name: true,
            hostnames: Vec::new(),
            read_timeout: 60,
            write_timeout: 10,
        }
    }
}

/// The message emitted on the `request` port for every HTTP request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerRequest {
    /// The start context of the running instance.
    #[serde(default)]
    pub context: Value,
    /// Correlation ID; a response must echo it back.
    #[serde(rename = "requestID")]
    pub request_id: String,
    /// Request path and query as received.
    #[serde(rename = "requestURI")]
    pub request_uri: String,
    /// Decoded query parameters (name → list of values).
    #[serde(default)]
    pub request_params: Value,
    /// Host header.
    pub host: String,
    /// Request method.
    #[schemars(
        title = "Method",
        extend("enum" = ["GET", "POST", "PATCH", "PUT", "DELETE"],
                "enumTitles" = ["GET", "POST", "PATCH", "PUT", "DELETE"])
    )]
    pub method: String,
    /// Best-effort client address.
    #[serde(rename = "realIP")]
    pub real_ip: String,
    /// Request headers in sorted, case-normalised order.
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Decoded request body.
    #[serde(default)]
    pub body: Value,
    /// Request scheme.
    pub scheme: String,
}

/// The message expected on the `response` port.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerResponse {
    /// Correlation ID copied from the request message.
    #[serde(rename = "requestID")]
    #[schemars(
        title = "Request ID",
        description = "To match a response with its request, pass the request ID here",
        extend("minLength" = 1, "propertyOrder" = 1)
    )]
    pub request_id: String,
    /// HTTP status code.
    #[schemars(
        title = "Status Code",
        description = "HTTP status code for the response",
        extend("minimum" = 100, "maximum" = 599, "default" = 200, "propertyOrder" = 2)
    )]
    pub status_code: u16,
    /// Response content type.
    #[schemars(extend("propertyOrder" = 3))]
    pub content_type: ContentType,
    /// Extra response headers.
    #[schemars(title = "Response headers", extend("propertyOrder" = 4))]
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Response body, serialized according to the content type.
    #[schemars(
        title = "Response body",
        extend("configurable" = true, "propertyOrder" = 5)
    )]
    #[serde(default)]
    pub body: Value,
}

impl Default for ServerResponse {
    fn default() -> Self {
        Self {
            request_id: String::new(),
            status_code: 200,
            content_type: ContentType::default(),
            headers: Vec::new(),
            body: Value::Null,
        }
    }
}

/// Dashboard payload while the server is stopped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerStartControl {
    /// Start button.
    #[schemars(
        title = "Start",
        description = "Start HTTP server",
        extend("format" = "button", "propertyOrder" = 1)
    )]
    pub start: bool,
    /// Human status line.
    #[schemars(title = "Status", extend("readonly" = true, "propertyOrder" = 2))]
    pub status: String,
}

/// Dashboard payload while the server is running.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerStopControl {
    /// Stop button.
    #[schemars(
        title = "Stop",
        description = "Stop HTTP server",
        extend("format" = "button", "propertyOrder" = 1)
    )]
    pub stop: bool,
    /// Human status line.
    #[schemars(title = "Status", extend("readonly" = true, "propertyOrder" = 2))]
    pub status: String,
    /// Public listen addresses.
    #[schemars(title = "Listen Address", extend("readonly" = true, "propertyOrder" = 3))]
    #[serde(default)]
    pub listen_addr: Vec<String>,
}

/// Payload of the `stop` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ServerStop {}

/// Payload of the `status` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    /// The start context of the instance the notification is about.
    #[schemars(title = "Context", extend("propertyOrder" = 1))]
    #[serde(default)]
    pub context: Value,
    /// Public listen addresses.
    #[schemars(title = "Listen Address", extend("readonly" = true, "propertyOrder" = 2))]
    #[serde(default)]
    pub listen_addr: Vec<String>,
    /// Whether the server is accepting requests.
    #[schemars(title = "Is running", extend("readonly" = true, "propertyOrder" = 3))]
    pub is_running: bool,
}

/// Everything a request task needs, shared across connections.
struct RequestEnv {
    context: Value,
    read_timeout: Duration,
    pending: Arc<PendingMap>,
    handler: Handler,
    token: CancellationToken,
}

/// The HTTP server component.
pub struct HttpServer {
    settings: RwLock<ServerSettings>,
    start_params: RwLock<ServerStart>,
    pending: Arc<PendingMap>,
    public_addrs: RwLock<Vec<String>>,
    cancel: Mutex<Option<CancellationToken>>,
    /// Serializes instance lifecycles: a new start waits here until the
    /// previous instance has fully unwound.
    run_lock: tokio::sync::Mutex<()>,
    node: RwLock<Option<GraphNode>>,
    client: RwLock<Option<Arc<dyn PlatformClient>>>,
}

impl Default for HttpServer {
    fn default() -> Self {
        Self {
            settings: RwLock::new(ServerSettings::default()),
            start_params: RwLock::new(ServerStart::default()),
            pending: Arc::new(PendingMap::new()),
            public_addrs: RwLock::new(Vec::new()),
            cancel: Mutex::new(None),
            run_lock: tokio::sync::Mutex::new(()),
            node: RwLock::new(None),
            client: RwLock::new(None),
        }
    }
}

impl HttpServer {
    fn is_running(&self) -> bool {
        self.cancel
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    fn stop(&self) -> Result<()> {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
        Ok(())
    }

    fn set_public_addrs(&self, addrs: Vec<String>) {
        *self.public_addrs.write() = addrs;
    }

    fn public_addrs(&self) -> Vec<String> {
        self.public_addrs.read().clone()
    }

    /// The dashboard port: a stop view while running, a start view otherwise.
    fn control_port(&self) -> Port {
        if self.is_running() {
            Port::control(&ServerStopControl {
                stop: false,
                status: "Running".to_string(),
                listen_addr: self.public_addrs(),
            })
        } else {
            Port::control(&ServerStartControl {
                start: false,
                status: "Not running".to_string(),
            })
        }
    }

    fn status(&self, context: Value) -> ServerStatus {
        ServerStatus {
            context,
            listen_addr: self.public_addrs(),
            is_running: self.is_running(),
        }
    }

    /// Emit a lifecycle notification and ask the host to redraw.
    /// Both are notifications without a synchronous caller; errors only log.
    async fn notify(&self, handler: &Handler, context: &Value) {
        if self.settings.read().enable_status_port {
            match Message::encode(&self.status(context.clone())) {
                Ok(msg) => {
                    if let Err(error) = handler(STATUS_PORT, msg).await {
                        tracing::warn!(component = SERVER_COMPONENT, %error, "status rejected");
                    }
                }
                Err(error) => {
                    tracing::warn!(component = SERVER_COMPONENT, %error, "status not encodable");
                }
            }
        }
        if let Err(error) = handler(RECONCILE_PORT, Message::null()).await {
            tracing::warn!(component = SERVER_COMPONENT, %error, "reconcile rejected");
        }
    }

    /// Run one server instance. Blocks until the instance stops, so
    /// cancelling the delivery context unwinds the server naturally.
    async fn start(
        &self,
        ctx: CancellationToken,
        params: ServerStart,
        handler: Handler,
    ) -> Result<()> {
        let client = self.client.read().clone().ok_or(FlowError::NoClient)?;
        *self.start_params.write() = params.clone();

        self.stop()?;
        let _running = self.run_lock.lock().await;

        let token = ctx.child_token();
        *self.cancel.lock() = Some(token.clone());

        let suggested_port = self
            .node
            .read()
            .as_ref()
            .and_then(GraphNode::suggested_http_port)
            .unwrap_or(0);

        let listener = match TcpListener::bind(("0.0.0.0", suggested_port)).await {
            Ok(listener) => listener,
            Err(e) => {
                *self.cancel.lock() = None;
                return Err(FlowError::Network {
                    cause: format!("failed to bind port {}: {}", suggested_port, e),
                });
            }
        };
        let local_port = listener
            .local_addr()
            .map_err(|e| FlowError::Network {
                cause: e.to_string(),
            })?
            .port();

        let auto_label = if params.auto_host_name {
            self.node
                .read()
                .as_ref()
                .map(|node| node.auto_host_label().to_string())
        } else {
            None
        };
        let exposed = tokio::time::timeout(
            SHUTDOWN_GRACE,
            client.expose_port(auto_label.as_deref(), &params.hostnames, local_port),
        )
        .await;
        let addrs = match exposed {
            Ok(Ok(urls)) => urls,
            _ => vec![format!("http://localhost:{}", local_port)],
        };
        tracing::info!(
            component = SERVER_COMPONENT,
            port = local_port,
            addrs = ?addrs,
            "http server listening"
        );
        self.set_public_addrs(addrs);
        self.notify(&handler, &params.context).await;

        let env = Arc::new(RequestEnv {
            context: params.context.clone(),
            read_timeout: Duration::from_secs(params.read_timeout),
            pending: Arc::clone(&self.pending),
            handler: handler.clone(),
            token: token.clone(),
        });
        let connection_deadline =
            Duration::from_secs(params.read_timeout.saturating_add(params.write_timeout).max(1));
        let mut sweep = tokio::time::interval(Duration::from_secs(params.read_timeout.max(1)));

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = sweep.tick() => {
                    let purged = self.pending.purge_expired();
                    if purged > 0 {
                        tracing::debug!(component = SERVER_COMPONENT, purged, "purged expired requests");
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        serve_connection(Arc::clone(&env), stream, remote_addr, connection_deadline);
                    }
                    Err(error) => {
                        tracing::error!(component = SERVER_COMPONENT, %error, "accept failed");
                    }
                }
            }
        }

        // unwind: the token may have been cancelled by stop() (already taken
        // out) or through the delivery context
        {
            let mut cancel = self.cancel.lock();
            if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                *cancel = None;
            }
        }
        drop(listener);
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, client.disclose_port(local_port)).await;
        self.set_public_addrs(Vec::new());
        self.notify(&handler, &params.context).await;
        tracing::info!(component = SERVER_COMPONENT, port = local_port, "http server stopped");
        Ok(())
    }
}

fn serve_connection(
    env: Arc<RequestEnv>,
    stream: tokio::net::TcpStream,
    remote_addr: SocketAddr,
    deadline: Duration,
) {
    let token = env.token.clone();
    tokio::spawn(async move {
        let io = TokioIo::new(stream);
        let service = service_fn(move |req| {
            let env = Arc::clone(&env);
            async move {
                Ok::<_, std::convert::Infallible>(handle_request(env, req, remote_addr).await)
            }
        });

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(error) = result {
                    tracing::debug!(component = SERVER_COMPONENT, %error, %remote_addr, "connection error");
                }
            }
            _ = token.cancelled() => {}
            // backstop for the write timeout: a connection may not outlive
            // its read + write budget
            _ = tokio::time::sleep(deadline) => {
                tracing::debug!(component = SERVER_COMPONENT, %remote_addr, "connection deadline exceeded");
            }
        }
    });
}

/// Removes the pending entry when the request task exits, however it exits.
struct PendingGuard {
    pending: Arc<PendingMap>,
    id: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

async fn handle_request(
    env: Arc<RequestEnv>,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> Response<Full<Bytes>> {
    let id = Uuid::new_v4().to_string();
    let (parts, body) = req.into_parts();

    let mut headers: Vec<Header> = parts
        .headers
        .iter()
        .map(|(name, value)| Header {
            key: name.as_str().to_string(),
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        })
        .collect();
    headers.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.value.cmp(&b.value)));

    let header_str = |name: header::HeaderName| {
        parts
            .headers
            .get(&name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let real_ip = header_str(header::HeaderName::from_static("x-forwarded-for"))
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .or_else(|| header_str(header::HeaderName::from_static("x-real-ip")))
        .unwrap_or_else(|| remote_addr.ip().to_string());
    let scheme = header_str(header::HeaderName::from_static("x-forwarded-proto"))
        .unwrap_or_else(|| "http".to_string());
    let host = header_str(header::HOST).unwrap_or_default();
    let content_type = header_str(header::CONTENT_TYPE).unwrap_or_default();

    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(error) => {
            tracing::debug!(component = SERVER_COMPONENT, %error, "failed to read request body");
            return error_response(StatusCode::BAD_REQUEST, "failed to read body");
        }
    };
    let body_value = match types::parse_body(&content_type, &body_bytes) {
        Ok(value) => value,
        Err(cause) => return error_response(StatusCode::BAD_REQUEST, &cause),
    };

    let request = ServerRequest {
        context: env.context.clone(),
        request_id: id.clone(),
        request_uri: parts
            .uri
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_else(|| parts.uri.path().to_string()),
        request_params: types::query_multimap(parts.uri.query().unwrap_or_default()),
        host,
        method: parts.method.to_string(),
        real_ip,
        headers,
        body: body_value,
        scheme,
    };

    let (tx, rx) = oneshot::channel();
    env.pending.insert(&id, tx, env.read_timeout * 2);
    let _cleanup = PendingGuard {
        pending: Arc::clone(&env.pending),
        id: id.clone(),
    };

    let msg = match Message::encode(&request) {
        Ok(msg) => msg,
        Err(error) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string());
        }
    };
    tracing::debug!(
        component = SERVER_COMPONENT,
        request_id = %id,
        method = %request.method,
        uri = %request.request_uri,
        "request received"
    );
    if let Err(error) = (env.handler)(SERVER_REQUEST_PORT, msg).await {
        tracing::debug!(component = SERVER_COMPONENT, request_id = %id, %error, "request rejected");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string());
    }

    tokio::select! {
        received = rx => match received {
            Ok(response) => write_response(response),
            // sender dropped: the entry expired before anyone answered
            Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "read timeout"),
        },
        _ = tokio::time::sleep(env.read_timeout) => {
            tracing::debug!(component = SERVER_COMPONENT, request_id = %id, "read timeout");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "read timeout")
        }
        _ = env.token.cancelled() => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "server stopped")
        }
    }
}

fn write_response(response: ServerResponse) -> Response<Full<Bytes>> {
    let (body, mime) = types::render_body(&response.content_type, &response.body);
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut builder = Response::builder().status(status);
    let mut has_content_type = false;
    for h in &response.headers {
        has_content_type |= h.key.eq_ignore_ascii_case("content-type");
        builder = builder.header(h.key.as_str(), h.value.as_str());
    }
    if !has_content_type {
        builder = builder.header(header::CONTENT_TYPE, mime);
    }
    builder
        .body(Full::new(body))
        .unwrap_or_else(|_| error_response(StatusCode::INTERNAL_SERVER_ERROR, "invalid response"))
}

// infallible: status and header are fixed, the body is plain bytes
fn error_response(status: StatusCode, text: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, types::MIME_TEXT_PLAIN)
        .body(Full::new(Bytes::from(text.to_string())))
        .unwrap()
}

impl Component for HttpServer {
    fn info(&self) -> ComponentInfo {
        ComponentInfo::new(SERVER_COMPONENT)
            .with_description("HTTP Server")
            .with_info(
                "Serves HTTP requests. Each HTTP request creates a message on the \
                 request port. To produce an HTTP response, an incoming message \
                 must find its way to the response port; otherwise the request \
                 times out.",
            )
            .with_tags(&["HTTP", "Server"])
    }

    fn instance(&self) -> Box<dyn Component> {
        Box::new(Self::default())
    }

    fn ports(&self) -> Vec<Port> {
        let settings = self.settings.read().clone();
        let start_params = self.start_params.read().clone();

        let mut ports = vec![
            Port::node(),
            Port::client(),
            Port::settings(&settings),
            Port::sink(SERVER_REQUEST_PORT, "Request")
                .with_position(PortPosition::Right)
                .with_config(&ServerRequest::default()),
            Port::source(SERVER_RESPONSE_PORT, "Response")
                .with_position(PortPosition::Right)
                .with_config(&ServerResponse::default()),
            self.control_port(),
        ];
        if settings.enable_start_port {
            ports.push(
                Port::source(SERVER_START_PORT, "Start")
                    .with_position(PortPosition::Left)
                    .with_config(&start_params),
            );
        }
        if settings.enable_stop_port {
            ports.push(
                Port::source(SERVER_STOP_PORT, "Stop")
                    .with_position(PortPosition::Left)
                    .with_config(&ServerStop::default()),
            );
        }
        if settings.enable_status_port {
            ports.push(
                Port::sink(STATUS_PORT, "Status")
                    .with_position(PortPosition::Bottom)
                    .with_config(&self.status(Value::Null)),
            );
        }
        ports
    }

    fn handle<'a>(
        &'a self,
        ctx: CancellationToken,
        handler: Handler,
        port: &'a str,
        msg: Message,
    ) -> ComponentFuture<'a> {
        Box::pin(async move {
            match port {
                NODE_PORT => {
                    let node = msg
                        .into_node()
                        .ok_or_else(|| FlowError::invalid_message(port, "expected a graph node"))?;
                    *self.node.write() = Some(node);
                    Ok(())
                }
                CLIENT_PORT => {
                    let client = msg.into_client().ok_or_else(|| {
                        FlowError::invalid_message(port, "expected a platform client")
                    })?;
                    *self.client.write() = Some(client);
                    Ok(())
                }
                SETTINGS_PORT => {
                    let settings: ServerSettings = msg.decode_settings(SERVER_COMPONENT)?;
                    *self.settings.write() = settings;
                    Ok(())
                }
                CONTROL_PORT => {
                    let Some(value) = msg.as_value() else {
                        return Err(FlowError::invalid_message(port, "expected a graph value"));
                    };
                    if value.get("start").and_then(Value::as_bool).unwrap_or(false) {
                        let params = self.start_params.read().clone();
                        return self.start(ctx, params, handler).await;
                    }
                    if value.get("stop").and_then(Value::as_bool).unwrap_or(false) {
                        return self.stop();
                    }
                    Ok(())
                }
                SERVER_START_PORT => {
                    let params: ServerStart = msg.decode(port)?;
                    self.start(ctx, params, handler).await
                }
                SERVER_STOP_PORT => self.stop(),
                SERVER_RESPONSE_PORT => {
                    let response: ServerResponse = msg.decode(port)?;
                    let id = response.request_id.clone();
                    match self.pending.take(&id) {
                        Some(sender) => {
                            // a request that gave up mid-flight only drops
                            // its receiver; nothing to report
                            let _ = sender.send(response);
                            Ok(())
                        }
                        None => Err(FlowError::UnknownRequestId { id }),
                    }
                }
                _ => Err(FlowError::unknown_port(port)),
            }
        })
    }
}
