//! End-to-end HTTP server behavior: real sockets, real round trips.

use flowkit_components::http::server::{
    SERVER_REQUEST_PORT, SERVER_RESPONSE_PORT, SERVER_START_PORT, SERVER_STOP_PORT,
    ServerResponse, ServerSettings, ServerStart,
};
use flowkit_components::http::{HttpServer, types};
use flowkit_core::component::ComponentFuture;
use flowkit_core::port::{CLIENT_PORT, SETTINGS_PORT};
use flowkit_core::prelude::*;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A platform client that records the exposed port for the test to find.
#[derive(Default)]
struct RecordingClient {
    exposed: parking_lot::Mutex<Option<u16>>,
    disclosed: parking_lot::Mutex<Option<u16>>,
}

impl PlatformClient for RecordingClient {
    fn expose_port<'a>(
        &'a self,
        _auto_host_name: Option<&'a str>,
        _hostnames: &'a [String],
        local_port: u16,
    ) -> ComponentFuture<'a, Vec<String>> {
        Box::pin(async move {
            *self.exposed.lock() = Some(local_port);
            Ok(vec![format!("http://localhost:{}", local_port)])
        })
    }

    fn disclose_port<'a>(&'a self, local_port: u16) -> ComponentFuture<'a, ()> {
        Box::pin(async move {
            *self.disclosed.lock() = Some(local_port);
            Ok(())
        })
    }
}

struct TestServer {
    server: Arc<HttpServer>,
    client: Arc<RecordingClient>,
    ctx: CancellationToken,
    port: u16,
}

impl TestServer {
    /// Start a fresh server wired to `on_request`, which receives every
    /// message the component emits (request, status, reconcile).
    async fn start(settings: ServerSettings, start: ServerStart, on_request: Handler) -> Self {
        Self::start_with(Arc::new(HttpServer::default()), settings, start, on_request).await
    }

    /// Like [`TestServer::start`] but reuses an already-created component so
    /// the request handler can talk back to it.
    async fn start_with(
        server: Arc<HttpServer>,
        settings: ServerSettings,
        start: ServerStart,
        on_request: Handler,
    ) -> Self {
        let client = Arc::new(RecordingClient::default());
        let ctx = CancellationToken::new();

        server
            .handle(
                ctx.clone(),
                noop_handler(),
                SETTINGS_PORT,
                Message::encode(&settings).unwrap(),
            )
            .await
            .unwrap();
        server
            .handle(
                ctx.clone(),
                noop_handler(),
                CLIENT_PORT,
                Message::Client(client.clone()),
            )
            .await
            .unwrap();

        let start_server = Arc::clone(&server);
        let start_ctx = ctx.clone();
        tokio::spawn(async move {
            start_server
                .handle(
                    start_ctx,
                    on_request,
                    SERVER_START_PORT,
                    Message::encode(&start).unwrap(),
                )
                .await
        });

        // wait for the listener to come up and expose its port
        let deadline = Instant::now() + Duration::from_secs(5);
        let port = loop {
            if let Some(port) = *client.exposed.lock() {
                break port;
            }
            assert!(Instant::now() < deadline, "server did not start in time");
            tokio::time::sleep(Duration::from_millis(10)).await;
        };

        Self {
            server,
            client,
            ctx,
            port,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.ctx.cancel();
    }
}

/// A handler that answers every request through the component's response
/// port with the given status/body.
fn responder(
    server: Arc<HttpServer>,
    status_code: u16,
    content_type: &'static str,
    body: Value,
) -> Handler {
    handler_fn(move |port, msg| {
        let server = server.clone();
        let body = body.clone();
        async move {
            if port != SERVER_REQUEST_PORT {
                return Ok(());
            }
            let request = msg.as_value().cloned().unwrap_or(Value::Null);
            let request_id = request["requestID"].as_str().unwrap_or_default().to_string();
            let response = ServerResponse {
                request_id,
                status_code,
                content_type: content_type.into(),
                headers: Vec::new(),
                body,
            };
            server
                .handle(
                    CancellationToken::new(),
                    noop_handler(),
                    SERVER_RESPONSE_PORT,
                    Message::encode(&response).unwrap(),
                )
                .await
        }
    })
}

#[tokio::test]
async fn round_trip_with_matching_response() {
    let server = Arc::new(HttpServer::default());
    let handler = responder(server.clone(), 204, types::MIME_APPLICATION_JSON, Value::Null);

    // reuse the prepared component inside the harness
    let harness = TestServer::start_with(server, ServerSettings::default(), start_params(5), handler).await;

    let started = Instant::now();
    let response = reqwest::get(harness.url("/hello")).await.unwrap();
    assert_eq!(response.status().as_u16(), 204);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn round_trip_with_body_and_content_type() {
    let server = Arc::new(HttpServer::default());
    let handler = responder(
        server.clone(),
        200,
        types::MIME_APPLICATION_JSON,
        json!({"ok": true}),
    );
    let harness =
        TestServer::start_with(server, ServerSettings::default(), start_params(5), handler).await;

    let response = reqwest::Client::new()
        .post(harness.url("/submit"))
        .json(&json!({"payload": 42}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers()[reqwest::header::CONTENT_TYPE],
        types::MIME_APPLICATION_JSON
    );
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"ok": true}));
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let harness = TestServer::start(
        ServerSettings::default(),
        start_params(1),
        noop_handler(),
    )
    .await;

    let started = Instant::now();
    let response = reqwest::get(harness.url("/never")).await.unwrap();

    assert_eq!(response.status().as_u16(), 500);
    assert!(response.text().await.unwrap().contains("read timeout"));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(900), "timed out too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "timed out too late: {:?}", elapsed);
}

#[tokio::test]
async fn timed_out_request_is_no_longer_pending() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let capture = handler_fn(move |port, msg| {
        let tx = tx.clone();
        async move {
            if port == SERVER_REQUEST_PORT {
                let _ = tx.send(msg.as_value().cloned().unwrap_or(Value::Null));
            }
            Ok(())
        }
    });
    let harness = TestServer::start(ServerSettings::default(), start_params(1), capture).await;

    let response = reqwest::get(harness.url("/expired")).await.unwrap();
    assert_eq!(response.status().as_u16(), 500);
    let request = rx.recv().await.unwrap();
    let id = request["requestID"].as_str().unwrap().to_string();

    // answering after the timeout is a protocol error: the entry is gone
    let late = ServerResponse {
        request_id: id.clone(),
        ..ServerResponse::default()
    };
    let err = harness
        .server
        .handle(
            CancellationToken::new(),
            noop_handler(),
            SERVER_RESPONSE_PORT,
            Message::encode(&late).unwrap(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::UnknownRequestId { id: ref seen } if *seen == id));
}

#[tokio::test]
async fn concurrent_requests_get_distinct_ids() {
    let ids = Arc::new(parking_lot::Mutex::new(HashSet::new()));
    let sink = ids.clone();
    let capture = handler_fn(move |port, msg| {
        let sink = sink.clone();
        async move {
            if port == SERVER_REQUEST_PORT {
                if let Some(value) = msg.as_value() {
                    sink.lock()
                        .insert(value["requestID"].as_str().unwrap_or_default().to_string());
                }
            }
            Ok(())
        }
    });
    let harness = TestServer::start(ServerSettings::default(), start_params(1), capture).await;

    let mut requests = Vec::new();
    for i in 0..8 {
        let url = harness.url(&format!("/r/{}", i));
        requests.push(tokio::spawn(async move { reqwest::get(url).await }));
    }
    for request in requests {
        let _ = request.await.unwrap();
    }

    assert_eq!(ids.lock().len(), 8);
}

#[tokio::test]
async fn stop_is_idempotent_and_discloses_the_port() {
    let settings = ServerSettings {
        enable_stop_port: true,
        ..ServerSettings::default()
    };
    let harness = TestServer::start(settings, start_params(2), noop_handler()).await;
    let port = harness.port;

    harness
        .server
        .handle(
            CancellationToken::new(),
            noop_handler(),
            SERVER_STOP_PORT,
            Message::encode(&json!({})).unwrap(),
        )
        .await
        .unwrap();

    // the listener unwinds and the port is disclosed back to the platform
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if *harness.client.disclosed.lock() == Some(port) {
            break;
        }
        assert!(Instant::now() < deadline, "port was never disclosed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // stopping an already-stopped server is a no-op
    harness
        .server
        .handle(
            CancellationToken::new(),
            noop_handler(),
            SERVER_STOP_PORT,
            Message::encode(&json!({})).unwrap(),
        )
        .await
        .unwrap();

    let err = reqwest::Client::new()
        .get(harness.url("/down"))
        .timeout(Duration::from_millis(500))
        .send()
        .await;
    assert!(err.is_err(), "server still accepting after stop");
}

#[tokio::test]
async fn request_message_carries_decoded_body_and_metadata() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let capture = handler_fn(move |port, msg| {
        let tx = tx.clone();
        async move {
            if port == SERVER_REQUEST_PORT {
                let _ = tx.send(msg.as_value().cloned().unwrap_or(Value::Null));
            }
            Ok(())
        }
    });
    let harness = TestServer::start(ServerSettings::default(), start_params(1), capture).await;

    let _ = reqwest::Client::new()
        .post(harness.url("/ingest?tag=a&tag=b"))
        .header("x-probe", "1")
        .json(&json!({"n": 7}))
        .send()
        .await
        .unwrap();

    let request = rx.recv().await.unwrap();
    assert_eq!(request["method"], "POST");
    assert_eq!(request["requestURI"], "/ingest?tag=a&tag=b");
    assert_eq!(request["requestParams"], json!({"tag": ["a", "b"]}));
    assert_eq!(request["body"], json!({"n": 7}));
    assert_eq!(request["scheme"], "http");

    let headers = request["headers"].as_array().unwrap();
    let keys: Vec<&str> = headers
        .iter()
        .map(|h| h["key"].as_str().unwrap())
        .collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(keys, sorted, "headers must arrive sorted");
    assert!(keys.contains(&"x-probe"));
}

fn start_params(read_timeout: u64) -> ServerStart {
    ServerStart {
        read_timeout,
        write_timeout: 5,
        auto_host_name: false,
        ..ServerStart::default()
    }
}
