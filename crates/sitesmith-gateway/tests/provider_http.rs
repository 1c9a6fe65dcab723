//! Gateway behaviour against an in-process provider stand-in.
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sitesmith_core::{CancellationToken, SmithError};
use sitesmith_gateway::{
    call_structured, AnthropicGateway, CallOptions, GatewayConfig, LlmGateway, Message, MockGateway,
    RetryPolicy,
};

#[derive(Clone, Default)]
struct Provider {
    hits: Arc<AtomicUsize>,
    last_body: Arc<Mutex<Option<Value>>>,
    last_headers: Arc<Mutex<Option<HeaderMap>>>,
}

impl Provider {
    fn record(&self, headers: HeaderMap, body: Value) -> usize {
        *self.last_body.lock().unwrap() = Some(body);
        *self.last_headers.lock().unwrap() = Some(headers);
        self.hits.fetch_add(1, Ordering::SeqCst)
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        jitter: 0.0,
    }
}

fn config(base: &str) -> GatewayConfig {
    GatewayConfig::new("test-key").with_base_url(base).with_retry(fast_retry())
}

fn text_reply(text: &str) -> Value {
    json!({
        "content": [{"type": "text", "text": text}],
        "usage": {"input_tokens": 12, "cache_read_input_tokens": 8, "output_tokens": 3}
    })
}

fn messages() -> Vec<Message> {
    vec![Message::system("You are terse."), Message::user("Say hello")]
}

async fn rate_limited_once(
    State(provider): State<Provider>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if provider.record(headers, body) == 0 {
        (StatusCode::TOO_MANY_REQUESTS, "rate limited").into_response()
    } else {
        Json(text_reply("hello")).into_response()
    }
}

async fn always_overloaded(
    State(provider): State<Provider>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    provider.record(headers, body);
    (StatusCode::from_u16(529).unwrap(), "overloaded").into_response()
}

async fn bad_request(
    State(provider): State<Provider>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    provider.record(headers, body);
    (StatusCode::BAD_REQUEST, "max_tokens too large").into_response()
}

async fn slow(State(provider): State<Provider>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    provider.record(headers, body);
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(text_reply("late")).into_response()
}

const STREAM_BODY: &str = "event: message_start\n\
data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":50,\"cache_read_input_tokens\":40}}}\n\n\
event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"<!DOCTYPE html>\"}}\n\n\
data: {not json\n\n\
event: ping\n\
data: {\"type\":\"ping\"}\n\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"<html></html>\"}}\n\n\
data: {\"type\":\"message_delta\",\"usage\":{\"output_tokens\":9}}\n\n\
data: [DONE]\n\n";

async fn streaming(
    State(provider): State<Provider>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if provider.record(headers, body) == 0 {
        return (StatusCode::TOO_MANY_REQUESTS, "rate limited").into_response();
    }
    ([(header::CONTENT_TYPE, "text/event-stream")], STREAM_BODY).into_response()
}

fn router(provider: &Provider, handler: axum::routing::MethodRouter<Provider>) -> Router {
    Router::new()
        .route("/v1/messages", handler)
        .with_state(provider.clone())
}

#[tokio::test]
async fn test_rate_limit_is_retried_then_succeeds() {
    let provider = Provider::default();
    let base = spawn(router(&provider, post(rate_limited_once))).await;
    let gateway = AnthropicGateway::new(config(&base)).unwrap();

    let text = gateway.call(&messages(), &CallOptions::new("test")).await.unwrap();
    assert_eq!(text, "hello");
    assert_eq!(provider.hits(), 2);

    let headers = provider.last_headers.lock().unwrap().clone().unwrap();
    assert_eq!(headers["x-api-key"], "test-key");
    assert_eq!(headers["anthropic-version"], "2023-06-01");
    assert_eq!(headers["anthropic-beta"], "prompt-caching-2024-07-31");

    let body = provider.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "claude-sonnet-4-5-20250929");
    assert_eq!(body["system"][0]["text"], "You are terse.");
    assert_eq!(body["system"][0]["cache_control"]["type"], "ephemeral");
    assert_eq!(body["messages"][0]["content"], "Say hello");
}

#[tokio::test]
async fn test_overload_retries_are_bounded() {
    let provider = Provider::default();
    let base = spawn(router(&provider, post(always_overloaded))).await;
    let gateway = AnthropicGateway::new(config(&base)).unwrap();

    let err = gateway.call(&messages(), &CallOptions::new("test")).await.unwrap_err();
    assert!(matches!(err, SmithError::Overloaded(_)));
    assert_eq!(provider.hits(), 3);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let provider = Provider::default();
    let base = spawn(router(&provider, post(bad_request))).await;
    let gateway = AnthropicGateway::new(config(&base)).unwrap();

    let err = gateway.call(&messages(), &CallOptions::new("test")).await.unwrap_err();
    match err {
        SmithError::Provider { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("max_tokens"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(provider.hits(), 1);
}

#[tokio::test]
async fn test_buffered_timeout_is_typed() {
    let provider = Provider::default();
    let base = spawn(router(&provider, post(slow))).await;
    let mut cfg = config(&base);
    cfg.buffered_timeout = Duration::from_millis(100);
    let gateway = AnthropicGateway::new(cfg).unwrap();

    let err = gateway.call(&messages(), &CallOptions::new("test")).await.unwrap_err();
    assert!(matches!(err, SmithError::Timeout(_)));
    assert_eq!(provider.hits(), 1);
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_call() {
    let provider = Provider::default();
    let base = spawn(router(&provider, post(slow))).await;
    let gateway = AnthropicGateway::new(config(&base)).unwrap();

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = gateway
        .call(&messages(), &CallOptions::new("test").cancel(token))
        .await
        .unwrap_err();
    assert_eq!(err, SmithError::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_streaming_accumulates_deltas_and_skips_bad_events() {
    let provider = Provider::default();
    let base = spawn(router(&provider, post(streaming))).await;
    let gateway = AnthropicGateway::new(config(&base)).unwrap();

    let mut deltas: Vec<String> = Vec::new();
    let mut snapshots: Vec<String> = Vec::new();
    let text = gateway
        .call_streaming(&messages(), &CallOptions::new("codegen"), &mut |delta: &str, acc: &str| {
            deltas.push(delta.to_string());
            snapshots.push(acc.to_string());
        })
        .await
        .unwrap();

    assert_eq!(text, "<!DOCTYPE html><html></html>");
    assert_eq!(deltas, vec!["<!DOCTYPE html>", "<html></html>"]);
    assert_eq!(snapshots.last().unwrap(), &text);
    // First attempt was rate limited before the stream opened.
    assert_eq!(provider.hits(), 2);

    let body = provider.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["stream"], true);
}

#[tokio::test]
async fn test_call_structured_tolerates_fences() {
    #[derive(serde::Deserialize)]
    struct Probe {
        mood: String,
    }

    let gateway = MockGateway::new().respond("intent", "```json\n{\"mood\": \"clean_minimal\"}\n```");
    let probe: Probe = call_structured(&gateway, &messages(), &CallOptions::new("intent"))
        .await
        .unwrap();
    assert_eq!(probe.mood, "clean_minimal");

    let failing = MockGateway::new().respond("intent", "no json here");
    let err = call_structured::<Probe>(&failing, &messages(), &CallOptions::new("intent"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, SmithError::Parse { .. }));
}
