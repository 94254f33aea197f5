//! Proxy stage behaviour against live mock upstreams.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use routegate::error::BoxError;
use routegate::observability::PROXY_ACCESS_TARGET;
use routegate::routing::HandlerResult;
use routegate::{
    Dispatcher, MethodRoute, ProxyContext, ProxyRule, ProxyVerdict, RequestContext,
    RouteRegistration, RouteTable,
};

mod common;
use common::{body_json, body_text, request, send};

fn rule_to(pattern: &str, addr: std::net::SocketAddr) -> ProxyRule {
    ProxyRule::new(pattern)
        .unwrap()
        .target(format!("http://{addr}"))
        .timeout(Duration::from_secs(2))
}

fn dispatcher_with(rule: ProxyRule) -> Dispatcher {
    Dispatcher::builder().proxy_rule(rule).build().unwrap()
}

async fn local(_ctx: RequestContext) -> HandlerResult {
    Ok("local".into_response())
}

fn local_routes() -> RouteTable {
    let (routes, _) = RouteTable::from_registrations(vec![
        RouteRegistration::new(["api", "users"]).on(Method::GET, MethodRoute::new(local))
    ]);
    routes
}

async fn skip(_ctx: ProxyContext) -> Result<ProxyVerdict, BoxError> {
    Ok(ProxyVerdict::Skip)
}

async fn block(_ctx: ProxyContext) -> Result<ProxyVerdict, BoxError> {
    Ok(ProxyVerdict::block(
        (StatusCode::FORBIDDEN, "tenant suspended").into_response(),
    ))
}

async fn fail(_ctx: ProxyContext) -> Result<ProxyVerdict, BoxError> {
    Err("auth backend down".into())
}

async fn explode(_ctx: ProxyContext) -> Result<ProxyVerdict, BoxError> {
    panic!("interceptor bug")
}

#[tokio::test]
async fn test_forwards_and_relays_status_and_body() {
    let backend = common::start_programmable_backend(|| async { (201, "created".to_string()) }).await;
    let dispatcher = dispatcher_with(rule_to("/api/*", backend));

    let response = send(&dispatcher, request("POST", "/api/items?x=1")).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_text(response).await, "created");
}

#[tokio::test]
async fn test_preserves_method_path_query_and_body() {
    let backend = common::start_echo_backend().await;
    let dispatcher = dispatcher_with(rule_to("/api/*", backend));

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/users/7?expand=roles&expand=teams")
        .body(Body::from(r#"{"name":"ada"}"#))
        .unwrap();
    let echoed = body_json(send(&dispatcher, request).await).await;

    assert_eq!(echoed["method"], "PUT");
    assert_eq!(echoed["target"], "/api/users/7?expand=roles&expand=teams");
    assert_eq!(echoed["body"], r#"{"name":"ada"}"#);
}

#[tokio::test]
async fn test_header_merge_order() {
    let backend = common::start_echo_backend().await;
    let rule = rule_to("/api/*", backend)
        .header("x-gateway".parse().unwrap(), HeaderValue::from_static("rule"))
        .header("x-tier".parse().unwrap(), HeaderValue::from_static("rule"))
        .handler(|_ctx: ProxyContext| async {
            Ok::<_, BoxError>(
                ProxyVerdict::proceed()
                    .with_header("x-gateway".parse().unwrap(), HeaderValue::from_static("verdict")),
            )
        });
    let dispatcher = dispatcher_with(rule);

    let request = Request::builder()
        .uri("/api/x")
        .header("x-gateway", "client")
        .header("x-client", "kept")
        .header("connection", "x-session")
        .header("x-session", "secret")
        .header("proxy-authorization", "Basic abc")
        .body(Body::empty())
        .unwrap();
    let echoed = body_json(send(&dispatcher, request).await).await;
    let headers = &echoed["headers"];

    assert_eq!(headers["x-gateway"], "verdict");
    assert_eq!(headers["x-tier"], "rule");
    assert_eq!(headers["x-client"], "kept");
    assert!(headers.get("x-session").is_none());
    assert!(headers.get("proxy-authorization").is_none());
}

#[tokio::test]
async fn test_interceptor_sees_params_and_target() {
    let backend = common::start_echo_backend().await;
    let expected_target = format!("http://{backend}");
    let rule = rule_to("/tenants/*/services/*/data", backend).handler(move |ctx: ProxyContext| {
        let expected_target = expected_target.clone();
        async move {
            assert_eq!(ctx.params["param0"], "premium");
            assert_eq!(ctx.params["param1"], "auth");
            assert_eq!(ctx.target.as_deref(), Some(expected_target.as_str()));
            Ok::<_, BoxError>(ProxyVerdict::proceed())
        }
    });
    let dispatcher = dispatcher_with(rule);

    let response = send(&dispatcher, request("GET", "/tenants/premium/services/auth/data")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_verdict_target_and_request_override() {
    let backend = common::start_echo_backend().await;
    let unused = common::unused_addr().await;
    let new_target = format!("http://{backend}/");
    let rule = rule_to("/api/*", unused).handler(move |ctx: ProxyContext| {
        let new_target = new_target.clone();
        async move {
            let replaced = ctx.request.clone().with_body("rewritten");
            Ok::<_, BoxError>(
                ProxyVerdict::proceed()
                    .with_target(new_target)
                    .with_request(replaced),
            )
        }
    });
    let dispatcher = dispatcher_with(rule);

    let response = send(&dispatcher, request("POST", "/api/x")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let echoed = body_json(response).await;
    assert_eq!(echoed["target"], "/api/x");
    assert_eq!(echoed["body"], "rewritten");
}

#[tokio::test]
async fn test_timeout_returns_502_within_bound() {
    let (backend, accepted) = common::start_silent_backend().await;
    let rule = rule_to("/api/*", backend)
        .timeout(Duration::from_millis(300))
        .retries(1);
    let dispatcher = dispatcher_with(rule);

    let started = Instant::now();
    let response = send(&dispatcher, request("GET", "/api/slow")).await;
    let elapsed = started.elapsed();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(elapsed >= Duration::from_millis(600), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "elapsed {elapsed:?}");

    let body = body_json(response).await;
    assert_eq!(body["status"], 502);
    assert_eq!(body["error"], "Bad Gateway");
    assert_eq!(body["message"], "upstream request timed out");
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_transport_failures_retried_exactly() {
    let (backend, accepted) = common::start_dropping_backend().await;
    let dispatcher = dispatcher_with(rule_to("/api/*", backend).retries(2));

    let response = send(&dispatcher, request("GET", "/api/x")).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["message"], "upstream service unreachable");
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_unreachable_hides_transport_error() {
    let unused = common::unused_addr().await;
    let dispatcher = dispatcher_with(rule_to("/api/*", unused).retries(1));

    let response = send(&dispatcher, request("GET", "/api/x")).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let text = body_text(response).await;
    assert!(!text.to_lowercase().contains("connection refused"));
    assert!(!text.contains("127.0.0.1"));
}

#[tokio::test]
async fn test_upstream_errors_are_relayed_not_retried() {
    let (backend, calls) = common::start_counting_backend(503).await;
    let dispatcher = dispatcher_with(rule_to("/api/*", backend).retries(3));

    let response = send(&dispatcher, request("GET", "/api/x")).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_text(response).await, "status 503");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_skip_falls_through_to_local_routes() {
    let (backend, calls) = common::start_counting_backend(200).await;
    let dispatcher = Dispatcher::builder()
        .routes(local_routes())
        .proxy_rule(rule_to("/api/*", backend).handler(skip))
        .build()
        .unwrap();

    let response = send(&dispatcher, request("GET", "/api/users")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "local");

    let response = send(&dispatcher, request("GET", "/api/orders")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["status"], 404);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_block_makes_no_upstream_call() {
    let (backend, calls) = common::start_counting_backend(200).await;
    let dispatcher = dispatcher_with(rule_to("/api/*", backend).handler(block));

    let response = send(&dispatcher, request("GET", "/api/x")).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, "tenant suspended");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_target_is_misconfigured() {
    let dispatcher = dispatcher_with(ProxyRule::new("/api/*").unwrap());

    let response = send(&dispatcher, request("GET", "/api/x")).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        body_json(response).await["message"],
        "proxy rule has no upstream target"
    );
}

#[tokio::test]
async fn test_interceptor_failures_are_500() {
    let (backend, calls) = common::start_counting_backend(200).await;

    for dispatcher in [
        dispatcher_with(rule_to("/api/*", backend).handler(fail).retries(3)),
        dispatcher_with(rule_to("/api/*", backend).handler(explode).retries(3)),
    ] {
        let response: Response = send(&dispatcher, request("GET", "/api/x")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = body_text(response).await;
        assert!(!text.contains("auth backend down"));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_disabled_rule_is_ignored() {
    let (backend, calls) = common::start_counting_backend(200).await;
    let dispatcher = Dispatcher::builder()
        .routes(local_routes())
        .proxy_rule(rule_to("/api/*", backend).enabled(false))
        .build()
        .unwrap();

    let response = send(&dispatcher, request("GET", "/api/users")).await;
    assert_eq!(body_text(response).await, "local");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_first_matching_rule_wins() {
    let first = common::start_mock_backend("first").await;
    let second = common::start_mock_backend("second").await;
    let dispatcher = Dispatcher::builder()
        .proxy_rule(rule_to("/api/*", first))
        .proxy_rule(rule_to("/api/special", second))
        .build()
        .unwrap();

    let response = send(&dispatcher, request("GET", "/api/special")).await;
    assert_eq!(body_text(response).await, "first");
}

#[tokio::test]
async fn test_oversized_upstream_body_is_502_not_retried() {
    let (backend, calls) = common::start_counting_backend(200).await;
    let dispatcher = Dispatcher::builder()
        .proxy_rule(rule_to("/api/*", backend).retries(2))
        .max_response_bytes(4)
        .build()
        .unwrap();

    let response = send(&dispatcher, request("GET", "/api/big")).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["message"], "upstream response too large");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_access_log_follows_rule_flag() {
    let logs = common::CapturedLogs::default();
    let _guard = logs.install();

    let backend = common::start_mock_backend("ok").await;
    let (silent, _) = common::start_silent_backend().await;
    let dispatcher = Dispatcher::builder()
        .proxy_rule(rule_to("/logged/*", backend).logging(true))
        .proxy_rule(rule_to("/quiet/*", backend))
        .proxy_rule(
            rule_to("/slow/*", silent)
                .timeout(Duration::from_millis(200))
                .logging(true),
        )
        .build()
        .unwrap();

    let response = send(&dispatcher, request("GET", "/logged/a")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(&dispatcher, request("GET", "/quiet/a")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(&dispatcher, request("POST", "/slow/a")).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let records = logs.records(PROXY_ACCESS_TARGET);
    assert_eq!(records.len(), 2, "{records:?}");

    let success = &records[0]["fields"];
    assert_eq!(success["outcome"], "success");
    assert_eq!(success["method"], "GET");
    assert_eq!(success["path"], "/logged/a");
    assert_eq!(success["upstream"], format!("http://{backend}"));

    let timeout = &records[1]["fields"];
    assert_eq!(timeout["outcome"], "timeout");
    assert_eq!(timeout["method"], "POST");
    assert_eq!(timeout["path"], "/slow/a");
    assert_eq!(timeout["upstream"], format!("http://{silent}"));
}
