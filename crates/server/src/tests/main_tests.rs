use super::*;
use axum::{
    body::{self, Body},
    http::Request,
    response::Response,
};
use tower::ServiceExt;

async fn test_app() -> Router {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    app_with(ApiContext::new(storage))
}

fn app_with(api: ApiContext) -> Router {
    let metrics = Metrics::new("calculator").expect("metrics");
    let cors = build_cors_layer("*").expect("cors");
    build_router(Arc::new(AppState { api, metrics }), cors)
}

async fn fetch(app: &Router, uri: &str) -> Response {
    let request = Request::get(uri).body(Body::empty()).expect("request");
    app.clone().oneshot(request).await.expect("response")
}

async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

async fn history_len(app: &Router) -> usize {
    let response = fetch(app, "/calculator/history").await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body::<HistoryResponse>(response).await.history.len()
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = test_app().await;
    let response = fetch(&app, "/healthz").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn empty_history_is_an_empty_list() {
    let app = test_app().await;
    let response = fetch(&app, "/calculator/history").await;
    assert_eq!(response.status(), StatusCode::OK);

    let value: serde_json::Value = json_body(response).await;
    assert_eq!(value, serde_json::json!({ "history": [] }));
}

#[tokio::test]
async fn sum_route_returns_resultado_and_records_history() {
    let app = test_app().await;
    let response = fetch(&app, "/calculator/sum?a=2&b=3").await;
    assert_eq!(response.status(), StatusCode::OK);
    let value: serde_json::Value = json_body(response).await;
    assert_eq!(value["resultado"], serde_json::json!(5.0));

    let response = fetch(&app, "/calculator/history").await;
    let value: serde_json::Value = json_body(response).await;
    let last = value["history"]
        .as_array()
        .and_then(|h| h.last())
        .cloned()
        .expect("record");
    assert_eq!(last["operation"], "sum");
    assert_eq!(last["a"], serde_json::json!(2.0));
    assert_eq!(last["b"], serde_json::json!(3.0));
    assert_eq!(last["result"], serde_json::json!(5.0));
    assert!(last["date"].as_str().is_some_and(|d| !d.is_empty()));
}

#[tokio::test]
async fn every_operation_route_computes() {
    let app = test_app().await;
    let cases = [
        ("sum", "a=1.5&b=2", 3.5),
        ("rest", "a=1&b=4", -3.0),
        ("multiply", "a=-4&b=2.5", -10.0),
        ("divide", "a=9&b=2", 4.5),
    ];
    for (route, query, expected) in cases {
        let response = fetch(&app, &format!("/calculator/{route}?{query}")).await;
        assert_eq!(response.status(), StatusCode::OK, "{route}");
        let dto: ComputeResponse = json_body(response).await;
        assert_eq!(dto.resultado, expected, "{route}");
    }

    let response = fetch(&app, "/calculator/history").await;
    let dto: HistoryResponse = json_body(response).await;
    let tokens: Vec<&str> = dto.history.iter().map(|r| r.operation.as_str()).collect();
    assert_eq!(tokens, vec!["sum", "rest", "multiply", "divide"]);
}

#[tokio::test]
async fn divide_by_zero_is_a_client_error_without_history() {
    let app = test_app().await;
    let response = fetch(&app, "/calculator/divide?a=10&b=0").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::DivisionByZero);

    assert_eq!(history_len(&app).await, 0);
}

#[tokio::test]
async fn missing_or_malformed_operands_are_rejected() {
    let app = test_app().await;
    for uri in [
        "/calculator/sum",
        "/calculator/sum?a=1",
        "/calculator/rest?a=&b=2",
        "/calculator/multiply?a=two&b=2",
        "/calculator/divide?a=NaN&b=2",
        "/calculator/sum?a=inf&b=2",
    ] {
        let response = fetch(&app, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let err: ApiError = json_body(response).await;
        assert_eq!(err.code, ErrorCode::InvalidOperand, "{uri}");
    }

    assert_eq!(history_len(&app).await, 0);
}

#[tokio::test]
async fn unknown_operation_is_not_found() {
    let app = test_app().await;
    let response = fetch(&app, "/calculator/power?a=2&b=8").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::UnknownOperation);

    assert_eq!(history_len(&app).await, 0);
}

#[tokio::test]
async fn history_limit_keeps_newest_oldest_first() {
    let app = test_app().await;
    for a in 1..=4 {
        let response = fetch(&app, &format!("/calculator/sum?a={a}&b=0")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = fetch(&app, "/calculator/history?limit=2").await;
    assert_eq!(response.status(), StatusCode::OK);
    let dto: HistoryResponse = json_body(response).await;
    let operands: Vec<f64> = dto.history.iter().map(|r| r.a).collect();
    assert_eq!(operands, vec![3.0, 4.0]);
}

#[tokio::test]
async fn memory_backend_serves_the_same_surface() {
    let app = app_with(ApiContext::new(MemoryHistory::new()));
    let response = fetch(&app, "/calculator/multiply?a=3&b=3").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(history_len(&app).await, 1);
}

#[tokio::test]
async fn metrics_count_successes_and_errors() {
    let app = test_app().await;
    fetch(&app, "/calculator/sum?a=1&b=1").await;
    fetch(&app, "/calculator/divide?a=1&b=0").await;
    fetch(&app, "/calculator/nope?a=1&b=1").await;

    let response = fetch(&app, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let text = String::from_utf8(bytes.to_vec()).expect("utf8");
    assert!(text.contains(r#"calculator_operation_total{operation="sum",status="success"} 1"#));
    assert!(text.contains(r#"calculator_operation_total{operation="divide",status="error"} 1"#));
    assert!(text.contains(r#"calculator_operation_total{operation="unknown",status="error"} 1"#));
}

#[tokio::test]
async fn cors_allows_any_origin_by_default() {
    let app = test_app().await;
    let request = Request::get("/calculator/history")
        .header(header::ORIGIN, "http://localhost:5173")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[test]
fn cors_rejects_malformed_origin() {
    assert!(build_cors_layer("http://ok.example, bad\norigin").is_err());
}

#[tokio::test]
async fn concurrent_requests_lose_no_records() {
    let app = test_app().await;
    let mut tasks = Vec::new();
    for a in 0..32 {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            fetch(&app, &format!("/calculator/sum?a={a}&b=1")).await.status()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.expect("join"), StatusCode::OK);
    }

    assert_eq!(history_len(&app).await, 32);
}

#[tokio::test]
async fn malformed_query_strings_get_json_errors() {
    let app = test_app().await;
    for uri in [
        "/calculator/history?limit=abc",
        "/calculator/history?limit=-1",
        "/calculator/sum?a=1&a=2&b=3",
    ] {
        let response = fetch(&app, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let err: ApiError = json_body(response).await;
        assert_eq!(err.code, ErrorCode::InvalidQuery, "{uri}");
    }

    let response = fetch(&app, "/calculator/power?a=1&a=2").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(history_len(&app).await, 0);
}

#[tokio::test]
async fn negative_zero_echo_matches_history() {
    let app = test_app().await;
    let response = fetch(&app, "/calculator/multiply?a=-0&b=5").await;
    assert_eq!(response.status(), StatusCode::OK);
    let dto: ComputeResponse = json_body(response).await;

    let response = fetch(&app, "/calculator/history").await;
    let history: HistoryResponse = json_body(response).await;
    let record = history.history.last().expect("record");
    assert_eq!(dto.a.to_bits(), record.a.to_bits());
    assert_eq!(dto.resultado.to_bits(), record.result.to_bits());
}
