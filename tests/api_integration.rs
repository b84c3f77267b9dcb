use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chatrelay::analysis::PriceAnalyzer;
use chatrelay::api::{build_routes, AppState};
use chatrelay::config::{AnalysisConfig, LlmConfig, MarketConfig};
use chatrelay::core::{ChatService, Dispatcher};
use chatrelay::llm::{
    Completion, CompletionRequest, GenerationStats, LlmError, ModelRouter, Provider, StopReason,
    Turn, Usage,
};
use chatrelay::market::MarketClient;
use chatrelay::storage::sqlite::SqliteStorage;
use chatrelay::storage::{Role, Storage};
use chatrelay::tools::Toolbox;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Answers every request with the same text and counts calls.
struct EchoProvider {
    calls: AtomicUsize,
}

impl EchoProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let last = request.turns.last().map(Turn::joined_text).unwrap_or_default();
        Ok(Completion {
            generation_id: format!("gen-{}", n),
            message: Turn::text(Role::Assistant, format!("echo: {}", last)),
            stop_reason: StopReason::EndTurn,
            usage: Some(Usage::new(12, 8)),
        })
    }

    async fn generation_stats(&self, _generation_id: &str) -> Result<GenerationStats, LlmError> {
        Ok(GenerationStats {
            tokens_prompt: Some(12),
            tokens_completion: Some(8),
            total_cost: Some(0.0001),
        })
    }
}

struct TestApp {
    app: Router,
    storage: SqliteStorage,
    primary: Arc<EchoProvider>,
    secondary: Arc<EchoProvider>,
}

async fn test_app(market_url: &str) -> TestApp {
    let storage = SqliteStorage::new(":memory:").await.unwrap();
    let primary = EchoProvider::new();
    let secondary = EchoProvider::new();

    let dispatcher = Dispatcher::new(
        ModelRouter::new(&LlmConfig::default()).unwrap(),
        primary.clone(),
        secondary.clone(),
        Arc::new(Toolbox::empty()),
        Duration::ZERO,
    );
    let market = MarketClient::new(&MarketConfig {
        base_url: market_url.to_string(),
    })
    .unwrap();

    let state = Arc::new(AppState {
        chat: ChatService::new(storage.clone(), dispatcher),
        analyzer: PriceAnalyzer::new(market, AnalysisConfig::default()),
    });

    TestApp {
        app: build_routes(state, true),
        storage,
        primary,
        secondary,
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let t = test_app("http://127.0.0.1:9").await;
    let (status, body) = send(&t.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_haiku_chat_creates_conversation() {
    let t = test_app("http://127.0.0.1:9").await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/chat",
        Some(json!({"message": "Hello", "model": "claude-3-haiku-20240307"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "echo: Hello");
    assert!(body["generation_stats"]["tokens_prompt"].is_number());
    assert!(body["generation_stats"]["tokens_completion"].is_number());
    assert!(body["generation_stats"]["total_cost"].is_number());
    assert_eq!(t.primary.calls(), 1);
    assert_eq!(t.secondary.calls(), 0);

    let conversations = t.storage.list_conversations().await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(body["conversation_id"], json!(conversations[0].id));

    let messages = t.storage.get_messages(conversations[0].id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].tokens_prompt, Some(12));
}

#[tokio::test]
async fn test_openrouter_chat_reports_lookup_stats() {
    let t = test_app("http://127.0.0.1:9").await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/chat",
        Some(json!({"message": "Hi", "model": "openai/gpt-4o"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generation_stats"]["total_cost"], json!(0.0001));
    assert_eq!(t.primary.calls(), 0);
    assert_eq!(t.secondary.calls(), 1);
}

#[tokio::test]
async fn test_disallowed_model_is_rejected_without_writes() {
    let t = test_app("http://127.0.0.1:9").await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/chat",
        Some(json!({"message": "Hello", "model": "gpt-2"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], 400);
    assert!(body["error"].as_str().unwrap().contains("gpt-2"));
    assert_eq!(t.primary.calls() + t.secondary.calls(), 0);
    assert!(t.storage.list_conversations().await.unwrap().is_empty());
    assert!(t.storage.get_all_messages().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_input_errors() {
    let t = test_app("http://127.0.0.1:9").await;

    let (status, _) = send(&t.app, "POST", "/api/chat", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &t.app,
        "POST",
        "/api/chat",
        Some(json!({"message": "what is this", "image_data": "data:image/png;base64,@@"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/chat",
        Some(json!({"message": "Hello", "conversation_id": 99})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], 404);

    assert_eq!(t.primary.calls(), 0);
}

#[tokio::test]
async fn test_reset_single_conversation() {
    let t = test_app("http://127.0.0.1:9").await;

    for name in ["one", "two", "three"] {
        let (status, _) = send(
            &t.app,
            "POST",
            "/api/conversations",
            Some(json!({"name": name})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, conversations) = send(&t.app, "GET", "/api/conversations", None).await;
    let ids: Vec<i64> = conversations
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids.len(), 3);

    for id in &ids {
        for role in ["user", "assistant"] {
            let (status, _) = send(
                &t.app,
                "POST",
                "/api/chat_history",
                Some(json!({"role": role, "content": "x", "conversation_id": id})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
    }

    let target = ids[2];
    let (status, body) = send(
        &t.app,
        "POST",
        "/api/chat_history/reset",
        Some(json!({"conversation_id": target})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (_, history) = send(&t.app, "GET", &format!("/api/chat_history/{}", target), None).await;
    assert_eq!(history, json!([]));
    for id in &ids[..2] {
        let (_, history) = send(&t.app, "GET", &format!("/api/chat_history/{}", id), None).await;
        assert_eq!(history.as_array().unwrap().len(), 2);
    }

    // No body resets everything
    let (status, _) = send(&t.app, "POST", "/api/chat_history/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, history) = send(&t.app, "GET", "/api/chat_history", None).await;
    assert_eq!(history, json!([]));
    assert_eq!(t.storage.list_conversations().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_history_endpoints() {
    let t = test_app("http://127.0.0.1:9").await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/chat_history",
        Some(json!({"role": "narrator", "content": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("narrator"));

    let (_, chat) = send(
        &t.app,
        "POST",
        "/api/chat",
        Some(json!({"message": "Hello"})),
    )
    .await;
    let id = chat["conversation_id"].as_i64().unwrap();

    let (status, history) = send(&t.app, "GET", &format!("/api/chat_history/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        history[0],
        json!({
            "role": "user",
            "content": "Hello",
            "tokens_prompt": null,
            "tokens_completion": null,
            "total_cost": null,
            "image_data": null
        })
    );
    assert_eq!(history[1]["role"], "assistant");

    let (status, _) = send(&t.app, "GET", "/api/chat_history/4242", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_conversation() {
    let t = test_app("http://127.0.0.1:9").await;

    let (_, chat) = send(&t.app, "POST", "/api/chat", Some(json!({"message": "Hello"}))).await;
    let id = chat["conversation_id"].as_i64().unwrap();

    let (status, _) = send(&t.app, "DELETE", &format!("/api/conversations/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(t.storage.get_all_messages().await.unwrap().is_empty());

    let (status, _) = send(&t.app, "DELETE", &format!("/api/conversations/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_silver_analysis() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v8/finance/chart/SI=F")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(
            json!({"chart": {"result": [{
                "meta": {"symbol": "SI=F", "currency": "USD"},
                "indicators": {"quote": [{"close": [20.0, 21.0, null, 20.0, 22.0]}]}
            }]}})
            .to_string(),
        )
        .create_async()
        .await;

    let t = test_app(&server.url()).await;
    let (status, body) = send(&t.app, "GET", "/api/silver_analysis", None).await;

    assert_eq!(status, StatusCode::OK);
    let today = body["today_change"].as_f64().unwrap();
    assert!((today - 0.1).abs() < 1e-9);
    assert_eq!(body["percentile"], json!(100.0));
    assert_eq!(body["histogram_data"]["bin_edges"].as_array().unwrap().len(), 51);
    let counted: u64 = body["histogram_data"]["counts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_u64().unwrap())
        .sum();
    assert_eq!(counted, 3);
}

#[tokio::test]
async fn test_silver_analysis_upstream_failure() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v8/finance/chart/SI=F")
        .match_query(mockito::Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let t = test_app(&server.url()).await;
    let (status, body) = send(&t.app, "GET", "/api/silver_analysis", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("An error occurred: "));
}
