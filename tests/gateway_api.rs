//! End-to-end tests for the HTTP gateway, running the real router over a
//! local listener with wiremock stand-ins for the vector store and the
//! OpenAI APIs.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use recall::config::Config;
use recall::gateway::{build_routes, AppState};

const DIM: usize = 4;

async fn mock_collection(server: &MockServer, name: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/collections/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "status": "green",
                "points_count": 0,
                "vectors_count": 0,
                "config": { "params": { "vectors": { "size": DIM, "distance": "Cosine" } } }
            },
            "status": "ok",
            "time": 0.001
        })))
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("/collections/{name}/points")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "operation_id": 0, "status": "acknowledged" },
            "status": "ok",
            "time": 0.001
        })))
        .mount(server)
        .await;
}

async fn mock_embeddings(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{ "object": "embedding", "embedding": [1.0, 0.0, 0.0, 0.0], "index": 0 }],
            "model": "text-embedding-ada-002"
        })))
        .mount(server)
        .await;
}

struct TestApp {
    base_url: String,
    client: reqwest::Client,
    _state_dir: tempfile::TempDir,
}

async fn spawn_app(qdrant: &MockServer, openai: &MockServer) -> TestApp {
    let state_dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.memory.vector_size = DIM;
    config.memory.similarity_threshold = 0.1;
    config.memory.batch_pause_ms = 0;
    config.vector_store.url = qdrant.uri();
    config.state_dir = state_dir.path().to_path_buf();
    let provider = config
        .models
        .providers
        .entry("openai".to_string())
        .or_default();
    provider.api_key = Some("test-key".to_string());
    provider.base_url = Some(openai.uri());

    let state = AppState::from_config(config).unwrap();
    let app = build_routes(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::new(),
        _state_dir: state_dir,
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let qdrant = MockServer::start().await;
    let openai = MockServer::start().await;
    let app = spawn_app(&qdrant, &openai).await;

    let resp = app
        .client
        .get(format!("{}/api/health", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], json!("ok"));
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn note_create_then_query_round_trip() {
    let qdrant = MockServer::start().await;
    let openai = MockServer::start().await;
    mock_collection(&qdrant, "memory_notes").await;
    mock_embeddings(&openai).await;

    let app = spawn_app(&qdrant, &openai).await;

    let resp = app
        .client
        .post(format!("{}/api/notes", app.base_url))
        .json(&json!({ "content": "refund policy lasts 30 days", "title": "Refunds" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let note: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(note["content"], json!("refund policy lasts 30 days"));
    assert_eq!(note["title"], json!("Refunds"));
    let vector_id = note["vectorId"].as_str().unwrap().to_string();
    assert!(!vector_id.is_empty());

    // The store now "contains" the note's point; queries surface it.
    Mock::given(method("POST"))
        .and(path("/collections/memory_notes/points/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{
                "id": vector_id,
                "version": 0,
                "score": 0.91,
                "payload": { "content": "refund policy lasts 30 days", "title": "Refunds" }
            }],
            "status": "ok",
            "time": 0.001
        })))
        .mount(&qdrant)
        .await;

    let resp = app
        .client
        .post(format!("{}/api/query", app.base_url))
        .json(&json!({ "query": "refund", "limit": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["totalFound"], json!(1));
    assert_eq!(body["results"][0]["note"]["vectorId"], json!(vector_id));
    assert!(body["results"][0]["similarityScore"].as_f64().unwrap() > 0.9);
}

#[tokio::test]
async fn hybrid_search_rejects_bad_weights_before_embedding() {
    let qdrant = MockServer::start().await;
    let openai = MockServer::start().await;
    let app = spawn_app(&qdrant, &openai).await;

    let resp = app
        .client
        .post(format!(
            "{}/api/search/hybrid?semantic_weight=0.5&text_weight=0.6",
            app.base_url
        ))
        .json(&json!({ "query": "refund", "limit": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("must sum to 1.0"));
    assert!(openai.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn batch_search_caps_query_count() {
    let qdrant = MockServer::start().await;
    let openai = MockServer::start().await;
    let app = spawn_app(&qdrant, &openai).await;

    let queries: Vec<String> = (0..11).map(|i| format!("query {i}")).collect();
    let resp = app
        .client
        .post(format!("{}/api/search/batch", app.base_url))
        .json(&json!({ "queries": queries, "limit": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert!(openai.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn agents_are_listed_with_collections() {
    let qdrant = MockServer::start().await;
    let openai = MockServer::start().await;
    let app = spawn_app(&qdrant, &openai).await;

    let resp = app
        .client
        .get(format!("{}/api/agents", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    let agents = body["agents"].as_array().unwrap();
    assert!(agents
        .iter()
        .any(|a| a["name"] == json!("cara") && a["collection"] == json!("agent_cara")));
}

#[tokio::test]
async fn unknown_agent_is_not_found() {
    let qdrant = MockServer::start().await;
    let openai = MockServer::start().await;
    let app = spawn_app(&qdrant, &openai).await;

    let resp = app
        .client
        .post(format!("{}/api/agents/nobody/chat", app.base_url))
        .json(&json!({ "message": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn agent_chat_stores_conversation_and_memory() {
    let qdrant = MockServer::start().await;
    let openai = MockServer::start().await;
    mock_collection(&qdrant, "agent_cara").await;
    mock_embeddings(&openai).await;

    // Memory retrieval before the reply: nothing stored yet.
    Mock::given(method("POST"))
        .and(path("/collections/agent_cara/points/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [],
            "status": "ok",
            "time": 0.001
        })))
        .mount(&qdrant)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-test",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Happy to help with your refund." },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 42, "completion_tokens": 9 }
        })))
        .expect(1)
        .mount(&openai)
        .await;

    let app = spawn_app(&qdrant, &openai).await;

    let resp = app
        .client
        .post(format!("{}/api/agents/cara/chat", app.base_url))
        .json(&json!({ "message": "I want a refund" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["response"], json!("Happy to help with your refund."));
    assert_eq!(body["agentName"], json!("cara"));
    assert!(body["conversationId"].as_i64().unwrap() >= 1);

    // The exchange was written back to the agent's collection.
    let upserts: Vec<_> = qdrant
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| {
            r.method.as_str() == "PUT" && r.url.path() == "/collections/agent_cara/points"
        })
        .collect();
    assert_eq!(upserts.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&upserts[0].body).unwrap();
    let text = body["points"][0]["payload"]["text"].as_str().unwrap();
    assert!(text.contains("User: I want a refund"));
    assert!(text.contains("Agent: Happy to help with your refund."));
}

#[tokio::test]
async fn agent_search_returns_memory_snippets() {
    let qdrant = MockServer::start().await;
    let openai = MockServer::start().await;
    mock_collection(&qdrant, "agent_cara").await;
    mock_embeddings(&openai).await;

    Mock::given(method("POST"))
        .and(path("/collections/agent_cara/points/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{
                "id": "m1",
                "version": 0,
                "score": 0.88,
                "payload": {
                    "text": "User prefers store credit over card refunds",
                    "agent": "cara",
                    "metadata": { "kind": "conversation" }
                }
            }],
            "status": "ok",
            "time": 0.001
        })))
        .mount(&qdrant)
        .await;

    let app = spawn_app(&qdrant, &openai).await;

    let resp = app
        .client
        .get(format!(
            "{}/api/agents/cara/search?q=refund&limit=5",
            app.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["agentName"], json!("cara"));
    assert_eq!(
        body["results"][0]["text"],
        json!("User prefers store credit over card refunds")
    );
    assert!(body["results"][0]["score"].as_f64().unwrap() > 0.8);
}

#[tokio::test]
async fn suggestions_echo_partial_query() {
    let qdrant = MockServer::start().await;
    let openai = MockServer::start().await;
    let app = spawn_app(&qdrant, &openai).await;

    let resp = app
        .client
        .get(format!(
            "{}/api/search/suggestions?partial_query=rust&limit=3",
            app.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["partialQuery"], json!("rust"));
    assert_eq!(body["suggestions"].as_array().unwrap().len(), 3);
}
