use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::gateway::protocol::*;
use crate::gateway::server::AppState;
use crate::memory::FusionWeights;
use crate::storage::{NewNote, NoteRow};

/// Maximum queries accepted by the batch search endpoint.
const MAX_BATCH_QUERIES: usize = 10;

/// Build all routes for the gateway.
pub fn build_routes(state: AppState) -> Router {
    let cors = cors_layer(&state);

    Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        // Notes
        .route("/api/notes", post(note_create_handler).get(notes_list_handler))
        .route(
            "/api/notes/{id}",
            get(note_get_handler).delete(note_delete_handler),
        )
        // Query / search
        .route("/api/query", post(query_handler))
        .route("/api/search/semantic", post(semantic_search_handler))
        .route("/api/search/hybrid", post(hybrid_search_handler))
        .route("/api/search/batch", post(batch_search_handler))
        .route("/api/search/filtered", post(filtered_search_handler))
        .route("/api/search/similar/{vector_id}", get(similar_handler))
        .route("/api/search/suggestions", get(suggestions_handler))
        .route("/api/search/analytics", get(analytics_handler))
        // Agents
        .route("/api/agents", get(agents_list_handler))
        .route("/api/agents/{name}/chat", post(agent_chat_handler))
        .route("/api/agents/{name}/note", post(agent_note_handler))
        .route("/api/agents/{name}/search", get(agent_search_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .gateway
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

// ============================================================================
// Health
// ============================================================================

async fn root_handler() -> Json<Value> {
    Json(json!({ "message": "Recall semantic memory API" }))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().as_secs();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
        uptime,
    })
}

// ============================================================================
// Notes
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    skip: usize,
    #[serde(default = "default_list_limit")]
    limit: usize,
}

fn default_list_limit() -> usize {
    100
}

async fn note_create_handler(
    State(state): State<AppState>,
    Json(body): Json<NoteCreateRequest>,
) -> Result<(StatusCode, Json<NoteRow>), ApiError> {
    let engine = &state.engine;
    let embedding = engine.cache().embed(&body.content, true).await?;

    let mut payload = serde_json::Map::new();
    payload.insert("content".to_string(), json!(body.content));
    if let Some(title) = &body.title {
        payload.insert("title".to_string(), json!(title));
    }
    payload.insert(
        "embedding_model".to_string(),
        json!(engine.cache().model_name()),
    );

    // The vector store is the source of truth; the metadata row is keyed by
    // the vector id so a retried request replaces rather than duplicates.
    let vector_id = engine.store().upsert(None, embedding, payload).await?;

    let note = state.metadata.insert_note(NewNote {
        agent_name: None,
        title: body.title,
        content: body.content,
        vector_id,
        embedding_model: engine.cache().model_name(),
    })?;

    Ok((StatusCode::CREATED, Json(note)))
}

async fn notes_list_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<NoteRow>>, ApiError> {
    Ok(Json(state.metadata.list_notes(query.skip, query.limit)?))
}

async fn note_get_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<NoteRow>, ApiError> {
    state
        .metadata
        .get_note(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Note {id} not found")))
}

async fn note_delete_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let note = state
        .metadata
        .delete_note(id)?
        .ok_or_else(|| ApiError::not_found(format!("Note {id} not found")))?;

    // Best effort; the row is already gone and a dangling point is harmless.
    let vector_deleted = state.engine.store().delete(&note.vector_id).await;

    Ok(Json(json!({
        "deleted": true,
        "id": id,
        "vectorDeleted": vector_deleted
    })))
}

// ============================================================================
// Query / search
// ============================================================================

fn scored_notes(state: &AppState, results: &[crate::memory::SearchResult]) -> Vec<ScoredNote> {
    results
        .iter()
        .filter_map(|r| {
            state
                .metadata
                .get_note_by_vector(&r.id)
                .ok()
                .flatten()
                .map(|note| ScoredNote {
                    note,
                    similarity_score: r.score,
                })
        })
        .collect()
}

async fn query_handler(
    State(state): State<AppState>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let response = state
        .engine
        .semantic_search(&body.query, body.limit, None, None)
        .await?;

    let results = scored_notes(&state, &response.results);
    Ok(Json(QueryResponse {
        query: response.query,
        total_found: results.len(),
        results,
        search_time_ms: response.search_time_ms,
    }))
}

#[derive(Debug, Deserialize)]
struct SemanticParams {
    score_threshold: Option<f32>,
}

async fn semantic_search_handler(
    State(state): State<AppState>,
    Query(params): Query<SemanticParams>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let response = state
        .engine
        .semantic_search(&body.query, body.limit, params.score_threshold, None)
        .await?;

    let results = scored_notes(&state, &response.results);
    Ok(Json(QueryResponse {
        query: response.query,
        total_found: results.len(),
        results,
        search_time_ms: response.search_time_ms,
    }))
}

#[derive(Debug, Deserialize)]
struct HybridParams {
    semantic_weight: Option<f32>,
    text_weight: Option<f32>,
}

async fn hybrid_search_handler(
    State(state): State<AppState>,
    Query(params): Query<HybridParams>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<Value>, ApiError> {
    let weights = match (params.semantic_weight, params.text_weight) {
        (None, None) => FusionWeights::default(),
        (sem, lex) => FusionWeights::new(sem.unwrap_or(0.7), lex.unwrap_or(0.3)),
    };

    let response = state
        .engine
        .hybrid_search(&body.query, body.limit, weights)
        .await?;

    let results: Vec<Value> = response
        .results
        .iter()
        .filter_map(|r| {
            state
                .metadata
                .get_note_by_vector(&r.id)
                .ok()
                .flatten()
                .map(|note| {
                    json!({
                        "note": note,
                        "combinedScore": r.combined_score,
                        "semanticScore": r.semantic_score,
                        "textScore": r.lexical_score,
                    })
                })
        })
        .collect();

    Ok(Json(json!({
        "query": response.query,
        "results": results,
        "totalFound": results.len(),
        "searchTimeMs": response.search_time_ms,
        "searchType": "hybrid",
        "weights": { "semantic": weights.semantic, "text": weights.lexical },
    })))
}

async fn batch_search_handler(
    State(state): State<AppState>,
    Json(body): Json<BatchSearchRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.queries.len() > MAX_BATCH_QUERIES {
        return Err(ApiError::bad_request(format!(
            "Maximum {MAX_BATCH_QUERIES} queries allowed per batch"
        )));
    }

    let groups = state
        .coordinator
        .batch_search(&body.queries, body.limit)
        .await?;

    let batch_results: Vec<Value> = groups
        .iter()
        .map(|group| {
            let results = scored_notes(&state, &group.results);
            json!({
                "query": group.query,
                "results": results,
                "totalFound": results.len(),
                "queryIndex": group.query_index,
            })
        })
        .collect();

    Ok(Json(json!({
        "batchResults": batch_results,
        "totalQueries": body.queries.len(),
    })))
}

async fn filtered_search_handler(
    State(state): State<AppState>,
    Json(body): Json<FilteredSearchRequest>,
) -> Result<Json<Value>, ApiError> {
    let response = state
        .engine
        .search_with_filters(&body.query, &body.filters, body.limit)
        .await?;

    let results = scored_notes(&state, &response.results);
    Ok(Json(json!({
        "query": response.query,
        "results": results,
        "totalFound": results.len(),
        "filtersApplied": body.filters,
    })))
}

#[derive(Debug, Deserialize)]
struct SimilarParams {
    #[serde(default = "default_similar_limit")]
    limit: usize,
}

fn default_similar_limit() -> usize {
    5
}

async fn similar_handler(
    State(state): State<AppState>,
    Path(vector_id): Path<String>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<Value>, ApiError> {
    let similar = state.engine.similar_to(&vector_id, params.limit).await?;

    let reference_note = state.metadata.get_note_by_vector(&vector_id)?;
    let similar_notes = scored_notes(&state, &similar);

    Ok(Json(json!({
        "referenceNote": reference_note,
        "similarNotes": similar_notes,
        "totalFound": similar_notes.len(),
    })))
}

#[derive(Debug, Deserialize)]
struct SuggestionParams {
    partial_query: String,
    #[serde(default = "default_similar_limit")]
    limit: usize,
}

async fn suggestions_handler(
    State(state): State<AppState>,
    Query(params): Query<SuggestionParams>,
) -> Json<Value> {
    let suggestions = state.engine.suggestions(&params.partial_query, params.limit);
    Json(json!({
        "partialQuery": params.partial_query,
        "suggestions": suggestions,
    }))
}

async fn analytics_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let analytics = state.engine.analytics().await?;
    Ok(Json(serde_json::to_value(analytics).unwrap_or_default()))
}

// ============================================================================
// Agents
// ============================================================================

async fn agents_list_handler(State(state): State<AppState>) -> Json<Value> {
    let agents: Vec<AgentInfo> = state
        .agents
        .iter()
        .map(|(name, agent)| AgentInfo {
            name: name.to_string(),
            collection: agent.collection_name().to_string(),
            description: agent.system_prompt().chars().take(200).collect(),
        })
        .collect();
    Json(json!({ "agents": agents }))
}

async fn agent_chat_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Json<ChatResponseBody>, ApiError> {
    let agent = state
        .agents
        .get(&name)
        .ok_or_else(|| ApiError::not_found(format!("Agent {name} not found")))?;

    let reply = agent.respond(&body.message, body.context.as_deref()).await?;

    let conversation = state.metadata.insert_conversation(
        agent.name(),
        &body.message,
        &reply.response,
        Some(&reply.memory_id),
    )?;

    debug!(agent = %name, conversation = conversation.id, "chat exchange stored");

    Ok(Json(ChatResponseBody {
        response: reply.response,
        agent_name: agent.name().to_string(),
        conversation_id: conversation.id,
    }))
}

async fn agent_note_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<AgentNoteRequest>,
) -> Result<(StatusCode, Json<NoteRow>), ApiError> {
    let agent = state
        .agents
        .get(&name)
        .ok_or_else(|| ApiError::not_found(format!("Agent {name} not found")))?;

    let vector_id = agent.store_note(&body.content, body.metadata).await?;

    let note = state.metadata.insert_note(NewNote {
        agent_name: Some(agent.name().to_string()),
        title: None,
        content: body.content,
        vector_id,
        embedding_model: state.engine.cache().model_name(),
    })?;

    Ok((StatusCode::CREATED, Json(note)))
}

#[derive(Debug, Deserialize)]
struct AgentSearchParams {
    q: String,
    #[serde(default = "default_query_limit")]
    limit: usize,
}

fn default_query_limit() -> usize {
    10
}

async fn agent_search_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<AgentSearchParams>,
) -> Result<Json<AgentSearchResponse>, ApiError> {
    let agent = state
        .agents
        .get(&name)
        .ok_or_else(|| ApiError::not_found(format!("Agent {name} not found")))?;

    let results = agent.search_memory(&params.q, params.limit).await?;

    Ok(Json(AgentSearchResponse {
        results,
        query: params.q,
        agent_name: agent.name().to_string(),
    }))
}
