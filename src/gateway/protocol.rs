use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::{FilterConditions, MemoryError};
use crate::storage::NoteRow;

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteCreateRequest {
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
}

fn default_query_limit() -> usize {
    10
}

fn default_batch_limit() -> usize {
    5
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_query_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSearchRequest {
    pub queries: Vec<String>,
    #[serde(default = "default_batch_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredSearchRequest {
    pub query: String,
    pub filters: FilterConditions,
    #[serde(default = "default_query_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    pub message: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentNoteRequest {
    pub content: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime: u64,
}

/// A note paired with its similarity score.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredNote {
    pub note: NoteRow,
    pub similarity_score: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub query: String,
    pub results: Vec<ScoredNote>,
    pub total_found: usize,
    pub search_time_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponseBody {
    pub response: String,
    pub agent_name: String,
    pub conversation_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSearchResponse {
    pub results: Vec<crate::agents::MemorySnippet>,
    pub query: String,
    pub agent_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub name: String,
    pub collection: String,
    pub description: String,
}

// ============================================================================
// Error mapping
// ============================================================================

/// API error with the FastAPI-style `{"detail": ...}` body the original
/// frontend consumes.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.detail }));
        (self.status, body).into_response()
    }
}

impl From<MemoryError> for ApiError {
    fn from(err: MemoryError) -> Self {
        let status = match &err {
            MemoryError::Validation(_) => StatusCode::BAD_REQUEST,
            MemoryError::NotFound(_) => StatusCode::NOT_FOUND,
            MemoryError::Provider(_) | MemoryError::VectorStore(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}
