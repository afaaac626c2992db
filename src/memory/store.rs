use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;

use super::embeddings::EmbeddingVector;
use super::{MemoryError, MemoryResult};

/// Payload field holding the raw text of a point. The lexical side of hybrid
/// search matches against this field.
pub const TEXT_FIELD: &str = "content";

/// How many points `collection_stats` samples to derive payload field names.
const STATS_SAMPLE_LIMIT: usize = 100;

// ============================================================================
// Public Types
// ============================================================================

/// A stored vector point with its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryPoint {
    pub id: String,
    pub vector: EmbeddingVector,
    pub payload: serde_json::Map<String, Value>,
}

/// A single similarity search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub payload: serde_json::Map<String, Value>,
}

/// Caller-facing filter conditions: payload field name mapped to either an
/// exact-match value or a `{"gte": .., "lte": ..}` numeric range. Multiple
/// fields are conjunctive.
pub type FilterConditions = serde_json::Map<String, Value>;

/// Collection statistics including sampled payload fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub name: String,
    pub vectors_count: u64,
    pub points_count: u64,
    pub status: String,
    pub vector_size: usize,
    pub distance: String,
    /// Union of payload keys over a bounded sample, not an exhaustive schema.
    pub payload_fields: Vec<String>,
    pub sample_size: usize,
}

// ============================================================================
// Wire Types (Qdrant REST)
// ============================================================================

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    result: T,
}

#[derive(Serialize)]
struct CreateCollectionRequest {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Serialize)]
struct UpsertRequest {
    points: Vec<PointStruct>,
}

#[derive(Serialize)]
struct PointStruct {
    id: String,
    vector: EmbeddingVector,
    payload: serde_json::Map<String, Value>,
}

#[derive(Serialize)]
struct SearchRequest {
    vector: EmbeddingVector,
    limit: usize,
    score_threshold: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Filter>,
    with_payload: bool,
}

#[derive(Serialize)]
struct Filter {
    must: Vec<Condition>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Condition {
    Match {
        key: String,
        r#match: MatchClause,
    },
    Range {
        key: String,
        range: RangeClause,
    },
}

#[derive(Serialize)]
#[serde(untagged)]
enum MatchClause {
    Value { value: Value },
    Text { text: String },
}

#[derive(Serialize)]
struct RangeClause {
    #[serde(skip_serializing_if = "Option::is_none")]
    gte: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lte: Option<f64>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<serde_json::Map<String, Value>>,
}

#[derive(Serialize)]
struct RetrieveRequest {
    ids: Vec<String>,
    with_payload: bool,
    with_vector: bool,
}

#[derive(Deserialize)]
struct RetrievedPoint {
    id: Value,
    #[serde(default)]
    vector: Option<EmbeddingVector>,
    #[serde(default)]
    payload: Option<serde_json::Map<String, Value>>,
}

#[derive(Serialize)]
struct SetPayloadRequest {
    payload: serde_json::Map<String, Value>,
    points: Vec<String>,
}

#[derive(Serialize)]
struct DeletePointsRequest {
    points: Vec<String>,
}

#[derive(Serialize)]
struct ScrollRequest {
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<RetrievedPoint>,
}

#[derive(Deserialize)]
struct CollectionInfo {
    status: String,
    #[serde(default)]
    points_count: Option<u64>,
    #[serde(default)]
    vectors_count: Option<u64>,
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: VectorParamsInfo,
}

#[derive(Deserialize)]
struct VectorParamsInfo {
    size: usize,
    distance: String,
}

/// Qdrant point ids may be unsigned integers or UUID strings on the wire.
fn point_id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// VectorStore
// ============================================================================

/// Adapter over a Qdrant-compatible vector database, scoped to one collection.
///
/// The collection is created lazily on the first operation that needs it,
/// with the configured dimension and cosine distance. Dimension is checked
/// client-side on every upsert and search so a mismatched vector never
/// reaches the wire.
pub struct VectorStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    vector_size: usize,
    default_score_threshold: f32,
    ensured: OnceCell<()>,
}

impl VectorStore {
    /// Store for the configured default (notes) collection.
    pub fn new(config: &Config) -> Self {
        Self::for_collection(config, config.memory.collection_name.clone())
    }

    /// Store for an arbitrary collection (used for per-agent memory).
    pub fn for_collection(config: &Config, collection: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.vector_store.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.vector_store.url.trim_end_matches('/').to_string(),
            collection: collection.into(),
            vector_size: config.memory.vector_size,
            default_score_threshold: config.memory.similarity_threshold,
            ensured: OnceCell::new(),
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn vector_size(&self) -> usize {
        self.vector_size
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    fn store_err(context: &str, e: impl std::fmt::Display) -> MemoryError {
        MemoryError::VectorStore(format!("{context}: {e}"))
    }

    fn check_dimension(&self, vector: &[f32]) -> MemoryResult<()> {
        if vector.len() != self.vector_size {
            return Err(MemoryError::VectorStore(format!(
                "dimension mismatch for collection {}: expected {}, got {}",
                self.collection,
                self.vector_size,
                vector.len()
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Collection lifecycle
    // ------------------------------------------------------------------

    /// Create the collection if it does not exist. Idempotent; an
    /// "already exists" response counts as success.
    pub async fn ensure_collection(&self) -> MemoryResult<()> {
        self.ensured
            .get_or_try_init(|| self.create_if_absent())
            .await?;
        Ok(())
    }

    async fn create_if_absent(&self) -> MemoryResult<()> {
        let resp = self
            .client
            .get(self.collection_url(""))
            .send()
            .await
            .map_err(|e| Self::store_err("collection lookup failed", e))?;

        if resp.status().is_success() {
            debug!(collection = %self.collection, "collection already exists");
            return Ok(());
        }
        if resp.status() != reqwest::StatusCode::NOT_FOUND {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(MemoryError::VectorStore(format!(
                "collection lookup failed ({status}): {text}"
            )));
        }

        let body = CreateCollectionRequest {
            vectors: VectorParams {
                size: self.vector_size,
                distance: "Cosine",
            },
        };

        let resp = self
            .client
            .put(self.collection_url(""))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::store_err("collection create failed", e))?;

        // A concurrent creator may have won the race; Qdrant reports that as
        // a conflict, which is success for our purposes.
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::CONFLICT {
            info!(
                collection = %self.collection,
                size = self.vector_size,
                "created vector collection"
            );
            return Ok(());
        }

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if text.contains("already exists") {
            return Ok(());
        }
        Err(MemoryError::VectorStore(format!(
            "collection create failed ({status}): {text}"
        )))
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write or overwrite one point. Returns the point id.
    pub async fn upsert(
        &self,
        id: Option<String>,
        vector: EmbeddingVector,
        payload: serde_json::Map<String, Value>,
    ) -> MemoryResult<String> {
        let ids = self
            .upsert_batch(vec![(id, vector, payload)])
            .await?;
        Ok(ids.into_iter().next().unwrap_or_default())
    }

    /// Write many points in one round trip. Entries without an id are
    /// assigned a fresh UUID. Returns ids in input order.
    pub async fn upsert_batch(
        &self,
        entries: Vec<(Option<String>, EmbeddingVector, serde_json::Map<String, Value>)>,
    ) -> MemoryResult<Vec<String>> {
        // Validate before touching the wire.
        for (_, vector, _) in &entries {
            self.check_dimension(vector)?;
        }
        self.ensure_collection().await?;

        let mut points = Vec::with_capacity(entries.len());
        let mut ids = Vec::with_capacity(entries.len());
        for (id, vector, payload) in entries {
            let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
            ids.push(id.clone());
            points.push(PointStruct {
                id,
                vector,
                payload,
            });
        }

        let resp = self
            .client
            .put(self.collection_url("/points?wait=true"))
            .json(&UpsertRequest { points })
            .send()
            .await
            .map_err(|e| Self::store_err("upsert failed", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(MemoryError::VectorStore(format!(
                "upsert failed ({status}): {text}"
            )));
        }

        debug!(collection = %self.collection, count = ids.len(), "upserted points");
        Ok(ids)
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Similarity search, descending by score. Results below the threshold
    /// (the configured default when `score_threshold` is `None`) are
    /// excluded; an empty result set is not an error.
    pub async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
        filter: Option<&FilterConditions>,
    ) -> MemoryResult<Vec<SearchResult>> {
        self.check_dimension(query_vector)?;
        self.ensure_collection().await?;

        let body = SearchRequest {
            vector: query_vector.to_vec(),
            limit,
            score_threshold: score_threshold.unwrap_or(self.default_score_threshold),
            filter: filter.map(build_filter),
            with_payload: true,
        };

        let resp = self
            .client
            .post(self.collection_url("/points/search"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::store_err("search failed", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(MemoryError::VectorStore(format!(
                "search failed ({status}): {text}"
            )));
        }

        let envelope: ApiEnvelope<Vec<ScoredPoint>> = resp
            .json()
            .await
            .map_err(|e| Self::store_err("malformed search response", e))?;

        Ok(envelope
            .result
            .into_iter()
            .map(|p| SearchResult {
                id: point_id_to_string(&p.id),
                score: p.score,
                payload: p.payload.unwrap_or_default(),
            })
            .collect())
    }

    /// Similarity search restricted to points whose text field matches
    /// `query_text`. This is the lexical side of hybrid search: matching is
    /// delegated to the store's full-text filter, scores remain cosine
    /// similarities.
    pub async fn search_by_text(
        &self,
        query_text: &str,
        query_vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> MemoryResult<Vec<SearchResult>> {
        let mut conditions = FilterConditions::new();
        conditions.insert(
            TEXT_FIELD.to_string(),
            serde_json::json!({ "text": query_text }),
        );
        self.search(query_vector, limit, score_threshold, Some(&conditions))
            .await
    }

    // ------------------------------------------------------------------
    // Point retrieval / mutation
    // ------------------------------------------------------------------

    /// Fetch points by id. Missing ids are silently omitted.
    pub async fn get_by_ids(&self, ids: &[String]) -> MemoryResult<Vec<MemoryPoint>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let body = RetrieveRequest {
            ids: ids.to_vec(),
            with_payload: true,
            with_vector: true,
        };

        let resp = self
            .client
            .post(self.collection_url("/points"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::store_err("retrieve failed", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(MemoryError::VectorStore(format!(
                "retrieve failed ({status}): {text}"
            )));
        }

        let envelope: ApiEnvelope<Vec<RetrievedPoint>> = resp
            .json()
            .await
            .map_err(|e| Self::store_err("malformed retrieve response", e))?;

        Ok(envelope
            .result
            .into_iter()
            .map(|p| MemoryPoint {
                id: point_id_to_string(&p.id),
                vector: p.vector.unwrap_or_default(),
                payload: p.payload.unwrap_or_default(),
            })
            .collect())
    }

    /// Merge `payload` into an existing point. Best effort: failures are
    /// logged and reported as `false`, never raised.
    pub async fn update_payload(
        &self,
        id: &str,
        payload: serde_json::Map<String, Value>,
    ) -> bool {
        let body = SetPayloadRequest {
            payload,
            points: vec![id.to_string()],
        };

        let result = self
            .client
            .post(self.collection_url("/points/payload?wait=true"))
            .json(&body)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(collection = %self.collection, id, status = %resp.status(), "payload update failed");
                false
            }
            Err(e) => {
                warn!(collection = %self.collection, id, error = %e, "payload update failed");
                false
            }
        }
    }

    /// Delete one point. Best-effort boolean, like `update_payload`.
    pub async fn delete(&self, id: &str) -> bool {
        self.delete_batch(&[id.to_string()]).await
    }

    /// Delete many points in one call. Best-effort boolean.
    pub async fn delete_batch(&self, ids: &[String]) -> bool {
        let body = DeletePointsRequest {
            points: ids.to_vec(),
        };

        let result = self
            .client
            .post(self.collection_url("/points/delete?wait=true"))
            .json(&body)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(collection = %self.collection, count = ids.len(), status = %resp.status(), "delete failed");
                false
            }
            Err(e) => {
                warn!(collection = %self.collection, count = ids.len(), error = %e, "delete failed");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------

    /// Collection statistics plus payload field names sampled from up to
    /// [`STATS_SAMPLE_LIMIT`] points.
    pub async fn collection_stats(&self) -> MemoryResult<CollectionStats> {
        let resp = self
            .client
            .get(self.collection_url(""))
            .send()
            .await
            .map_err(|e| Self::store_err("collection info failed", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(MemoryError::VectorStore(format!(
                "collection info failed ({status}): {text}"
            )));
        }

        let envelope: ApiEnvelope<CollectionInfo> = resp
            .json()
            .await
            .map_err(|e| Self::store_err("malformed collection info", e))?;
        let info = envelope.result;

        let sample = self.scroll_sample(STATS_SAMPLE_LIMIT).await?;
        let mut fields = BTreeSet::new();
        for point in &sample {
            if let Some(payload) = &point.payload {
                fields.extend(payload.keys().cloned());
            }
        }

        Ok(CollectionStats {
            name: self.collection.clone(),
            vectors_count: info.vectors_count.unwrap_or_default(),
            points_count: info.points_count.unwrap_or_default(),
            status: info.status,
            vector_size: info.config.params.vectors.size,
            distance: info.config.params.vectors.distance,
            payload_fields: fields.into_iter().collect(),
            sample_size: sample.len(),
        })
    }

    async fn scroll_sample(&self, limit: usize) -> MemoryResult<Vec<RetrievedPoint>> {
        let resp = self
            .client
            .post(self.collection_url("/points/scroll"))
            .json(&ScrollRequest {
                limit,
                with_payload: true,
            })
            .send()
            .await
            .map_err(|e| Self::store_err("scroll failed", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(MemoryError::VectorStore(format!(
                "scroll failed ({status}): {text}"
            )));
        }

        let envelope: ApiEnvelope<ScrollResult> = resp
            .json()
            .await
            .map_err(|e| Self::store_err("malformed scroll response", e))?;
        Ok(envelope.result.points)
    }

    /// Nudge the store's optimizer settings for this collection. Best effort.
    pub async fn optimize(&self) -> bool {
        let body = serde_json::json!({
            "optimizers_config": {
                "default_segment_number": 2,
                "memmap_threshold": 20000
            }
        });

        let result = self
            .client
            .patch(self.collection_url(""))
            .json(&body)
            .send()
            .await;

        matches!(result, Ok(resp) if resp.status().is_success())
    }
}

// ============================================================================
// Filter construction
// ============================================================================

/// Translate caller filter conditions into the store's filter syntax.
///
/// A value of the form `{"gte": n}` / `{"lte": n}` becomes a numeric range
/// condition; anything else is an exact match. Fields are combined with AND.
fn build_filter(conditions: &FilterConditions) -> Filter {
    let mut must = Vec::with_capacity(conditions.len());

    for (field, value) in conditions {
        match value {
            Value::Object(obj) if obj.contains_key("gte") || obj.contains_key("lte") => {
                must.push(Condition::Range {
                    key: field.clone(),
                    range: RangeClause {
                        gte: obj.get("gte").and_then(Value::as_f64),
                        lte: obj.get("lte").and_then(Value::as_f64),
                    },
                });
            }
            Value::Object(obj) if obj.contains_key("text") => {
                must.push(Condition::Match {
                    key: field.clone(),
                    r#match: MatchClause::Text {
                        text: obj
                            .get("text")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    },
                });
            }
            other => {
                must.push(Condition::Match {
                    key: field.clone(),
                    r#match: MatchClause::Value {
                        value: other.clone(),
                    },
                });
            }
        }
    }

    Filter { must }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conditions(value: Value) -> FilterConditions {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn builds_exact_match_filter() {
        let filter = build_filter(&conditions(json!({ "source": "note" })));
        let wire = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            wire,
            json!({ "must": [{ "key": "source", "match": { "value": "note" } }] })
        );
    }

    #[test]
    fn builds_range_filter() {
        let filter = build_filter(&conditions(json!({ "priority": { "gte": 2, "lte": 5 } })));
        let wire = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            wire,
            json!({ "must": [{ "key": "priority", "range": { "gte": 2.0, "lte": 5.0 } }] })
        );
    }

    #[test]
    fn builds_text_match_filter() {
        let filter = build_filter(&conditions(json!({ "content": { "text": "refund" } })));
        let wire = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            wire,
            json!({ "must": [{ "key": "content", "match": { "text": "refund" } }] })
        );
    }

    #[test]
    fn combines_fields_conjunctively() {
        let filter = build_filter(&conditions(json!({
            "source": "note",
            "priority": { "gte": 1 }
        })));
        let wire = serde_json::to_value(&filter).unwrap();
        assert_eq!(wire["must"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn numeric_point_ids_are_stringified() {
        assert_eq!(point_id_to_string(&json!(42)), "42");
        assert_eq!(point_id_to_string(&json!("abc-123")), "abc-123");
    }
}
