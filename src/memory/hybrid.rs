use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::SearchResult;
use super::{MemoryError, MemoryResult};

/// Maximum tolerated deviation of `semantic + lexical` from 1.0.
const WEIGHT_SUM_TOLERANCE: f32 = 0.01;

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

/// Weights applied to the two sides of hybrid score fusion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FusionWeights {
    pub semantic: f32,
    pub lexical: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            semantic: 0.7,
            lexical: 0.3,
        }
    }
}

impl FusionWeights {
    pub fn new(semantic: f32, lexical: f32) -> Self {
        Self { semantic, lexical }
    }

    /// Reject weight pairs that do not sum to 1.0 within tolerance.
    ///
    /// Called by every entry point that accepts weights, before any external
    /// call is made.
    pub fn validate(&self) -> MemoryResult<()> {
        if (self.semantic + self.lexical - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(MemoryError::Validation(format!(
                "semantic and lexical weights must sum to 1.0, got {} + {}",
                self.semantic, self.lexical
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fused results
// ---------------------------------------------------------------------------

/// A search hit after score fusion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedResult {
    pub id: String,
    pub combined_score: f32,
    pub semantic_score: f32,
    pub lexical_score: f32,
    pub payload: serde_json::Map<String, Value>,
}

/// Merge semantic and lexical result lists into one ranked list.
///
/// The output contains one entry per id present in either input; an id
/// missing from one side scores 0 on that side. The payload is taken from
/// the semantic side when available (it is the richer of the two), falling
/// back to the lexical side. Ordering is descending by combined score with
/// ties broken by ascending id, so equal-score results rank deterministically.
pub fn combine(
    semantic: &[SearchResult],
    lexical: &[SearchResult],
    weights: FusionWeights,
) -> Vec<FusedResult> {
    let semantic_by_id: HashMap<&str, &SearchResult> =
        semantic.iter().map(|r| (r.id.as_str(), r)).collect();
    let lexical_by_id: HashMap<&str, &SearchResult> =
        lexical.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut ids: Vec<&str> = semantic_by_id.keys().copied().collect();
    ids.extend(
        lexical_by_id
            .keys()
            .copied()
            .filter(|id| !semantic_by_id.contains_key(*id)),
    );

    let mut fused: Vec<FusedResult> = ids
        .into_iter()
        .map(|id| {
            let sem = semantic_by_id.get(id).copied();
            let lex = lexical_by_id.get(id).copied();
            let semantic_score = sem.map(|r| r.score).unwrap_or(0.0);
            let lexical_score = lex.map(|r| r.score).unwrap_or(0.0);
            let payload = sem
                .map(|r| r.payload.clone())
                .or_else(|| lex.map(|r| r.payload.clone()))
                .unwrap_or_default();

            FusedResult {
                id: id.to_string(),
                combined_score: semantic_score * weights.semantic
                    + lexical_score * weights.lexical,
                semantic_score,
                lexical_score,
                payload,
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(id: &str, score: f32) -> SearchResult {
        let mut payload = serde_json::Map::new();
        payload.insert("content".to_string(), json!(format!("text for {id}")));
        SearchResult {
            id: id.to_string(),
            score,
            payload,
        }
    }

    #[test]
    fn default_weights_sum_to_one() {
        FusionWeights::default().validate().unwrap();
    }

    #[test]
    fn rejects_weights_over_tolerance() {
        let err = FusionWeights::new(0.5, 0.6).validate().unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
    }

    #[test]
    fn accepts_weights_within_tolerance() {
        FusionWeights::new(0.695, 0.3).validate().unwrap();
    }

    #[test]
    fn output_covers_union_of_ids() {
        let semantic = vec![hit("a", 0.9), hit("b", 0.8)];
        let lexical = vec![hit("b", 0.7), hit("c", 0.6)];
        let fused = combine(&semantic, &lexical, FusionWeights::default());
        let mut ids: Vec<&str> = fused.iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn missing_side_scores_zero() {
        let semantic = vec![hit("a", 0.9)];
        let lexical = vec![hit("c", 0.6)];
        let fused = combine(&semantic, &lexical, FusionWeights::new(0.7, 0.3));

        let a = fused.iter().find(|r| r.id == "a").unwrap();
        assert_eq!(a.lexical_score, 0.0);
        assert!((a.combined_score - 0.9 * 0.7).abs() < 1e-6);

        let c = fused.iter().find(|r| r.id == "c").unwrap();
        assert_eq!(c.semantic_score, 0.0);
        assert!((c.combined_score - 0.6 * 0.3).abs() < 1e-6);
    }

    #[test]
    fn overlapping_id_gets_weighted_sum() {
        let semantic = vec![hit("b", 0.8)];
        let lexical = vec![hit("b", 0.5)];
        let fused = combine(&semantic, &lexical, FusionWeights::new(0.7, 0.3));
        assert_eq!(fused.len(), 1);
        assert!((fused[0].combined_score - (0.8 * 0.7 + 0.5 * 0.3)).abs() < 1e-6);
    }

    #[test]
    fn sorted_descending_by_combined_score() {
        let semantic = vec![hit("a", 0.2), hit("b", 0.9), hit("c", 0.5)];
        let fused = combine(&semantic, &[], FusionWeights::default());
        for pair in fused.windows(2) {
            assert!(pair[0].combined_score >= pair[1].combined_score);
        }
    }

    #[test]
    fn equal_scores_tie_break_by_id() {
        let semantic = vec![hit("zz", 0.5), hit("aa", 0.5), hit("mm", 0.5)];
        let fused = combine(&semantic, &[], FusionWeights::default());
        let ids: Vec<&str> = fused.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["aa", "mm", "zz"]);
    }

    #[test]
    fn payload_prefers_semantic_side() {
        let mut sem = hit("x", 0.9);
        sem.payload
            .insert("title".to_string(), json!("from semantic"));
        let lex = hit("x", 0.4);
        let fused = combine(&[sem], &[lex], FusionWeights::default());
        assert_eq!(fused[0].payload["title"], json!("from semantic"));
    }

    #[test]
    fn empty_inputs_fuse_to_empty() {
        assert!(combine(&[], &[], FusionWeights::default()).is_empty());
    }
}
