//! Semantic Re-ranker (C7, §4.7): the `CrossEncoder` trait, its ONNX-backed
//! implementation (behind the `cross-encoder` feature), an always-degraded
//! stub, and the score blending that combines `semantic` with the C6
//! sub-scores into `final_score`.

use crate::types::ScoreBreakdown;
use async_trait::async_trait;

/// Scores `(query, document)` pairs and reports whether it is actually
/// backed by a loaded model. The pipeline never depends on a concrete
/// inference stack through this trait (§4.7's "Model hosting" note).
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    /// Returns one relevance score per document, each already mapped into
    /// `[0, 1]`. Returns `Err` on inference failure or deadline — callers
    /// treat that as `RerankerDegraded` and zero out `semantic` for the
    /// whole batch (§4.7).
    async fn score_pairs(&self, query: &str, documents: &[String]) -> anyhow::Result<Vec<f64>>;

    /// Used by `/health` (§6.1): `true` once a real model is loaded.
    fn is_loaded(&self) -> bool;
}

/// Always-degraded fallback. Compiled unconditionally so the pipeline works
/// with or without the `cross-encoder` feature and survives a runtime model
/// load failure.
pub struct DegradedCrossEncoder;

#[async_trait]
impl CrossEncoder for DegradedCrossEncoder {
    async fn score_pairs(&self, _query: &str, documents: &[String]) -> anyhow::Result<Vec<f64>> {
        Err(anyhow::anyhow!("cross-encoder unavailable: {} documents not scored", documents.len()))
    }

    fn is_loaded(&self) -> bool {
        false
    }
}

/// Weight applied to `semantic` in the final blend (§4.7).
const W_SEMANTIC: f64 = 0.45;
const W_AUTHORITY: f64 = 0.20;
const W_RECENCY: f64 = 0.15;
const W_ENGINE_TRUST: f64 = 0.10;
const W_POSITION: f64 = 0.10;

/// Sum of the non-semantic weights, used to renormalize when the
/// cross-encoder is degraded (§4.7).
const NON_SEMANTIC_WEIGHT_SUM: f64 = W_AUTHORITY + W_RECENCY + W_ENGINE_TRUST + W_POSITION;

/// Computes `final_score` from a breakdown whose `semantic` field is already
/// populated (or left at `0.0` for the degraded path).
pub fn blend(breakdown: &ScoreBreakdown, semantic_available: bool) -> f64 {
    if semantic_available {
        W_SEMANTIC * breakdown.semantic
            + W_AUTHORITY * breakdown.authority
            + W_RECENCY * breakdown.recency
            + W_ENGINE_TRUST * breakdown.engine_trust
            + W_POSITION * breakdown.position
    } else {
        (W_AUTHORITY * breakdown.authority
            + W_RECENCY * breakdown.recency
            + W_ENGINE_TRUST * breakdown.engine_trust
            + W_POSITION * breakdown.position)
            / NON_SEMANTIC_WEIGHT_SUM
    }
}

#[cfg(feature = "cross-encoder")]
pub mod onnx {
    use super::CrossEncoder;
    use async_trait::async_trait;
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Tensor;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tokenizers::Tokenizer;

    const MAX_SEQ_LEN: usize = 256;

    /// ONNX Runtime cross-encoder, loaded once at startup and shared as a
    /// process-wide read-only resource (§5, §9). `Session::run` is not safe
    /// to call concurrently, so calls are serialized behind a `Mutex`; the
    /// blocking inference itself runs on a `spawn_blocking` pool (mirroring
    /// the pack's own embedding-model pattern) to keep the async dispatcher
    /// free (§5).
    pub struct OnnxCrossEncoder {
        session: Arc<Mutex<Session>>,
        tokenizer: Arc<Tokenizer>,
    }

    impl OnnxCrossEncoder {
        pub fn load(model_path: impl AsRef<Path>, tokenizer_path: impl AsRef<Path>) -> anyhow::Result<Self> {
            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(2)?
                .commit_from_file(model_path)?;
            let tokenizer = Tokenizer::from_file(tokenizer_path)
                .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;
            Ok(Self { session: Arc::new(Mutex::new(session)), tokenizer: Arc::new(tokenizer) })
        }

        fn score_one(session: &Mutex<Session>, tokenizer: &Tokenizer, query: &str, document: &str) -> anyhow::Result<f64> {
            let encoding = tokenizer.encode((query, document), true).map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

            let mut ids: Vec<i64> = encoding.get_ids().iter().take(MAX_SEQ_LEN).map(|&id| id as i64).collect();
            let mut mask = vec![1i64; ids.len()];
            ids.resize(MAX_SEQ_LEN, 0);
            mask.resize(MAX_SEQ_LEN, 0);

            let input_ids = Tensor::from_array(([1usize, MAX_SEQ_LEN], ids.into_boxed_slice()))?;
            let attention_mask = Tensor::from_array(([1usize, MAX_SEQ_LEN], mask.into_boxed_slice()))?;

            let session = session.lock().map_err(|_| anyhow::anyhow!("cross-encoder session poisoned"))?;
            let outputs = session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
            ])?;

            let (_, logits) = outputs
                .get("logits")
                .ok_or_else(|| anyhow::anyhow!("model output missing 'logits'"))?
                .try_extract_tensor::<f32>()?;

            let logit = *logits.first().ok_or_else(|| anyhow::anyhow!("empty logits tensor"))?;
            Ok(1.0 / (1.0 + (-(logit as f64)).exp()))
        }
    }

    #[async_trait]
    impl CrossEncoder for OnnxCrossEncoder {
        async fn score_pairs(&self, query: &str, documents: &[String]) -> anyhow::Result<Vec<f64>> {
            let session = self.session.clone();
            let tokenizer = self.tokenizer.clone();
            let query = query.to_string();
            let documents = documents.to_vec();

            tokio::task::spawn_blocking(move || {
                documents.iter().map(|doc| Self::score_one(&session, &tokenizer, &query, doc)).collect::<anyhow::Result<Vec<f64>>>()
            })
            .await
            .map_err(|e| anyhow::anyhow!("cross-encoder worker task failed: {e}"))?
        }

        fn is_loaded(&self) -> bool {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown(semantic: f64) -> ScoreBreakdown {
        ScoreBreakdown { semantic, authority: 0.8, recency: 0.6, engine_trust: 0.9, position: 1.0 }
    }

    #[test]
    fn blend_with_semantic_matches_fixed_weights() {
        let b = breakdown(0.5);
        let expected = 0.45 * 0.5 + 0.20 * 0.8 + 0.15 * 0.6 + 0.10 * 0.9 + 0.10 * 1.0;
        assert!((blend(&b, true) - expected).abs() < 1e-9);
    }

    #[test]
    fn degraded_blend_renormalizes_to_unit_weight_sum() {
        let all_ones = ScoreBreakdown { semantic: 0.0, authority: 1.0, recency: 1.0, engine_trust: 1.0, position: 1.0 };
        assert!((blend(&all_ones, false) - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn degraded_cross_encoder_always_errors_and_reports_unloaded() {
        let encoder = DegradedCrossEncoder;
        assert!(!encoder.is_loaded());
        let result = encoder.score_pairs("query", &["doc".to_string()]).await;
        assert!(result.is_err());
    }
}
