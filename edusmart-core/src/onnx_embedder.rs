//! Local embedding backend: `all-MiniLM-L6-v2` through ONNX Runtime
//!
//! The same sentence model a default vector-store install embeds with, so a
//! catalog seeded offline searches the same way as one seeded in the cloud.
//! Produces 384-dimensional, L2-normalised vectors.

use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::embeddings::{EmbeddingBackend, EmbeddingError, OnnxConfig};

const MODEL_FILE: &str = "all-MiniLM-L6-v2.onnx";
const TOKENIZER_FILE: &str = "all-MiniLM-L6-v2-tokenizer.json";

/// Local ONNX embedding client.
pub struct OnnxEmbeddingClient {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<tokenizers::Tokenizer>,
    dimensions: usize,
}

impl std::fmt::Debug for OnnxEmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingClient")
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbeddingClient {
    /// Load the model and tokenizer named in `config`.
    pub fn new(config: OnnxConfig) -> Result<Self, EmbeddingError> {
        require_file(&config.model_path)?;
        require_file(&config.tokenizer_path)?;

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(&config.model_path))
            .map_err(|e| EmbeddingError::OnnxInference(e.to_string()))?;

        let tokenizer = tokenizers::Tokenizer::from_file(&config.tokenizer_path)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        tracing::info!(
            model = %config.model_path.display(),
            dimensions = config.dimensions,
            "Loaded local embedding model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimensions: config.dimensions,
        })
    }
}

fn require_file(path: &Path) -> Result<(), EmbeddingError> {
    if path.exists() {
        Ok(())
    } else {
        Err(EmbeddingError::ModelNotFound {
            path: path.display().to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OnnxEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        // CPU-bound; keep it off the async workers.
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let dimensions = self.dimensions;
        let text = text.to_string();

        let result = tokio::task::spawn_blocking(move || {
            let mut session_guard = session
                .lock()
                .map_err(|e| EmbeddingError::OnnxInference(format!("session lock poisoned: {e}")))?;
            embed_sync(&mut session_guard, &tokenizer, &text, dimensions)
        })
        .await
        .map_err(|e| EmbeddingError::OnnxInference(format!("spawn_blocking join error: {e}")))?;

        result.map(Some)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

struct EncodedText {
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
    token_type_ids: Vec<i64>,
}

fn encode(tokenizer: &tokenizers::Tokenizer, text: &str) -> Result<EncodedText, EmbeddingError> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

    let widen = |xs: &[u32]| xs.iter().map(|&x| x as i64).collect::<Vec<i64>>();

    Ok(EncodedText {
        input_ids: widen(encoding.get_ids()),
        attention_mask: widen(encoding.get_attention_mask()),
        token_type_ids: widen(encoding.get_type_ids()),
    })
}

fn tensor(shape: &[i64], data: Vec<i64>) -> Result<Tensor<i64>, EmbeddingError> {
    Tensor::from_array((shape.to_vec(), data)).map_err(|e| EmbeddingError::OnnxInference(e.to_string()))
}

fn embed_sync(
    session: &mut Session,
    tokenizer: &tokenizers::Tokenizer,
    text: &str,
    expected_dims: usize,
) -> Result<Vec<f32>, EmbeddingError> {
    let encoded = encode(tokenizer, text)?;
    let shape = [1i64, encoded.input_ids.len() as i64];
    let mask = encoded.attention_mask.clone();

    let input_ids = tensor(&shape, encoded.input_ids)?;
    let attention_mask = tensor(&shape, encoded.attention_mask)?;
    let token_type_ids = tensor(&shape, encoded.token_type_ids)?;

    let inputs = ort::inputs! {
        "input_ids" => input_ids,
        "attention_mask" => attention_mask,
        "token_type_ids" => token_type_ids,
    };

    let outputs = session
        .run(inputs)
        .map_err(|e| EmbeddingError::OnnxInference(e.to_string()))?;

    // last_hidden_state: [1, seq_len, hidden]
    let (out_shape, data) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| EmbeddingError::OnnxInference(e.to_string()))?;

    if out_shape.len() != 3 {
        return Err(EmbeddingError::OnnxInference(format!(
            "Expected 3D output, got {}D",
            out_shape.len()
        )));
    }

    let mut pooled = mean_pool(data, &mask, out_shape[1] as usize, out_shape[2] as usize);
    l2_normalize(&mut pooled);

    if pooled.len() != expected_dims {
        return Err(EmbeddingError::InvalidDimensions {
            expected: expected_dims,
            actual: pooled.len(),
        });
    }

    Ok(pooled)
}

/// Average token vectors, counting only positions the attention mask keeps.
fn mean_pool(hidden: &[f32], mask: &[i64], seq_len: usize, hidden_dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_dim];
    let mut kept = 0.0f32;

    for (tok_idx, row) in hidden.chunks_exact(hidden_dim).take(seq_len).enumerate() {
        let weight = mask.get(tok_idx).copied().unwrap_or(0) as f32;
        if weight <= 0.0 {
            continue;
        }
        kept += weight;
        for (acc, value) in pooled.iter_mut().zip(row) {
            *acc += value * weight;
        }
    }

    if kept > 0.0 {
        pooled.iter_mut().for_each(|v| *v /= kept);
    }
    pooled
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// `$XDG_DATA_HOME/edusmart/models`, or `~/.local/share/edusmart/models`.
pub fn default_model_dir() -> PathBuf {
    let data_home = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local/share")
        });
    data_home.join("edusmart/models")
}

/// Model and tokenizer paths. An empty setting means the default directory;
/// otherwise the tokenizer sits next to the model as `<stem>-tokenizer.json`.
pub fn resolve_onnx_paths(onnx_model_path: &str) -> (PathBuf, PathBuf) {
    if onnx_model_path.is_empty() {
        let dir = default_model_dir();
        return (dir.join(MODEL_FILE), dir.join(TOKENIZER_FILE));
    }

    let model = PathBuf::from(onnx_model_path);
    let stem = model
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let tokenizer = model.with_file_name(format!("{stem}-tokenizer.json"));
    (model, tokenizer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::ONNX_DIMENSIONS;

    #[test]
    fn missing_model_file_is_reported() {
        let config = OnnxConfig {
            model_path: PathBuf::from("/nonexistent/model.onnx"),
            tokenizer_path: PathBuf::from("/nonexistent/tokenizer.json"),
            dimensions: ONNX_DIMENSIONS,
        };

        match OnnxEmbeddingClient::new(config) {
            Err(EmbeddingError::ModelNotFound { path }) => {
                assert_eq!(path, "/nonexistent/model.onnx");
            }
            other => panic!("Expected ModelNotFound, got: {other:?}"),
        }
    }

    #[test]
    fn mean_pool_ignores_masked_tokens() {
        // two tokens, hidden_dim 2; second token is padding
        let hidden = [1.0, 3.0, 100.0, 100.0];
        let pooled = mean_pool(&hidden, &[1, 0], 2, 2);
        assert_eq!(pooled, vec![1.0, 3.0]);
    }

    #[test]
    fn mean_pool_averages_kept_tokens() {
        let hidden = [1.0, 0.0, 3.0, 2.0];
        let pooled = mean_pool(&hidden, &[1, 1], 2, 2);
        assert_eq!(pooled, vec![2.0, 1.0]);
    }

    #[test]
    fn l2_normalize_produces_unit_vectors() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn default_paths_live_under_edusmart_models() {
        let (model, tokenizer) = resolve_onnx_paths("");
        assert!(model.to_string_lossy().contains("edusmart/models"));
        assert!(model.to_string_lossy().ends_with(MODEL_FILE));
        assert!(tokenizer.to_string_lossy().ends_with(TOKENIZER_FILE));
    }

    #[test]
    fn custom_model_path_puts_tokenizer_alongside() {
        let (model, tokenizer) = resolve_onnx_paths("/opt/models/minilm.onnx");
        assert_eq!(model, PathBuf::from("/opt/models/minilm.onnx"));
        assert_eq!(tokenizer, PathBuf::from("/opt/models/minilm-tokenizer.json"));
    }
}
