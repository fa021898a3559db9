use crate::config::BridgeConfig;
use anyhow::{Context, Result, anyhow};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::time::Instant;
use tracing::{debug, info};

pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

const PROBE_TEXT: &str = "dimension_check";

/// Anything that turns an ordered batch of texts into an ordered batch of
/// fixed-length vectors.
pub trait Embedder {
    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dims(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// The single loaded model for this process.
pub struct EmbedderHandle {
    model: TextEmbedding,
    name: String,
    batch_size: Option<usize>,
    pub dims: usize,
}

impl EmbedderHandle {
    pub fn load(config: &BridgeConfig) -> Result<Self> {
        let choice = resolve_model(&config.model_name)?;
        let start = Instant::now();

        let mut options = InitOptions::new(choice.clone())
            .with_show_download_progress(config.show_download_progress);
        if let Some(dir) = &config.cache_dir {
            options = options.with_cache_dir(dir.clone());
        }
        if let Some(max_length) = config.max_length {
            options = options.with_max_length(max_length);
        }

        let mut model = TextEmbedding::try_new(options)
            .with_context(|| format!("failed to load embedding model {}", config.model_name))?;
        let dims = model
            .embed(vec![PROBE_TEXT.to_string()], None)
            .context("embedding model failed its startup probe")?
            .first()
            .map(|vec| vec.len())
            .ok_or_else(|| anyhow!("no embedding returned"))?;

        info!(
            model = %config.model_name,
            variant = ?choice,
            dims,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "embedding model loaded"
        );

        Ok(Self {
            model,
            name: config.model_name.clone(),
            batch_size: config.batch_size,
            dims,
        })
    }
}

impl Embedder for EmbedderHandle {
    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let embeddings = self.model.embed(texts.to_vec(), self.batch_size)?;
        debug!(
            texts = texts.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "batch embedded"
        );
        Ok(embeddings)
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

/// A row of the fastembed catalog, flattened for display.
#[derive(Debug, Clone)]
pub struct ModelListing {
    pub code: String,
    pub dims: usize,
    pub description: String,
}

pub fn supported_models() -> Vec<ModelListing> {
    TextEmbedding::list_supported_models()
        .into_iter()
        .map(|info| ModelListing {
            code: info.model_code,
            dims: info.dim,
            description: info.description,
        })
        .collect()
}

pub fn resolve_model(name: &str) -> Result<EmbeddingModel> {
    let catalog = TextEmbedding::list_supported_models();
    let candidates: Vec<(String, String)> = catalog
        .iter()
        .map(|info| (info.model_code.clone(), format!("{:?}", info.model)))
        .collect();
    pick_model(&candidates, name)
        .and_then(|idx| catalog.into_iter().nth(idx))
        .map(|info| info.model)
        .ok_or_else(|| {
            anyhow!(
                "unknown embedding model {name:?} (run with --list-models to see supported names)"
            )
        })
}

/// Index of the best `(code, variant)` match for `name`. An exact code
/// wins, then the first full-precision match; fastembed names its
/// quantized variants with a trailing `Q`.
pub fn pick_model(candidates: &[(String, String)], name: &str) -> Option<usize> {
    let name = name.trim();
    if let Some(idx) = candidates
        .iter()
        .position(|(code, _)| code.eq_ignore_ascii_case(name))
    {
        return Some(idx);
    }
    let matching: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, (code, variant))| model_name_matches(code, variant, name))
        .map(|(idx, _)| idx)
        .collect();
    matching
        .iter()
        .copied()
        .find(|&idx| !candidates[idx].1.ends_with('Q'))
        .or_else(|| matching.first().copied())
}

/// Accepts the full catalog code, its last path segment with or without an
/// `-onnx` suffix, or the enum variant name. A name with an org prefix
/// (`sentence-transformers/all-MiniLM-L6-v2`) is also compared by its own
/// last segment. Case-insensitive.
pub fn model_name_matches(code: &str, variant: &str, name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() {
        return false;
    }
    let short = code.rsplit('/').next().unwrap_or(code);
    let bare = strip_suffix_ignore_case(short, "-onnx").unwrap_or(short);
    if [code, short, bare, variant]
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(name))
    {
        return true;
    }
    match name.rsplit_once('/') {
        Some((_, last)) if !last.is_empty() => {
            short.eq_ignore_ascii_case(last) || bare.eq_ignore_ascii_case(last)
        }
        _ => false,
    }
}

fn strip_suffix_ignore_case<'a>(value: &'a str, suffix: &str) -> Option<&'a str> {
    let split = value.len().checked_sub(suffix.len())?;
    if !value.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = value.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}
