//! Result store.
//!
//! Raw scanner output is kept under a generated [`Identifier`] in an exact
//! lookup table, and its embedding is appended to a parallel vector index.
//! Both indices sit behind one mutex and are always mutated together, so
//! they never differ in size.

pub mod embedding;
pub mod ollama;

use crate::error::StoreError;
use crate::models::{Identifier, ScanResult, ScanToolKind};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub use embedding::{cosine_similarity, Embedder, HashingEmbedder};
pub use ollama::{OllamaEmbedder, OllamaEmbedderSettings};

/// A stored result together with its similarity to a query.
#[derive(Debug, Clone)]
pub struct SimilarResult {
    pub result: ScanResult,
    pub score: f32,
}

/// Insertion-ordered vectors, aligned with `ids`.
#[derive(Debug, Default)]
struct VectorIndex {
    ids: VecDeque<Identifier>,
    vectors: VecDeque<Vec<f32>>,
}

#[derive(Debug, Default)]
struct StoreInner {
    records: HashMap<Identifier, ScanResult>,
    index: VectorIndex,
}

/// Shared store for scan results. Construct once and hand out an `Arc`.
pub struct ResultStore {
    inner: Mutex<StoreInner>,
    embedder: Box<dyn Embedder>,
    /// Maximum number of results kept; `None` keeps everything.
    capacity: Option<usize>,
}

impl ResultStore {
    /// Unbounded store with the given embedder.
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            embedder,
            capacity: None,
        }
    }

    /// Evict the oldest results once `capacity` is exceeded.
    pub fn with_capacity(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity.filter(|c| *c > 0);
        self
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // Mutations never panic mid-update, so a poisoned guard is consistent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store raw scanner output and return its fresh identifier.
    ///
    /// An embedding failure never loses the result: it is indexed under a
    /// zero vector, which matches no query.
    pub async fn store(&self, source_tool: ScanToolKind, raw_text: impl Into<String>) -> Identifier {
        let raw_text = raw_text.into();
        let vector = match self.embedder.embed(&raw_text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Indexing {} result without an embedding: {}", source_tool, e);
                vec![0.0; self.embedder.dimensions()]
            }
        };

        let mut inner = self.lock();
        let mut identifier = Identifier::generate();
        while inner.records.contains_key(&identifier) {
            identifier = Identifier::generate();
        }

        inner.records.insert(
            identifier,
            ScanResult {
                identifier,
                raw_text,
                source_tool,
                stored_at: Utc::now(),
            },
        );
        inner.index.ids.push_back(identifier);
        inner.index.vectors.push_back(vector);

        if let Some(capacity) = self.capacity {
            while inner.index.ids.len() > capacity {
                if let Some(oldest) = inner.index.ids.pop_front() {
                    inner.index.vectors.pop_front();
                    inner.records.remove(&oldest);
                    debug!("Evicted result {}", oldest);
                }
            }
        }

        info!("Stored {} result {}", source_tool, identifier);
        identifier
    }

    /// Look up a result by identifier.
    pub fn retrieve(&self, identifier: &Identifier) -> Result<ScanResult, StoreError> {
        self.lock()
            .records
            .get(identifier)
            .cloned()
            .ok_or_else(|| StoreError::not_found(identifier))
    }

    /// Nearest stored results to `query`, best first.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SimilarResult>, StoreError> {
        let query = self.embedder.embed(query).await?;
        let inner = self.lock();

        let mut scored: Vec<(Identifier, f32)> = inner
            .index
            .ids
            .iter()
            .zip(inner.index.vectors.iter())
            .map(|(id, vector)| (*id, cosine_similarity(&query, vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .filter_map(|(id, score)| {
                inner.records.get(&id).map(|result| SimilarResult {
                    result: result.clone(),
                    score,
                })
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the vector index. Always equal to [`ResultStore::len`].
    pub fn vector_count(&self) -> usize {
        self.lock().index.vectors.len()
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new(Box::new(HashingEmbedder::default()))
    }
}

impl std::fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStore")
            .field("len", &self.len())
            .field("dimensions", &self.embedder.dimensions())
            .field("capacity", &self.capacity)
            .finish()
    }
}
