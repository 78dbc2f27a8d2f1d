use crate::chunking::chunk_words;
use crate::error::Result;
use crate::extractor::extract_text;
use crate::gateway::EmbeddingClient;
use crate::models::{ChunkMeta, ChunkingConfig, DegradedFile, IngestionReport, SourceDocument};
use crate::store::VectorStore;

/// Orchestrates the two retrieval flows: extract → chunk → embed → upsert on
/// ingestion, and embed-query → nearest-neighbor → metadata on lookup. The
/// only component that talks to the embedding gateway.
pub struct RetrievalPipeline<E: EmbeddingClient> {
    store: VectorStore,
    embedder: E,
    chunking: ChunkingConfig,
}

impl<E: EmbeddingClient + Send + Sync> RetrievalPipeline<E> {
    pub fn new(store: VectorStore, embedder: E) -> Self {
        Self {
            store,
            embedder,
            chunking: ChunkingConfig::default(),
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Ingests a batch of uploaded documents. All chunks from the whole call
    /// are embedded before anything is written, so a gateway failure never
    /// leaves a partial batch in the index. A call that produces zero usable
    /// chunks returns without touching the store.
    pub async fn ingest(&mut self, documents: &[SourceDocument]) -> Result<IngestionReport> {
        let mut report = IngestionReport {
            documents: documents.len(),
            ..Default::default()
        };
        let mut chunks: Vec<String> = Vec::new();
        let mut metas: Vec<ChunkMeta> = Vec::new();

        for document in documents {
            let extraction = extract_text(&document.bytes, &document.filename);
            if let Some(diagnostic) = &extraction.diagnostic {
                report.degraded.push(DegradedFile {
                    filename: document.filename.clone(),
                    reason: diagnostic.reason().to_string(),
                });
            }

            for chunk in chunk_words(&extraction.text, &self.chunking)? {
                if chunk.trim().is_empty() {
                    continue;
                }
                metas.push(ChunkMeta {
                    text: chunk.clone(),
                    filename: document.filename.clone(),
                    source: document.source.clone(),
                });
                chunks.push(chunk);
            }
        }

        if chunks.is_empty() {
            return Ok(report);
        }

        let vectors = self.embedder.embed(&chunks).await?;
        let pairs: Vec<(Vec<f32>, ChunkMeta)> = vectors.into_iter().zip(metas).collect();
        report.chunks_indexed = pairs.len();
        self.store.upsert(pairs, self.embedder.model())?;

        Ok(report)
    }

    /// Embeds `text` and returns up to `k` grounding chunks by descending
    /// cosine similarity. An empty index yields an empty result set.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ChunkMeta>> {
        if self.store.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embedder.embed(&[text.to_string()]).await?;
        let Some(vector) = vectors.into_iter().next() else {
            return Ok(Vec::new());
        };

        Ok(self.store.query(&vector, k)?)
    }
}
