pub mod casefile;
pub mod chunking;
pub mod error;
pub mod extractor;
pub mod gateway;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod store;

pub use casefile::{
    analyze_gaps, build_case_study, cover_prompt, draft_case_study, parse_questions_list,
    suggest_diagram_prompts, CaseSections, CASE_TEMPLATE,
};
pub use chunking::chunk_words;
pub use error::{GatewayError, IngestError, StoreError};
pub use extractor::{extract_text, Extraction, ExtractionDiagnostic};
pub use gateway::{
    ChatClient, EmbeddingClient, GatewayConfig, ImageClient, OpenAiGateway, DEFAULT_CHAT_MODEL,
    DEFAULT_EMBED_MODEL, DEFAULT_IMAGE_MODEL,
};
pub use ingest::{discover_document_files, load_documents, load_folder};
pub use models::{
    ChatMessage, ChunkMeta, ChunkingConfig, DegradedFile, DocumentFormat, IngestionReport,
    SourceDocument,
};
pub use pipeline::RetrievalPipeline;
pub use store::{normalize_l2, IndexRecord, VectorStore, DEFAULT_INDEX_FILE};
