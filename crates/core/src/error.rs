use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("index store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("vector dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding model {actual} does not match index model {expected}")]
    ModelMismatch { expected: String, actual: String },
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{} API error [{}]: {}", .operation, .status.map(|code| code.to_string()).unwrap_or_else(|| "unknown".to_string()), .details)]
    Api {
        operation: &'static str,
        status: Option<u16>,
        details: String,
    },

    #[error("gateway api key is missing: set OPENAI_API_KEY")]
    MissingApiKey,

    #[error("empty response from {0} API")]
    EmptyResponse(&'static str),

    #[error("base64 decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
