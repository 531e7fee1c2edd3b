use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("invalid query: {0}")]
    QueryParser(#[from] tantivy::query::QueryParserError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("indexing cancelled")]
    Cancelled,

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}
