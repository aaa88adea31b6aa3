use thiserror::Error;

use crate::resolution::OracleError;

/// Errors that can occur during code graph construction.
#[derive(Error, Debug)]
pub enum CodeGraphError {
    #[error("file error: {message} (path: {path})")]
    File { message: String, path: String },

    #[error("parse error: {message} (path: {path}, line: {line:?})")]
    Parse {
        message: String,
        path: String,
        line: Option<u32>,
    },

    #[error("unknown construct '{node_kind}' (path: {path}, line: {line})")]
    UnknownConstruct {
        node_kind: String,
        path: String,
        line: u32,
    },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results using `CodeGraphError`.
pub type Result<T> = std::result::Result<T, CodeGraphError>;
