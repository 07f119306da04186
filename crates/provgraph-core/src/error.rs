use thiserror::Error;

use crate::model::{EdgeKind, VertexKind};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{kind} edge requires {expected_src} -> {expected_dst}, got {src} -> {dst}")]
    InvalidEdge {
        kind: EdgeKind,
        expected_src: VertexKind,
        expected_dst: VertexKind,
        src: VertexKind,
        dst: VertexKind,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown {category} type: {name}")]
    Registry { category: &'static str, name: String },

    #[error("Bad index {index} for a chain of {len} filters")]
    BadIndex { index: usize, len: usize },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Kernel is not running")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
