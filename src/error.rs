//! Error types of the search engine.
//!
//! Only two things can go wrong inside the engine: text that does not compile
//! (expressions and regular expressions) and geometries that cannot be measured.
//! Everything else (missing variables, type mismatches, nulls) evaluates to `false`.

use thiserror::Error;

/// A filter expression or regular expression failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}: '{text}'", offset.map(|o| format!(" at offset {o}")).unwrap_or_default())]
pub struct ParseError {
    pub message: String,
    /// The complete source text that failed to compile.
    pub text: String,
    /// Character offset into `text`, when known.
    pub offset: Option<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            text: text.into(),
            offset: None,
        }
    }

    pub fn at(message: impl Into<String>, text: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            text: text.into(),
            offset: Some(offset),
        }
    }
}

/// The distance predicate met a geometry it cannot measure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("Unsupported geometry type: {kind}")]
    Unsupported { kind: &'static str },
}

/// Failure of a search run.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("Failed to load tile {tile}: {source}")]
    TileLoad {
        tile: String,
        #[source]
        source: anyhow::Error,
    },
}
