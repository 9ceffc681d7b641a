use thiserror::Error;

use crate::id::{EdgeId, VertexId};

/// Canonical result for the compiler.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure is fatal to the current compilation attempt and carries the
/// ids of whatever the caller has to fix.
#[derive(Debug, Error)]
pub enum Error {
    // Structural errors: the builder was asked to do something impossible.
    #[error("vertex {0} is not registered in the DAG")]
    MissingVertex(VertexId),

    #[error("the DAG does not contain the endpoint {missing} of edge {edge} ({src} -> {dst})")]
    MissingEndpoint {
        edge: EdgeId,
        src: VertexId,
        dst: VertexId,
        missing: VertexId,
    },

    // Integrity violations found while snapshotting a builder.
    #[error("DAG contains a cycle through {0:?}")]
    Cycle(Vec<VertexId>),

    #[error("DAG source check failed, vertices without inputs are not sources: {0:?}")]
    SourceRule(Vec<VertexId>),

    #[error("DAG sink check failed, vertices without outputs are not operators or loops: {0:?}")]
    SinkRule(Vec<VertexId>),

    #[error("DAG execution property check failed: {reason}: {offenders:?}")]
    PropertyConflict {
        reason: &'static str,
        offenders: Vec<String>,
    },

    // A reshaping pass found a graph without the shape it needs.
    #[error("pass '{pass}' cannot apply: {reason}")]
    PassPrecondition { pass: &'static str, reason: String },

    #[error("lowering error: {0}")]
    Lowering(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("graph description error: {0}")]
    Dsl(String),

    #[error("Hashing error: {0}")]
    Hash(String),
}

impl Error {
    /// Whether this is one of the snapshot-time integrity violations.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Error::Cycle(_) | Error::SourceRule(_) | Error::SinkRule(_) | Error::PropertyConflict { .. }
        )
    }

    /// Whether this is a structural misuse of the builder.
    pub fn is_structural(&self) -> bool {
        matches!(self, Error::MissingVertex(_) | Error::MissingEndpoint { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Hash(e.to_string())
    }
}
