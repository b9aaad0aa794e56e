use thiserror::Error;

/// Typed failures for graph mutation, layout, and collision operations.
///
/// Every variant is recoverable: a rejected mutation leaves the store
/// exactly as it was before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node '{0}' already exists")]
    DuplicateNode(String),

    #[error("node '{0}' does not exist")]
    NodeNotFound(String),

    #[error("edge '{from}' -> '{to}' does not exist")]
    EdgeNotFound { from: String, to: String },

    #[error("edge '{from}' -> '{to}' would create a cycle")]
    CreatesCycle { from: String, to: String },

    #[error("graph is not acyclic")]
    NotAcyclic,

    #[error("graph has no root: every node has at least one predecessor")]
    NoRoot,

    #[error("node '{0}' has multiple direct parents; layered layout requires tree-shaped ancestry")]
    MultipleParents(String),
}
