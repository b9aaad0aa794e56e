use chrono::{DateTime, Utc};
use smallvec::SmallVec;

/// A commit record as supplied by the ingestion collaborator.
///
/// This is plain payload data: the graph store tracks ids only, and the
/// presentation layer keeps whatever geometry it needs alongside.
#[derive(Debug, Clone)]
pub struct CommitRecord {
    /// Unique commit id (short SHA or synthetic id)
    pub id: String,
    /// Parent commit ids
    pub parents: SmallVec<[String; 2]>,
    /// Branches this commit is reachable from
    pub branches: Vec<String>,
    /// Commit timestamp
    pub timestamp: DateTime<Utc>,
    /// Author name
    pub author: String,
    /// Commit message (short)
    pub message: String,
}

impl CommitRecord {
    pub fn new(
        id: String,
        parents: Vec<String>,
        timestamp: DateTime<Utc>,
        author: String,
        message: String,
    ) -> Self {
        Self {
            id,
            parents: SmallVec::from_vec(parents),
            branches: Vec::new(),
            timestamp,
            author,
            message,
        }
    }

    pub fn with_branches(mut self, branches: Vec<String>) -> Self {
        self.branches = branches;
        self
    }

    /// Check if this is a root commit (no parents)
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Check if this is a merge commit (multiple parents)
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}
