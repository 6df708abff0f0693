use serde::{Deserialize, Serialize};
use std::fmt;

/// A tracker project reference: either a numeric id or a `group/project` path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    /// Form usable as a single URL path segment.
    pub fn encoded(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scope of every mapping-store entry: one replication relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub source: ProjectId,
    pub dest: ProjectId,
}

impl Namespace {
    pub fn new(source: ProjectId, dest: ProjectId) -> Self {
        Self { source, dest }
    }

    pub fn key(&self) -> String {
        format!("{}:{}", self.source, self.dest)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.dest)
    }
}
