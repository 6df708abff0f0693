pub mod postgres;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Tracker user id -> team colour.
pub type TeamColorMap = HashMap<u64, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub id: i64,
    pub color: Option<String>,
}

/// A member row of the local directory, which may not be linked to a tracker user yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMember {
    pub tracker_id: Option<u64>,
    pub name: Option<String>,
    pub team_id: Option<i64>,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("team directory query failed: {0}")]
    Query(#[from] tokio_postgres::Error),
}

/// Read-only lookup of team assignments.
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    async fn team_colors(&self) -> Result<TeamColorMap, DirectoryError>;
    async fn teams(&self) -> Result<Vec<Team>, DirectoryError>;
    async fn local_members(&self) -> Result<Vec<LocalMember>, DirectoryError>;
}
