pub mod gitlab;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::issue::{CreatedIssue, Member, Milestone, NewIssue, NewMilestone, SourceIssue};
use crate::model::project::ProjectId;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tracker returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// The slice of the issue tracker's API the replication engine needs.
#[async_trait]
pub trait Tracker: Send + Sync {
    async fn list_open_issues(&self, project: &ProjectId) -> Result<Vec<SourceIssue>, TrackerError>;
    async fn list_members(
        &self,
        project: &ProjectId,
        include_inherited: bool,
    ) -> Result<Vec<Member>, TrackerError>;
    async fn create_issue(
        &self,
        project: &ProjectId,
        issue: &NewIssue,
    ) -> Result<CreatedIssue, TrackerError>;
    async fn close_issue(&self, project: &ProjectId, iid: u64) -> Result<(), TrackerError>;
    async fn list_milestones(&self, project: &ProjectId) -> Result<Vec<Milestone>, TrackerError>;
    async fn create_milestone(
        &self,
        project: &ProjectId,
        milestone: &NewMilestone,
    ) -> Result<Milestone, TrackerError>;
}

#[cfg(test)]
pub mod mock;
