use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Tracker, TrackerError};
use crate::model::issue::{CreatedIssue, Member, Milestone, NewIssue, NewMilestone, SourceIssue};
use crate::model::project::ProjectId;

/// In-memory tracker recording every mutation for assertions.
pub struct MockTracker {
    issues: Vec<SourceIssue>,
    members: Vec<Member>,
    milestones: Mutex<Vec<Milestone>>,
    created: Mutex<Vec<NewIssue>>,
    closed: Mutex<Vec<u64>>,
    milestone_creates: Mutex<Vec<NewMilestone>>,
    fail_assignees: Mutex<Vec<u64>>,
    fail_close: bool,
    fail_members: bool,
    milestone_latency: Duration,
    next_issue_iid: AtomicU64,
    next_milestone_id: AtomicU64,
}

impl MockTracker {
    pub fn new() -> Self {
        Self {
            issues: Vec::new(),
            members: Vec::new(),
            milestones: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
            milestone_creates: Mutex::new(Vec::new()),
            fail_assignees: Mutex::new(Vec::new()),
            fail_close: false,
            fail_members: false,
            milestone_latency: Duration::ZERO,
            next_issue_iid: AtomicU64::new(1000),
            next_milestone_id: AtomicU64::new(500),
        }
    }

    pub fn with_issues(mut self, issues: Vec<SourceIssue>) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_members(mut self, members: Vec<Member>) -> Self {
        self.members = members;
        self
    }

    pub fn with_milestones(self, milestones: Vec<Milestone>) -> Self {
        *self.milestones.lock().unwrap() = milestones;
        self
    }

    pub fn failing_for(self, assignee_id: u64) -> Self {
        self.fail_assignees.lock().unwrap().push(assignee_id);
        self
    }

    /// Let creations for a previously failing assignee succeed again.
    pub fn recover(&self, assignee_id: u64) {
        self.fail_assignees.lock().unwrap().retain(|id| *id != assignee_id);
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn failing_members(mut self) -> Self {
        self.fail_members = true;
        self
    }

    /// Make milestone listing yield so concurrent callers interleave.
    pub fn with_milestone_latency(mut self, latency: Duration) -> Self {
        self.milestone_latency = latency;
        self
    }

    pub fn created(&self) -> Vec<NewIssue> {
        self.created.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Vec<u64> {
        self.closed.lock().unwrap().clone()
    }

    pub fn milestone_creates(&self) -> Vec<NewMilestone> {
        self.milestone_creates.lock().unwrap().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.created.lock().unwrap().len()
            + self.closed.lock().unwrap().len()
            + self.milestone_creates.lock().unwrap().len()
    }
}

fn forbidden(what: &str) -> TrackerError {
    TrackerError::Status {
        status: 403,
        body: format!("{what} forbidden"),
    }
}

#[async_trait]
impl Tracker for MockTracker {
    async fn list_open_issues(&self, _project: &ProjectId) -> Result<Vec<SourceIssue>, TrackerError> {
        Ok(self
            .issues
            .iter()
            .filter(|i| !self.closed.lock().unwrap().contains(&i.iid))
            .cloned()
            .collect())
    }

    async fn list_members(
        &self,
        _project: &ProjectId,
        _include_inherited: bool,
    ) -> Result<Vec<Member>, TrackerError> {
        if self.fail_members {
            return Err(forbidden("member list"));
        }
        Ok(self.members.clone())
    }

    async fn create_issue(
        &self,
        _project: &ProjectId,
        issue: &NewIssue,
    ) -> Result<CreatedIssue, TrackerError> {
        tokio::task::yield_now().await;
        if self.fail_assignees.lock().unwrap().contains(&issue.assignee_id) {
            return Err(forbidden("issue create"));
        }
        self.created.lock().unwrap().push(issue.clone());
        let iid = self.next_issue_iid.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedIssue { id: iid * 10, iid })
    }

    async fn close_issue(&self, _project: &ProjectId, iid: u64) -> Result<(), TrackerError> {
        if self.fail_close {
            return Err(forbidden("issue close"));
        }
        self.closed.lock().unwrap().push(iid);
        Ok(())
    }

    async fn list_milestones(&self, _project: &ProjectId) -> Result<Vec<Milestone>, TrackerError> {
        if !self.milestone_latency.is_zero() {
            tokio::time::sleep(self.milestone_latency).await;
        }
        Ok(self.milestones.lock().unwrap().clone())
    }

    async fn create_milestone(
        &self,
        _project: &ProjectId,
        milestone: &NewMilestone,
    ) -> Result<Milestone, TrackerError> {
        let id = self.next_milestone_id.fetch_add(1, Ordering::SeqCst);
        let created = Milestone {
            id,
            iid: None,
            title: milestone.title.clone(),
            description: milestone.description.clone(),
            due_date: milestone.due_date,
            start_date: milestone.start_date,
            state: Some("active".into()),
            created_at: None,
            expired: None,
        };
        self.milestone_creates.lock().unwrap().push(milestone.clone());
        self.milestones.lock().unwrap().push(created.clone());
        Ok(created)
    }
}

pub fn issue(iid: u64, title: &str, labels: &[&str]) -> SourceIssue {
    SourceIssue {
        id: iid + 10_000,
        iid,
        title: title.to_string(),
        description: Some(format!("{title} body")),
        labels: labels.iter().map(|l| l.to_string()).collect(),
        milestone: None,
        confidential: false,
        due_date: None,
        state: "opened".into(),
        created_at: None,
        assignee: None,
    }
}

pub fn milestone(id: u64, title: &str) -> Milestone {
    Milestone {
        id,
        iid: Some(id),
        title: title.to_string(),
        description: Some(format!("{title} description")),
        due_date: chrono::NaiveDate::from_ymd_opt(2024, 6, 30),
        start_date: chrono::NaiveDate::from_ymd_opt(2024, 6, 1),
        state: Some("active".into()),
        created_at: None,
        expired: Some(false),
    }
}

pub fn member(id: u64, name: &str) -> Member {
    Member {
        id,
        name: name.to_string(),
        username: name.to_lowercase(),
    }
}
