use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An open issue in the source project, as returned by the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceIssue {
    pub id: u64,
    /// Project-scoped number, the `#123` users see.
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub milestone: Option<Milestone>,
    #[serde(default)]
    pub confidential: bool,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<Member>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: u64,
    #[serde(default)]
    pub iid: Option<u64>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired: Option<bool>,
}

/// A project member. `id` is the tracker user id the team directory is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub username: String,
}

/// Payload for one derived issue.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIssue {
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: u64,
    pub confidential: bool,
    pub due_date: Option<NaiveDate>,
    pub labels: Vec<String>,
    pub milestone_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CreatedIssue {
    pub id: u64,
    pub iid: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMilestone {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
}

impl From<&Milestone> for NewMilestone {
    fn from(source: &Milestone) -> Self {
        Self {
            title: source.title.clone(),
            description: source.description.clone(),
            due_date: source.due_date,
            start_date: source.start_date,
        }
    }
}
