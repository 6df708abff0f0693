use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{Tracker, TrackerError};
use crate::model::issue::{CreatedIssue, Member, Milestone, NewIssue, NewMilestone, SourceIssue};
use crate::model::project::ProjectId;

const PER_PAGE: &str = "100";

pub struct GitLabClient {
    api_base: String,
    token: String,
    client: reqwest::Client,
}

impl GitLabClient {
    pub fn new(base_url: &str, token: String) -> Self {
        Self {
            api_base: format!("{}/api/v4", base_url.trim_end_matches('/')),
            token,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("PRIVATE-TOKEN", &self.token)
    }

    /// GET every page of a list endpoint, following `x-next-page`.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, TrackerError> {
        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let page_str = page.to_string();
            let req = self
                .client
                .get(self.url(path))
                .query(query)
                .query(&[("per_page", PER_PAGE), ("page", page_str.as_str())]);
            let resp = checked(self.authed(req).send().await?).await?;
            let next = resp
                .headers()
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u32>().ok());
            let mut batch: Vec<T> = resp.json().await?;
            debug!(path, page, count = batch.len(), "fetched page");
            items.append(&mut batch);
            match next {
                Some(n) if n > page => page = n,
                _ => break,
            }
        }
        Ok(items)
    }
}

async fn checked(resp: Response) -> Result<Response, TrackerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TrackerError::Status {
        status: status.as_u16(),
        body,
    })
}

#[derive(Serialize)]
struct CreateIssueBody<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    assignee_ids: [u64; 1],
    confidential: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<NaiveDate>,
    labels: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    milestone_id: Option<u64>,
}

#[derive(Serialize)]
struct CreateMilestoneBody<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_date: Option<NaiveDate>,
}

#[async_trait]
impl Tracker for GitLabClient {
    async fn list_open_issues(&self, project: &ProjectId) -> Result<Vec<SourceIssue>, TrackerError> {
        let path = format!("/projects/{}/issues", project.encoded());
        self.get_all(&path, &[("state", "opened")]).await
    }

    async fn list_members(
        &self,
        project: &ProjectId,
        include_inherited: bool,
    ) -> Result<Vec<Member>, TrackerError> {
        let path = if include_inherited {
            format!("/projects/{}/members/all", project.encoded())
        } else {
            format!("/projects/{}/members", project.encoded())
        };
        self.get_all(&path, &[]).await
    }

    async fn create_issue(
        &self,
        project: &ProjectId,
        issue: &NewIssue,
    ) -> Result<CreatedIssue, TrackerError> {
        let body = CreateIssueBody {
            title: &issue.title,
            description: issue.description.as_deref(),
            assignee_ids: [issue.assignee_id],
            confidential: issue.confidential,
            due_date: issue.due_date,
            labels: issue.labels.join(","),
            milestone_id: issue.milestone_id,
        };
        let url = self.url(&format!("/projects/{}/issues", project.encoded()));
        let resp = self.authed(self.client.post(url).json(&body)).send().await?;
        Ok(checked(resp).await?.json().await?)
    }

    async fn close_issue(&self, project: &ProjectId, iid: u64) -> Result<(), TrackerError> {
        let url = self.url(&format!("/projects/{}/issues/{iid}", project.encoded()));
        let body = serde_json::json!({ "state_event": "close" });
        let resp = self.authed(self.client.put(url).json(&body)).send().await?;
        checked(resp).await?;
        Ok(())
    }

    async fn list_milestones(&self, project: &ProjectId) -> Result<Vec<Milestone>, TrackerError> {
        let path = format!("/projects/{}/milestones", project.encoded());
        self.get_all(&path, &[]).await
    }

    async fn create_milestone(
        &self,
        project: &ProjectId,
        milestone: &NewMilestone,
    ) -> Result<Milestone, TrackerError> {
        let body = CreateMilestoneBody {
            title: &milestone.title,
            description: milestone.description.as_deref(),
            due_date: milestone.due_date,
            start_date: milestone.start_date,
        };
        let url = self.url(&format!("/projects/{}/milestones", project.encoded()));
        let resp = self.authed(self.client.post(url).json(&body)).send().await?;
        Ok(checked(resp).await?.json().await?)
    }
}
