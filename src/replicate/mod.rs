//! Fan-out of mission issues from the source project into the destination.

pub mod milestone;
pub mod recipients;
pub mod report;

use futures::future::join_all;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::directory::{DirectoryError, TeamDirectory};
use crate::model::issue::{NewIssue, SourceIssue};
use crate::model::label::{self, Classification};
use crate::model::project::Namespace;
use crate::store::{MappingStore, StoreError, Table};
use crate::tracker::{Tracker, TrackerError};

use milestone::MilestoneReconciler;
use recipients::Recipient;
use report::{ExecutionReport, IssueReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Read-only: no tracker mutation, no mapping-store writes.
    Preview,
    Execute,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Preview => f.write_str("preview"),
            RunMode::Execute => f.write_str("execute"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicateOptions {
    /// Close each source issue once all of its derived issues were created.
    pub close_on_success: bool,
    /// Create copies even for recipients the mapping store says already have one.
    pub force: bool,
}

#[derive(Debug, Error)]
pub enum ReplicateError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

enum RecipientOutcome {
    Planned,
    Created { iid: u64, mapping_error: Option<StoreError> },
    Failed(TrackerError),
}

pub struct Replicator<'a> {
    tracker: &'a dyn Tracker,
    directory: &'a dyn TeamDirectory,
    store: &'a dyn MappingStore,
    namespace: &'a Namespace,
    options: ReplicateOptions,
}

impl<'a> Replicator<'a> {
    pub fn new(
        tracker: &'a dyn Tracker,
        directory: &'a dyn TeamDirectory,
        store: &'a dyn MappingStore,
        namespace: &'a Namespace,
        options: ReplicateOptions,
    ) -> Self {
        Self {
            tracker,
            directory,
            store,
            namespace,
            options,
        }
    }

    /// Process every issue concurrently; segments keep the input order.
    pub async fn replicate(&self, issues: &[SourceIssue], mode: RunMode) -> ExecutionReport {
        info!(namespace = %self.namespace, %mode, issues = issues.len(), "replication started");
        let milestones = MilestoneReconciler::new(self.tracker, self.store, self.namespace, mode);
        let segments = join_all(
            issues
                .iter()
                .map(|issue| self.process_issue(issue, mode, &milestones)),
        )
        .await;
        let report = ExecutionReport::new(mode, segments);
        info!(
            %mode,
            created = report.created(),
            planned = report.planned(),
            failed = report.failed(),
            skipped = report.skipped(),
            "replication finished"
        );
        report
    }

    async fn process_issue(
        &self,
        issue: &SourceIssue,
        mode: RunMode,
        milestones: &MilestoneReconciler<'_>,
    ) -> IssueReport {
        let mut report = IssueReport::new(issue);
        if let Err(err) = self.replicate_issue(issue, mode, milestones, &mut report).await {
            error!(iid = issue.iid, error = ?err, "issue skipped after unexpected failure");
            report.skipped = true;
            report.line(format!("[Error] skipped: {err}"));
        }
        report
    }

    async fn replicate_issue(
        &self,
        issue: &SourceIssue,
        mode: RunMode,
        milestones: &MilestoneReconciler<'_>,
        report: &mut IssueReport,
    ) -> Result<(), ReplicateError> {
        let parsed = label::parse(&issue.labels);
        if !parsed.team_colors.is_empty() {
            debug!(iid = issue.iid, stripped = ?parsed.team_colors, "dropping team colour labels");
        }
        let labels = match parsed.classify() {
            Classification::Personal { labels } => labels,
            Classification::Skip(reason) => {
                warn!(iid = issue.iid, %reason, "issue not replicated");
                report.skip(reason);
                return Ok(());
            }
        };

        let recipients = recipients::resolve(self.tracker, self.directory, &self.namespace.dest).await?;
        let covered = if self.options.force {
            HashMap::new()
        } else {
            self.replicated_for(issue.iid).await?
        };
        let mut existing = Vec::new();
        let mut pending = Vec::new();
        for recipient in &recipients {
            match covered.get(&recipient.member.id) {
                Some(iid) => existing.push((recipient, *iid)),
                None => pending.push(recipient),
            }
        }

        if !existing.is_empty() && pending.is_empty() {
            info!(iid = issue.iid, "issue already replicated to every recipient");
            report.skip(format!(
                "already replicated as {}",
                existing
                    .iter()
                    .map(|(_, iid)| format!("#{iid}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
            self.settle_source(issue, mode, report).await;
            return Ok(());
        }

        report.line(format!("Labels: {}", labels.join(", ")));

        let link = milestones.resolve(issue).await?;
        report.line(milestone::describe(issue.milestone.as_ref(), link));
        let milestone_id = link.and_then(|l| l.id());

        report.line(format!(
            "TargetMembers: {}",
            recipients
                .iter()
                .map(|r| r.member.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        for (recipient, iid) in &existing {
            report.line(format!(
                "  -> {}: already replicated as #{iid}",
                recipient.member.name
            ));
        }

        let outcomes = join_all(
            pending
                .iter()
                .map(|r| self.create_for(issue, &labels, milestone_id, r, mode)),
        )
        .await;

        for (recipient, outcome) in pending.iter().zip(outcomes) {
            let name = &recipient.member.name;
            match outcome {
                RecipientOutcome::Planned => {
                    report.planned += 1;
                    report.line(format!(
                        "  -> {name} ({})",
                        label::team_color_label(&recipient.team_color)
                    ));
                }
                RecipientOutcome::Created { iid, mapping_error } => {
                    report.created += 1;
                    report.line(format!("  -> {name}: created #{iid}"));
                    if let Some(e) = mapping_error {
                        report.line(format!("  [Warning] mapping for #{iid} not saved: {e}"));
                    }
                }
                RecipientOutcome::Failed(e) => {
                    report.failed += 1;
                    report.line(format!("  [Failed] {name}: {e}"));
                }
            }
        }

        match mode {
            RunMode::Preview => report.line(format!("Would create {} issues", report.planned)),
            RunMode::Execute => report.line(format!(
                "Created {}/{} issues",
                report.created,
                pending.len()
            )),
        }
        self.settle_source(issue, mode, report).await;
        Ok(())
    }

    async fn create_for(
        &self,
        issue: &SourceIssue,
        labels: &[String],
        milestone_id: Option<u64>,
        recipient: &Recipient,
        mode: RunMode,
    ) -> RecipientOutcome {
        if mode == RunMode::Preview {
            return RecipientOutcome::Planned;
        }
        let payload = derived_issue(issue, labels, milestone_id, recipient);
        match self.tracker.create_issue(&self.namespace.dest, &payload).await {
            Ok(created) => {
                info!(
                    source_iid = issue.iid,
                    dest_id = created.id,
                    dest_iid = created.iid,
                    assignee = %recipient.member.username,
                    "created issue"
                );
                let mapping_error = self
                    .record(issue.iid, recipient.member.id, created.iid)
                    .await
                    .err();
                RecipientOutcome::Created {
                    iid: created.iid,
                    mapping_error,
                }
            }
            Err(e) => {
                warn!(
                    source_iid = issue.iid,
                    assignee = %recipient.member.username,
                    error = %e,
                    "issue creation failed"
                );
                RecipientOutcome::Failed(e)
            }
        }
    }

    /// Close (or announce closing) the source issue once nothing is left to create.
    async fn settle_source(&self, issue: &SourceIssue, mode: RunMode, report: &mut IssueReport) {
        if !self.options.close_on_success {
            return;
        }
        if report.failed > 0 {
            report.line(format!(
                "Source issue #{} left open: {} recipient(s) failed",
                issue.iid, report.failed
            ));
            return;
        }
        if mode == RunMode::Preview {
            report.line(format!("Would close source issue #{}", issue.iid));
            return;
        }
        match self.tracker.close_issue(&self.namespace.source, issue.iid).await {
            Ok(()) => report.line(format!("Closed source issue #{}", issue.iid)),
            Err(e) => {
                warn!(iid = issue.iid, error = %e, "closing source issue failed");
                report.line(format!("[Failed] close source issue #{}: {e}", issue.iid));
            }
        }
    }

    async fn record(&self, source_iid: u64, assignee_id: u64, dest_iid: u64) -> Result<(), StoreError> {
        self.store
            .set(self.namespace, Table::Issues, &dest_iid.to_string(), source_iid)
            .await?;
        self.store
            .set(
                self.namespace,
                Table::Recipients,
                &recipient_key(source_iid, assignee_id),
                dest_iid,
            )
            .await
    }

    /// Destination iids already created for this source issue, by assignee id.
    async fn replicated_for(&self, source_iid: u64) -> Result<HashMap<u64, u64>, StoreError> {
        let prefix = format!("{source_iid}:");
        Ok(self
            .store
            .entries(self.namespace, Table::Recipients)
            .await?
            .into_iter()
            .filter_map(|(key, dest_iid)| {
                let assignee = key.strip_prefix(&prefix)?.parse::<u64>().ok()?;
                Some((assignee, dest_iid))
            })
            .collect())
    }
}

fn recipient_key(source_iid: u64, assignee_id: u64) -> String {
    format!("{source_iid}:{assignee_id}")
}

/// Payload for one recipient: source fields verbatim, labels plus the recipient's team colour.
pub fn derived_issue(
    issue: &SourceIssue,
    labels: &[String],
    milestone_id: Option<u64>,
    recipient: &Recipient,
) -> NewIssue {
    let mut labels = labels.to_vec();
    labels.push(label::team_color_label(&recipient.team_color));
    NewIssue {
        title: issue.title.clone(),
        description: issue.description.clone(),
        assignee_id: recipient.member.id,
        confidential: issue.confidential,
        due_date: issue.due_date,
        labels,
        milestone_id,
    }
}
