use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{ReplicateError, RunMode};
use crate::model::issue::{Milestone, NewMilestone, SourceIssue};
use crate::model::project::Namespace;
use crate::store::{MappingStore, Table};
use crate::tracker::Tracker;

/// How a source milestone was linked to the destination project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneLink {
    /// Found in the mapping store.
    Mapped(u64),
    /// Found in the destination by title; mapping written in execute mode.
    Matched(u64),
    Created(u64),
    /// Preview only: would be created on execute.
    Pending,
}

impl MilestoneLink {
    pub fn id(&self) -> Option<u64> {
        match self {
            MilestoneLink::Mapped(id) | MilestoneLink::Matched(id) | MilestoneLink::Created(id) => {
                Some(*id)
            }
            MilestoneLink::Pending => None,
        }
    }
}

pub fn describe(milestone: Option<&Milestone>, link: Option<MilestoneLink>) -> String {
    match (milestone, link) {
        (Some(m), Some(MilestoneLink::Mapped(id))) => format!("Milestone: {} (#{id})", m.title),
        (Some(m), Some(MilestoneLink::Matched(id))) => {
            format!("Milestone: {} (#{id}, matched by title)", m.title)
        }
        (Some(m), Some(MilestoneLink::Created(id))) => {
            format!("Milestone: {} (#{id}, created)", m.title)
        }
        (Some(m), Some(MilestoneLink::Pending)) => format!("Milestone: {} (new)", m.title),
        _ => "Milestone: none".to_string(),
    }
}

/// Resolves destination milestones for one run.
///
/// A single lock covers lookup, title search and creation for the whole
/// namespace: two issues sharing a source milestone must never both miss
/// the lookup and create two destination milestones.
pub struct MilestoneReconciler<'a> {
    tracker: &'a dyn Tracker,
    store: &'a dyn MappingStore,
    namespace: &'a Namespace,
    mode: RunMode,
    lock: Mutex<()>,
}

impl<'a> MilestoneReconciler<'a> {
    pub fn new(
        tracker: &'a dyn Tracker,
        store: &'a dyn MappingStore,
        namespace: &'a Namespace,
        mode: RunMode,
    ) -> Self {
        Self {
            tracker,
            store,
            namespace,
            mode,
            lock: Mutex::new(()),
        }
    }

    pub async fn resolve(&self, issue: &SourceIssue) -> Result<Option<MilestoneLink>, ReplicateError> {
        let Some(source) = &issue.milestone else {
            return Ok(None);
        };
        let key = source.id.to_string();
        let _guard = self.lock.lock().await;

        if let Some(id) = self
            .store
            .get(self.namespace, Table::Milestones, &key)
            .await?
            .filter(|id| *id != 0)
        {
            debug!(source_milestone = source.id, dest_milestone = id, "milestone mapped");
            return Ok(Some(MilestoneLink::Mapped(id)));
        }

        let existing = self.tracker.list_milestones(&self.namespace.dest).await?;
        if let Some(found) = existing.iter().find(|m| m.title == source.title) {
            if self.mode == RunMode::Execute {
                self.store
                    .set(self.namespace, Table::Milestones, &key, found.id)
                    .await?;
                info!(
                    source_milestone = source.id,
                    dest_milestone = found.id,
                    title = %source.title,
                    "reconciled milestone by title"
                );
            }
            return Ok(Some(MilestoneLink::Matched(found.id)));
        }

        if self.mode == RunMode::Preview {
            return Ok(Some(MilestoneLink::Pending));
        }

        let created = self
            .tracker
            .create_milestone(&self.namespace.dest, &NewMilestone::from(source))
            .await?;
        self.store
            .set(self.namespace, Table::Milestones, &key, created.id)
            .await?;
        info!(
            source_milestone = source.id,
            dest_milestone = created.id,
            title = %source.title,
            "created milestone"
        );
        Ok(Some(MilestoneLink::Created(created.id)))
    }
}
