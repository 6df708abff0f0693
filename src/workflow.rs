//! Preview -> confirm -> execute orchestration for one replication command.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::directory::TeamDirectory;
use crate::model::project::{Namespace, ProjectId};
use crate::replicate::report::ExecutionReport;
use crate::replicate::{ReplicateOptions, Replicator, RunMode};
use crate::store::MappingStore;
use crate::tracker::{Tracker, TrackerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    TimedOut,
}

/// Asks the requester to approve a previewed run.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn await_confirmation(&self, preview: &ExecutionReport, timeout: Duration) -> Confirmation;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Executed,
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    PreviewGenerated,
    AwaitingConfirmation,
    Confirmed,
    Executed,
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Skip confirmation and execute right after the preview.
    pub immediate_execute: bool,
    pub close_on_success: bool,
    pub force: bool,
}

#[derive(Debug)]
pub struct RunResult {
    pub preview: ExecutionReport,
    pub execution: Option<ExecutionReport>,
    pub outcome: Outcome,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("listing source issues failed: {0}")]
    SourceIssues(#[from] TrackerError),
}

pub struct Workflow<'a> {
    tracker: &'a dyn Tracker,
    directory: &'a dyn TeamDirectory,
    store: &'a dyn MappingStore,
    confirm_timeout: Duration,
}

impl<'a> Workflow<'a> {
    pub fn new(
        tracker: &'a dyn Tracker,
        directory: &'a dyn TeamDirectory,
        store: &'a dyn MappingStore,
        confirm_timeout: Duration,
    ) -> Self {
        Self {
            tracker,
            directory,
            store,
            confirm_timeout,
        }
    }

    pub async fn run_replication(
        &self,
        source: Option<&ProjectId>,
        dest: Option<&ProjectId>,
        options: RunOptions,
        confirm: &dyn Confirm,
    ) -> Result<RunResult, WorkflowError> {
        let dest = dest.ok_or(ConfigError::MissingProject("destination"))?;
        let source = source.ok_or(ConfigError::MissingProject("source"))?;
        let namespace = Namespace::new(source.clone(), dest.clone());
        let replicator = Replicator::new(
            self.tracker,
            self.directory,
            self.store,
            &namespace,
            ReplicateOptions {
                close_on_success: options.close_on_success,
                force: options.force,
            },
        );

        let mut state = State::Idle;
        let preview = self.run(&replicator, &namespace, RunMode::Preview).await?;
        transition(&mut state, State::PreviewGenerated);

        if !options.immediate_execute {
            transition(&mut state, State::AwaitingConfirmation);
            let answer = tokio::time::timeout(
                self.confirm_timeout,
                confirm.await_confirmation(&preview, self.confirm_timeout),
            )
            .await
            .unwrap_or(Confirmation::TimedOut);
            match answer {
                Confirmation::Yes => transition(&mut state, State::Confirmed),
                Confirmation::No => {
                    transition(&mut state, State::Cancelled);
                    return Ok(RunResult {
                        preview,
                        execution: None,
                        outcome: Outcome::Cancelled,
                    });
                }
                Confirmation::TimedOut => {
                    transition(&mut state, State::TimedOut);
                    return Ok(RunResult {
                        preview,
                        execution: None,
                        outcome: Outcome::TimedOut,
                    });
                }
            }
        }

        let execution = self.run(&replicator, &namespace, RunMode::Execute).await?;
        transition(&mut state, State::Executed);
        Ok(RunResult {
            preview,
            execution: Some(execution),
            outcome: Outcome::Executed,
        })
    }

    /// Source issues are read fresh for every run.
    async fn run(
        &self,
        replicator: &Replicator<'_>,
        namespace: &Namespace,
        mode: RunMode,
    ) -> Result<ExecutionReport, WorkflowError> {
        let issues = self.tracker.list_open_issues(&namespace.source).await?;
        Ok(replicator.replicate(&issues, mode).await)
    }
}

fn transition(state: &mut State, next: State) {
    debug!(from = ?state, to = ?next, "workflow transition");
    if matches!(next, State::Executed | State::Cancelled | State::TimedOut) {
        info!(outcome = ?next, "replication command finished");
    }
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::mock::StaticDirectory;
    use crate::store::MemoryMappingStore;
    use crate::tracker::mock::{issue, member, MockTracker};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        answer: Option<Confirmation>,
        asked: AtomicUsize,
    }

    impl Scripted {
        fn answering(answer: Confirmation) -> Self {
            Self {
                answer: Some(answer),
                asked: AtomicUsize::new(0),
            }
        }

        fn silent() -> Self {
            Self {
                answer: None,
                asked: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Confirm for Scripted {
        async fn await_confirmation(&self, _preview: &ExecutionReport, _timeout: Duration) -> Confirmation {
            self.asked.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Some(answer) => answer,
                None => std::future::pending().await,
            }
        }
    }

    fn fixture() -> (MockTracker, StaticDirectory, MemoryMappingStore) {
        let tracker = MockTracker::new()
            .with_issues(vec![issue(1, "Mission", &["1_individual"])])
            .with_members(vec![member(1, "Aki"), member(2, "Ben")]);
        let directory = StaticDirectory::new(&[(1, "red"), (2, "blue")]);
        (tracker, directory, MemoryMappingStore::new())
    }

    fn projects() -> (ProjectId, ProjectId) {
        (ProjectId::new("src"), ProjectId::new("dest"))
    }

    #[tokio::test]
    async fn affirmative_answer_executes() {
        let (tracker, directory, store) = fixture();
        let (src, dest) = projects();
        let workflow = Workflow::new(&tracker, &directory, &store, Duration::from_secs(5));
        let confirm = Scripted::answering(Confirmation::Yes);

        let result = workflow
            .run_replication(Some(&src), Some(&dest), RunOptions::default(), &confirm)
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Executed);
        assert_eq!(result.preview.mode, RunMode::Preview);
        assert_eq!(result.preview.planned(), 2);
        assert_eq!(result.execution.unwrap().created(), 2);
        assert_eq!(tracker.created().len(), 2);
        assert_eq!(confirm.asked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn negative_answer_cancels_without_mutation() {
        let (tracker, directory, store) = fixture();
        let (src, dest) = projects();
        let workflow = Workflow::new(&tracker, &directory, &store, Duration::from_secs(5));

        let result = workflow
            .run_replication(
                Some(&src),
                Some(&dest),
                RunOptions::default(),
                &Scripted::answering(Confirmation::No),
            )
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Cancelled);
        assert!(result.execution.is_none());
        assert_eq!(tracker.mutation_count(), 0);
    }

    #[tokio::test]
    async fn silence_times_out_without_mutation() {
        let (tracker, directory, store) = fixture();
        let (src, dest) = projects();
        let workflow = Workflow::new(&tracker, &directory, &store, Duration::from_millis(50));

        let result = workflow
            .run_replication(Some(&src), Some(&dest), RunOptions::default(), &Scripted::silent())
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::TimedOut);
        assert!(result.execution.is_none());
        assert_eq!(tracker.mutation_count(), 0);
    }

    #[tokio::test]
    async fn immediate_execute_skips_confirmation() {
        let (tracker, directory, store) = fixture();
        let (src, dest) = projects();
        let workflow = Workflow::new(&tracker, &directory, &store, Duration::from_secs(5));
        let confirm = Scripted::answering(Confirmation::No);
        let options = RunOptions {
            immediate_execute: true,
            close_on_success: true,
            force: false,
        };

        let result = workflow
            .run_replication(Some(&src), Some(&dest), options, &confirm)
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Executed);
        assert_eq!(confirm.asked.load(Ordering::SeqCst), 0);
        assert!(result.preview.render().contains("Would close source issue #1"));
        let execution = result.execution.unwrap().render();
        assert!(execution.contains("Closed source issue #1"));
        assert_eq!(tracker.closed(), vec![1]);
    }

    #[tokio::test]
    async fn missing_project_is_fatal_before_any_work() {
        let (tracker, directory, store) = fixture();
        let (src, _) = projects();
        let workflow = Workflow::new(&tracker, &directory, &store, Duration::from_secs(5));

        let err = workflow
            .run_replication(
                Some(&src),
                None,
                RunOptions::default(),
                &Scripted::answering(Confirmation::Yes),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Config(ConfigError::MissingProject("destination"))));
        assert_eq!(tracker.mutation_count(), 0);
    }
}
