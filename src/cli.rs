use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use crate::config::{AppConfig, ProjectRole};
use crate::confirm::TerminalConfirmation;
use crate::directory::postgres::PostgresDirectory;
use crate::directory::TeamDirectory;
use crate::export;
use crate::model::project::ProjectId;
use crate::store::JsonMappingStore;
use crate::tracker::gitlab::GitLabClient;
use crate::tracker::Tracker;
use crate::workflow::{Outcome, RunOptions, Workflow, WorkflowError};

/// Publish mission issues from the source project to every team member.
#[derive(Debug, Parser)]
#[command(name = "mkissue", version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replicate open mission issues into the target project.
    ///
    /// Team-colour labels (`2_*`) are regenerated per recipient, other labels
    /// are copied. Personal (`1_*`) issues get one copy per member with a team
    /// colour, assigned to that member. Milestones are carried over.
    #[command(visible_aliases = ["run", "mkissue", "pubissue"])]
    Publish(PublishArgs),
    /// Write tracker or directory data to a CSV file.
    #[command(visible_aliases = ["list", "csv"])]
    Ls(LsArgs),
    /// Print version information.
    #[command(visible_aliases = ["v", "ver", "about"])]
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DestTarget {
    Test,
    Dest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListTarget {
    Test,
    Dest,
    Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListKind {
    Member,
    Team,
    Issue,
    Milestone,
}

impl DestTarget {
    fn role(self) -> ProjectRole {
        match self {
            DestTarget::Test => ProjectRole::Test,
            DestTarget::Dest => ProjectRole::Dest,
        }
    }
}

impl ListTarget {
    fn role(self) -> ProjectRole {
        match self {
            ListTarget::Test => ProjectRole::Test,
            ListTarget::Dest => ProjectRole::Dest,
            ListTarget::Source => ProjectRole::Source,
        }
    }
}

impl ListKind {
    fn as_str(self) -> &'static str {
        match self {
            ListKind::Member => "member",
            ListKind::Team => "team",
            ListKind::Issue => "issue",
            ListKind::Milestone => "milestone",
        }
    }
}

#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Target project
    #[arg(value_enum, default_value = "test")]
    pub project: DestTarget,
    /// Execute right after the preview without asking
    #[arg(short, long)]
    pub yes: bool,
    /// Leave source issues open after replicating them
    #[arg(long)]
    pub no_close: bool,
    /// Replicate issues even if they were replicated before
    #[arg(long)]
    pub force: bool,
    /// Directory for the preview and execution documents
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,
}

#[derive(Debug, Args)]
pub struct LsArgs {
    #[arg(value_enum)]
    pub kind: ListKind,
    /// Project to list
    #[arg(value_enum, default_value = "test")]
    pub project: ListTarget,
    /// Read members from the team directory instead of the tracker
    #[arg(short, long)]
    pub local: bool,
    /// Directory for the CSV file
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,
}

pub async fn run(cli: Cli, config: &AppConfig) -> Result<()> {
    match cli.command {
        Command::Publish(args) => handle_publish(config, args).await,
        Command::Ls(args) => handle_ls(config, args).await,
        Command::Version => {
            println!("mkissue {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn tracker(config: &AppConfig) -> Result<GitLabClient> {
    Ok(GitLabClient::new(config.gitlab_url(), config.gitlab_token()?))
}

fn directory(config: &AppConfig) -> Result<PostgresDirectory> {
    Ok(PostgresDirectory::new(config.database_url()?.to_string()))
}

fn remote_project(config: &AppConfig, role: ProjectRole) -> Result<ProjectId> {
    match config.project(role) {
        Some(project) => Ok(project),
        None => bail!("{} project id is not configured", role.as_str()),
    }
}

fn write_document(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(name);
    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Document for a run that could not produce a report. Configuration errors get none.
fn failure_document(err: &WorkflowError) -> Option<String> {
    match err {
        WorkflowError::Config(_) => None,
        WorkflowError::SourceIssues(_) => Some(format!(
            "Replication aborted before any issue was processed: {err}\n"
        )),
    }
}

async fn handle_publish(config: &AppConfig, args: PublishArgs) -> Result<()> {
    let tracker = tracker(config)?;
    let directory = directory(config)?;
    let store_path = config.store_path();
    let store = JsonMappingStore::open(&store_path)
        .await
        .with_context(|| format!("Failed to open mapping store {}", store_path.display()))?;

    let role = args.project.role();
    let workflow = Workflow::new(&tracker, &directory, &store, config.confirm_timeout());
    let options = RunOptions {
        immediate_execute: args.yes,
        close_on_success: !args.no_close,
        force: args.force,
    };
    let result = match workflow
        .run_replication(
            config.project(ProjectRole::Source).as_ref(),
            config.project(role).as_ref(),
            options,
            &TerminalConfirmation,
        )
        .await
    {
        Ok(result) => result,
        Err(err) => {
            if let Some(document) = failure_document(&err) {
                let path = write_document(
                    &args.out,
                    &format!("mkissue_{}_error.txt", role.as_str()),
                    &document,
                )?;
                println!("Failed: {}", path.display());
            }
            return Err(err.into());
        }
    };

    let preview = write_document(
        &args.out,
        &format!("mkissue_{}_preview.txt", role.as_str()),
        &result.preview.render(),
    )?;
    println!("Preview: {}", preview.display());

    match result.outcome {
        Outcome::Executed => {
            if let Some(execution) = &result.execution {
                let path = write_document(
                    &args.out,
                    &format!("mkissue_{}_execlog.txt", role.as_str()),
                    &execution.render(),
                )?;
                println!(
                    "Executed: {} issues created, {} failures. Log: {}",
                    execution.created(),
                    execution.failed(),
                    path.display()
                );
            }
        }
        Outcome::Cancelled => println!("Cancelled."),
        Outcome::TimedOut => println!(
            "No answer within {}s; timed out.",
            config.confirm_timeout().as_secs()
        ),
    }
    Ok(())
}

async fn handle_ls(config: &AppConfig, args: LsArgs) -> Result<()> {
    let project_label = if args.local { "local" } else { args.project.role().as_str() };

    let csv = match args.kind {
        ListKind::Team => export::teams_csv(&directory(config)?.teams().await?),
        ListKind::Member if args.local => {
            let directory = directory(config)?;
            let (members, teams) = tokio::try_join!(directory.local_members(), directory.teams())?;
            export::local_members_csv(&members, &teams)
        }
        kind if args.local => {
            bail!("Listing {}s from the local directory is not supported", kind.as_str())
        }
        ListKind::Member => {
            let project = remote_project(config, args.project.role())?;
            let directory = directory(config)?;
            let members = tracker(config)?.list_members(&project, true).await?;
            let colors = directory.team_colors().await?;
            export::members_csv(&members, &colors)
        }
        ListKind::Issue => {
            let project = remote_project(config, args.project.role())?;
            export::issues_csv(&tracker(config)?.list_open_issues(&project).await?)
        }
        ListKind::Milestone => {
            let project = remote_project(config, args.project.role())?;
            export::milestones_csv(&tracker(config)?.list_milestones(&project).await?)
        }
    };

    let path = write_document(
        &args.out,
        &format!("{}list_{project_label}.csv", args.kind.as_str()),
        &csv,
    )?;
    println!("{}", path.display());
    Ok(())
}
