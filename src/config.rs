use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::model::project::ProjectId;

const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";
const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} project id is not configured")]
    MissingProject(&'static str),
    #[error("GitLab token is not configured (set GITLAB_TOKEN or GITLAB_TOKEN_FILE)")]
    MissingToken,
    #[error("team directory is not configured (set DATABASE_URL)")]
    MissingDatabase,
}

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub gitlab: GitLabConfig,
    #[serde(default)]
    pub projects: ProjectsConfig,
    pub directory: Option<DirectoryConfig>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct GitLabConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ProjectsConfig {
    pub source: Option<String>,
    pub dest: Option<String>,
    pub test: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DirectoryConfig {
    pub database_url: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct WorkflowConfig {
    pub confirm_timeout_secs: Option<u64>,
}

/// Which configured project a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectRole {
    Source,
    Dest,
    Test,
}

impl ProjectRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Source => "source",
            ProjectRole::Dest => "dest",
            ProjectRole::Test => "test",
        }
    }
}

impl AppConfig {
    pub fn gitlab_url(&self) -> &str {
        self.gitlab.url.as_deref().unwrap_or(DEFAULT_GITLAB_URL)
    }

    /// Token from the secret file if it exists, otherwise the plain value.
    pub fn gitlab_token(&self) -> Result<String, ConfigError> {
        if let Some(path) = &self.gitlab.token_file {
            match std::fs::read_to_string(path) {
                Ok(contents) if !contents.trim().is_empty() => {
                    return Ok(contents.trim().to_string())
                }
                Ok(_) => warn!(path = %path.display(), "GitLab token file is empty"),
                Err(e) => warn!(path = %path.display(), error = %e, "GitLab token file unreadable"),
            }
        }
        self.gitlab
            .token
            .as_ref()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)
    }

    pub fn project(&self, role: ProjectRole) -> Option<ProjectId> {
        let id = match role {
            ProjectRole::Source => &self.projects.source,
            ProjectRole::Dest => &self.projects.dest,
            ProjectRole::Test => &self.projects.test,
        };
        id.as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(ProjectId::new)
    }

    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.directory
            .as_ref()
            .map(|d| d.database_url.as_str())
            .ok_or(ConfigError::MissingDatabase)
    }

    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| data_dir().join("mappings.json"))
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(
            self.workflow
                .confirm_timeout_secs
                .unwrap_or(DEFAULT_CONFIRM_TIMEOUT_SECS),
        )
    }

    /// Environment variables take precedence over the file.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("GITLAB_URL") {
            self.gitlab.url = Some(v);
        }
        if let Some(v) = var("GITLAB_TOKEN") {
            self.gitlab.token = Some(v);
        }
        if let Some(v) = var("GITLAB_TOKEN_FILE") {
            self.gitlab.token_file = Some(PathBuf::from(v));
        }
        if let Some(v) = var("GITLAB_SOURCE_PROJECT_ID") {
            self.projects.source = Some(v);
        }
        if let Some(v) = var("GITLAB_DEST_PROJECT_ID") {
            self.projects.dest = Some(v);
        }
        if let Some(v) = var("GITLAB_TEST_PROJECT_ID") {
            self.projects.test = Some(v);
        }
        if let Some(v) = var("DATABASE_URL") {
            self.directory = Some(DirectoryConfig { database_url: v });
        }
    }
}

fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mkissue")
}

fn read_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

pub fn load_config() -> Result<AppConfig> {
    // A missing .env is normal outside development.
    let _ = dotenvy::dotenv();
    let mut config = read_config(&config_path())?;
    config.apply_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    Ok(config)
}
