use std::fmt;

use super::RunMode;
use crate::model::issue::SourceIssue;

const SEPARATOR: &str = "------";

/// Text segment describing what happened to one source issue.
#[derive(Debug, Clone)]
pub struct IssueReport {
    pub iid: u64,
    pub title: String,
    lines: Vec<String>,
    pub created: usize,
    pub planned: usize,
    pub failed: usize,
    pub skipped: bool,
}

impl IssueReport {
    pub fn new(issue: &SourceIssue) -> Self {
        Self {
            iid: issue.iid,
            title: issue.title.clone(),
            lines: Vec::new(),
            created: 0,
            planned: 0,
            failed: 0,
            skipped: false,
        }
    }

    pub fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn skip(&mut self, reason: impl fmt::Display) {
        self.skipped = true;
        self.line(format!("Skipped: {reason}"));
    }

    #[cfg(test)]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

impl fmt::Display for IssueReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{SEPARATOR}")?;
        writeln!(f, "Src: {} (#{})", self.title, self.iid)?;
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Ordered per-issue segments of one run; segment order follows the input issues.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub mode: RunMode,
    pub issues: Vec<IssueReport>,
}

impl ExecutionReport {
    pub fn new(mode: RunMode, issues: Vec<IssueReport>) -> Self {
        Self { mode, issues }
    }

    pub fn created(&self) -> usize {
        self.issues.iter().map(|i| i.created).sum()
    }

    pub fn planned(&self) -> usize {
        self.issues.iter().map(|i| i.planned).sum()
    }

    pub fn failed(&self) -> usize {
        self.issues.iter().map(|i| i.failed).sum()
    }

    pub fn skipped(&self) -> usize {
        self.issues.iter().filter(|i| i.skipped).count()
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            RunMode::Preview => writeln!(
                f,
                "Preview: {} source issues, {} issues would be created, {} skipped",
                self.issues.len(),
                self.planned(),
                self.skipped()
            )?,
            RunMode::Execute => writeln!(
                f,
                "Execution: {} source issues, {} issues created, {} failures, {} skipped",
                self.issues.len(),
                self.created(),
                self.failed(),
                self.skipped()
            )?,
        }
        for issue in &self.issues {
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}
