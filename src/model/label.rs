//! Label conventions of the mission project.
//!
//! A label's leading digit names its axis: `1` carries the personal/group
//! keyword, `2` the team colour, `3` the role restriction. Everything else
//! passes through to derived issues untouched. This module is the only
//! place those string conventions are interpreted.

use std::fmt;

const PERSONAL_KEYWORDS: &[&str] = &["individual", "個人"];
const GROUP_KEYWORDS: &[&str] = &["group", "グループ"];
const ALL_ROLES_KEYWORDS: &[&str] = &["all-roles", "all roles", "全役職"];

/// Role label added to personal issues that carry no role label at all.
pub const ALL_ROLES_LABEL: &str = "3_all-roles";

const MODE_AXIS: char = '1';
const TEAM_COLOR_AXIS: char = '2';
const ROLE_AXIS: char = '3';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Personal,
    Group,
    Unclassified,
}

/// Structured view of an issue's label list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLabels {
    pub mode: Mode,
    /// Labels copied to derived issues: no team-colour tags, no mode tags.
    pub labels: Vec<String>,
    pub roles: Vec<String>,
    pub team_colors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Unclassified,
    GroupUnimplemented,
    RoleRestrictedUnimplemented,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unclassified => {
                f.write_str("no personal/group label, not a mission issue")
            }
            SkipReason::GroupUnimplemented => f.write_str("group replication unimplemented"),
            SkipReason::RoleRestrictedUnimplemented => {
                f.write_str("non-all-roles personal replication unimplemented")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Fan out to every eligible member with these labels plus a team colour.
    Personal { labels: Vec<String> },
    Skip(SkipReason),
}

fn contains_any(label: &str, keywords: &[&str]) -> bool {
    let lower = label.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

fn is_all_roles(label: &str) -> bool {
    contains_any(label, ALL_ROLES_KEYWORDS)
}

fn is_mode_tag(label: &str) -> bool {
    label.starts_with(MODE_AXIS)
        && (contains_any(label, PERSONAL_KEYWORDS) || contains_any(label, GROUP_KEYWORDS))
}

pub fn parse(labels: &[String]) -> ParsedLabels {
    // Keywords only count outside the colour and role axes: `3_group-leader` is a role.
    let targeting = || {
        labels
            .iter()
            .filter(|l| !l.starts_with(TEAM_COLOR_AXIS) && !l.starts_with(ROLE_AXIS))
    };
    let personal = targeting().any(|l| contains_any(l, PERSONAL_KEYWORDS));
    let group = targeting().any(|l| contains_any(l, GROUP_KEYWORDS));
    let mode = if personal {
        Mode::Personal
    } else if group {
        Mode::Group
    } else {
        Mode::Unclassified
    };

    let mut kept = Vec::new();
    let mut roles = Vec::new();
    let mut team_colors = Vec::new();
    for label in labels {
        if label.starts_with(TEAM_COLOR_AXIS) {
            team_colors.push(label.clone());
            continue;
        }
        if label.starts_with(ROLE_AXIS) {
            roles.push(label.clone());
        } else if is_mode_tag(label) {
            continue;
        }
        kept.push(label.clone());
    }

    ParsedLabels {
        mode,
        labels: kept,
        roles,
        team_colors,
    }
}

impl ParsedLabels {
    pub fn classify(mut self) -> Classification {
        match self.mode {
            Mode::Unclassified => Classification::Skip(SkipReason::Unclassified),
            Mode::Group => Classification::Skip(SkipReason::GroupUnimplemented),
            Mode::Personal => {
                if self.roles.iter().any(|r| !is_all_roles(r)) {
                    return Classification::Skip(SkipReason::RoleRestrictedUnimplemented);
                }
                if self.roles.is_empty() {
                    self.labels.push(ALL_ROLES_LABEL.to_string());
                }
                Classification::Personal {
                    labels: self.labels,
                }
            }
        }
    }
}

pub fn team_color_label(color: &str) -> String {
    format!("{TEAM_COLOR_AXIS}_{color}")
}
