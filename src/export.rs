//! CSV listings of tracker and directory data.

use crate::directory::{LocalMember, Team, TeamColorMap};
use crate::model::issue::{Member, Milestone, SourceIssue};

fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn row(fields: &[String]) -> String {
    let mut line = fields.iter().map(|f| field(f)).collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}

pub fn issues_csv(issues: &[SourceIssue]) -> String {
    let mut csv =
        String::from("id,iid,title,state,created_at,labels,milestone_id,milestone_title,assignee_id\n");
    for i in issues {
        csv.push_str(&row(&[
            i.id.to_string(),
            i.iid.to_string(),
            i.title.clone(),
            i.state.clone(),
            opt(i.created_at.as_deref()),
            i.labels.join(","),
            opt(i.milestone.as_ref().map(|m| m.id)),
            opt(i.milestone.as_ref().map(|m| m.title.as_str())),
            opt(i.assignee.as_ref().map(|a| a.id)),
        ]));
    }
    csv
}

pub fn milestones_csv(milestones: &[Milestone]) -> String {
    let mut csv = String::from("id,iid,title,state,created_at,expired\n");
    for m in milestones {
        csv.push_str(&row(&[
            m.id.to_string(),
            opt(m.iid),
            m.title.clone(),
            opt(m.state.as_deref()),
            opt(m.created_at.as_deref()),
            opt(m.expired),
        ]));
    }
    csv
}

pub fn members_csv(members: &[Member], colors: &TeamColorMap) -> String {
    let mut csv = String::from("id,name,username,team_color\n");
    for m in members {
        csv.push_str(&row(&[
            m.id.to_string(),
            m.name.clone(),
            m.username.clone(),
            colors.get(&m.id).cloned().unwrap_or_else(|| "null".into()),
        ]));
    }
    csv
}

pub fn teams_csv(teams: &[Team]) -> String {
    let mut csv = String::from("team_id,team_color\n");
    for t in teams {
        csv.push_str(&row(&[t.id.to_string(), opt(t.color.as_deref())]));
    }
    csv
}

pub fn local_members_csv(members: &[LocalMember], teams: &[Team]) -> String {
    let mut csv = String::from("gitlab_id,name,team_id,team_color\n");
    for m in members {
        let color = m
            .team_id
            .and_then(|id| teams.iter().find(|t| t.id == id))
            .and_then(|t| t.color.clone())
            .unwrap_or_else(|| "null".into());
        csv.push_str(&row(&[
            opt(m.tracker_id),
            opt(m.name.as_deref()),
            opt(m.team_id),
            color,
        ]));
    }
    csv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::mock::{issue, member, milestone};

    #[test]
    fn fields_with_commas_and_quotes_are_quoted() {
        assert_eq!(field("plain"), "plain");
        assert_eq!(field("a,b"), "\"a,b\"");
        assert_eq!(field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn issue_rows_include_milestone_and_joined_labels() {
        let mut i = issue(3, "Report", &["1_individual", "0_misc"]);
        i.milestone = Some(milestone(9, "Sprint 1"));
        let csv = issues_csv(&[i]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "10003,3,Report,opened,,\"1_individual,0_misc\",9,Sprint 1,");
    }

    #[test]
    fn uncolored_members_show_null() {
        let colors = TeamColorMap::from([(1, "red".to_string())]);
        let csv = members_csv(&[member(1, "Aki"), member(2, "Ben")], &colors);
        assert_eq!(
            csv,
            "id,name,username,team_color\n1,Aki,aki,red\n2,Ben,ben,null\n"
        );
    }

    #[test]
    fn local_members_resolve_team_color() {
        let teams = vec![Team {
            id: 4,
            color: Some("blue".into()),
        }];
        let members = vec![
            LocalMember {
                tracker_id: Some(7),
                name: Some("Chie".into()),
                team_id: Some(4),
            },
            LocalMember {
                tracker_id: None,
                name: Some("New".into()),
                team_id: None,
            },
        ];
        let csv = local_members_csv(&members, &teams);
        assert!(csv.contains("7,Chie,4,blue\n"));
        assert!(csv.contains(",New,,null\n"));
        assert_eq!(milestones_csv(&[]), "id,iid,title,state,created_at,expired\n");
    }
}
