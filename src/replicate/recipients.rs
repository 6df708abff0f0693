use crate::directory::TeamDirectory;
use crate::model::issue::Member;
use crate::model::project::ProjectId;
use crate::tracker::Tracker;

use super::ReplicateError;

/// A destination member eligible for a personal issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub member: Member,
    pub team_color: String,
}

/// Destination members (inherited included) that have a team colour.
///
/// Members without a colour are left out silently; an empty result is not an error.
pub async fn resolve(
    tracker: &dyn Tracker,
    directory: &dyn TeamDirectory,
    project: &ProjectId,
) -> Result<Vec<Recipient>, ReplicateError> {
    let (colors, members) = tokio::try_join!(
        async { directory.team_colors().await.map_err(ReplicateError::from) },
        async {
            tracker
                .list_members(project, true)
                .await
                .map_err(ReplicateError::from)
        },
    )?;

    Ok(members
        .into_iter()
        .filter_map(|member| {
            let color = colors.get(&member.id)?.trim();
            if color.is_empty() {
                return None;
            }
            Some(Recipient {
                team_color: color.to_string(),
                member,
            })
        })
        .collect())
}
