use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};
use tracing::error;

use super::{DirectoryError, LocalMember, Team, TeamColorMap, TeamDirectory};

const TEAM_COLORS_SQL: &str = "select gm.gitlab_id::bigint, t.team_color::text from gitlab_member gm \
     left outer join team t on gm.team_id = t.team_id \
     where gm.gitlab_id is not null";
const TEAMS_SQL: &str = "select team_id::bigint, team_color::text from team order by team_id";
const LOCAL_MEMBERS_SQL: &str =
    "select gitlab_id::bigint, name::text, team_id::bigint from gitlab_member order by gitlab_id";

/// Team directory backed by the `gitlab_member` and `team` tables.
///
/// Opens one connection per query; lookups happen a handful of times per run.
pub struct PostgresDirectory {
    database_url: String,
}

impl PostgresDirectory {
    pub fn new(database_url: String) -> Self {
        Self { database_url }
    }

    async fn connect(&self) -> Result<Client, DirectoryError> {
        let (client, connection) = tokio_postgres::connect(&self.database_url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "team directory connection error");
            }
        });
        Ok(client)
    }
}

/// Rows with no linked team (null colour) or a blank colour are left out.
fn colors_from_rows(rows: impl IntoIterator<Item = (i64, Option<String>)>) -> TeamColorMap {
    rows.into_iter()
        .filter_map(|(id, color)| {
            let id = u64::try_from(id).ok()?;
            let color = color?.trim().to_string();
            (!color.is_empty()).then_some((id, color))
        })
        .collect()
}

#[async_trait]
impl TeamDirectory for PostgresDirectory {
    async fn team_colors(&self) -> Result<TeamColorMap, DirectoryError> {
        let client = self.connect().await?;
        let rows = client.query(TEAM_COLORS_SQL, &[]).await?;
        let pairs = rows
            .iter()
            .map(|row| -> Result<(i64, Option<String>), tokio_postgres::Error> {
                Ok((row.try_get(0)?, row.try_get(1)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(colors_from_rows(pairs))
    }

    async fn teams(&self) -> Result<Vec<Team>, DirectoryError> {
        let client = self.connect().await?;
        let rows = client.query(TEAMS_SQL, &[]).await?;
        rows.iter()
            .map(|row| -> Result<Team, DirectoryError> {
                Ok(Team {
                    id: row.try_get(0)?,
                    color: row.try_get(1)?,
                })
            })
            .collect()
    }

    async fn local_members(&self) -> Result<Vec<LocalMember>, DirectoryError> {
        let client = self.connect().await?;
        let rows = client.query(LOCAL_MEMBERS_SQL, &[]).await?;
        rows.iter()
            .map(|row| -> Result<LocalMember, DirectoryError> {
                let tracker_id: Option<i64> = row.try_get(0)?;
                Ok(LocalMember {
                    tracker_id: tracker_id.and_then(|id| u64::try_from(id).ok()),
                    name: row.try_get(1)?,
                    team_id: row.try_get(2)?,
                })
            })
            .collect()
    }
}
