//! Update authorization groups command

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin_for, Session},
    error::ApiResult,
    features::{
        authorization_groups::{self, members, person_ids},
        shared::{updates::plan_links, validation::blank_to_none, ListUpdate},
    },
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationGroupUpdate {
    pub group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub user_ids: ListUpdate<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAuthorizationGroupsCommand {
    pub updates: Vec<AuthorizationGroupUpdate>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &UpdateAuthorizationGroupsCommand,
) -> ApiResult<()> {
    let now = Utc::now();
    for update in &command.updates {
        let group = authorization_groups::require(conn, &update.group_id).await?;
        require_instance_admin_for(session, "AuthorizationGroupPermId", &group.code)?;

        if let Some(description) = &update.description {
            sqlx::query("UPDATE authorization_groups SET description = ? WHERE id = ?")
                .bind(blank_to_none(Some(description.clone())))
                .bind(group.id)
                .execute(&mut *conn)
                .await?;
        }

        if !update.user_ids.is_empty() {
            let current = members(conn, group.id).await?;
            let set = match &update.user_ids.set {
                Some(user_ids) => Some(person_ids(conn, user_ids).await?),
                None => None,
            };
            let add = person_ids(conn, &update.user_ids.add).await?;
            let remove = person_ids(conn, &update.user_ids.remove).await?;
            let plan = plan_links(&current, set.as_deref(), &add, &remove);

            for person_id in &plan.add {
                sqlx::query("INSERT INTO authorization_group_persons (group_id, person_id) VALUES (?, ?)")
                    .bind(group.id)
                    .bind(person_id)
                    .execute(&mut *conn)
                    .await?;
            }
            for person_id in &plan.remove {
                sqlx::query("DELETE FROM authorization_group_persons WHERE group_id = ? AND person_id = ?")
                    .bind(group.id)
                    .bind(person_id)
                    .execute(&mut *conn)
                    .await?;
            }
        }

        sqlx::query("UPDATE authorization_groups SET modification_date = ? WHERE id = ?")
            .bind(now)
            .bind(group.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdateAuthorizationGroupsCommand) -> ApiResult<()> {
    let ids: Vec<&String> = command.updates.iter().map(|u| &u.group_id).collect();
    access_log::record(
        &session.user_id,
        "update-authorization-groups",
        &[("AUTHORIZATION_GROUP_UPDATES", ids.log_repr())],
    );

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
