pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::collections::HashMap;

use crate::{error::ApiResult, features::shared::fetch::Fetched};

pub use get::GetAuthorizationGroupsQuery;
pub use search::{AuthorizationGroupSearchCriteria, SearchAuthorizationGroupsQuery};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationGroupFetchOptions {
    pub registrator: bool,
    /// Member user ids, sorted
    pub users: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationGroup {
    pub perm_id: String,
    pub code: String,
    pub description: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub registrator: Fetched<Option<String>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub users: Fetched<Vec<String>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct GroupRow {
    pub id: i64,
    pub code: String,
    pub description: Option<String>,
    pub registrator: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

pub(crate) async fn load_rows(conn: &mut SqliteConnection) -> ApiResult<Vec<GroupRow>> {
    let rows = sqlx::query_as::<_, GroupRow>(
        r#"
        SELECT g.id, g.code, g.description, p.user_id AS registrator, g.registration_date, g.modification_date
        FROM authorization_groups g
        LEFT JOIN persons p ON p.id = g.registrator_id
        ORDER BY g.code
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Member user ids of every group, keyed by group row id
pub(crate) async fn load_members(conn: &mut SqliteConnection) -> ApiResult<HashMap<i64, Vec<String>>> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT gp.group_id, p.user_id
        FROM authorization_group_persons gp
        JOIN persons p ON p.id = gp.person_id
        ORDER BY p.user_id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut members: HashMap<i64, Vec<String>> = HashMap::new();
    for (group_id, user_id) in rows {
        members.entry(group_id).or_default().push(user_id);
    }
    Ok(members)
}

pub(crate) async fn to_groups(
    conn: &mut SqliteConnection,
    rows: Vec<GroupRow>,
    fetch: &AuthorizationGroupFetchOptions,
) -> ApiResult<Vec<AuthorizationGroup>> {
    let mut members = if fetch.users {
        load_members(conn).await?
    } else {
        HashMap::new()
    };
    Ok(rows
        .into_iter()
        .map(|row| AuthorizationGroup {
            perm_id: row.code.clone(),
            users: Fetched::when(fetch.users, || members.remove(&row.id).unwrap_or_default()),
            registrator: Fetched::when(fetch.registrator, || row.registrator.clone()),
            code: row.code,
            description: row.description,
            registration_date: row.registration_date,
            modification_date: row.modification_date,
        })
        .collect())
}
