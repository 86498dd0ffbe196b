use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{load_rows, Person, PersonFetchOptions};
use crate::{access_log, access_log::LogRepr, auth::Session, error::ApiResult};

/// Id standing for the caller
pub const ME: &str = "me";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetPersonsQuery {
    /// User ids; [`ME`] resolves to the caller
    pub ids: Vec<String>,
    #[serde(default)]
    pub fetch_options: PersonFetchOptions,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, query: GetPersonsQuery) -> ApiResult<BTreeMap<String, Person>> {
    access_log::record(&session.user_id, "get-persons", &[("PERSON_IDS", query.ids.log_repr())]);

    let mut conn = pool.acquire().await?;
    let rows = load_rows(&mut conn).await?;
    let mut found = BTreeMap::new();
    for id in &query.ids {
        let user_id = if id.trim() == ME { session.user_id.as_str() } else { id.trim() };
        if let Some(row) = rows.iter().find(|row| row.user_id == user_id) {
            found.insert(id.clone(), row.clone().into_person(&query.fetch_options));
        }
    }
    Ok(found)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        persons::commands::{create, CreatePersonsCommand, PersonCreation},
        shared::test_helpers::{TestContext, SPACE_USER},
    };

    #[tokio::test]
    async fn test_get_created_person_with_home_space() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let creation = PersonCreation {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            email: Some("ada@example.org".into()),
            space_id: Some("TEST-SPACE".into()),
            ..PersonCreation::new("ada")
        };
        create::handle(&ctx.pool, &admin, CreatePersonsCommand { creations: vec![creation] })
            .await
            .unwrap();

        let query = GetPersonsQuery {
            ids: vec!["ada".into(), "ghost".into()],
            fetch_options: PersonFetchOptions {
                home_space: true,
                registrator: true,
            },
        };
        let found = handle(&ctx.pool, &admin, query).await.unwrap();
        assert_eq!(found.len(), 1);
        let ada = &found["ada"];
        assert_eq!(ada.first_name.as_deref(), Some("Ada"));
        assert_eq!(ada.last_name.as_deref(), Some("Lovelace"));
        assert_eq!(ada.email.as_deref(), Some("ada@example.org"));
        assert!(ada.active);
        assert_eq!(ada.home_space.get("Home space").unwrap().as_deref(), Some("TEST-SPACE"));
        assert_eq!(ada.registrator.get("Registrator").unwrap().as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_me_resolves_to_caller() {
        let ctx = TestContext::new().await;
        let user = ctx.session(SPACE_USER).await;
        let query = GetPersonsQuery {
            ids: vec![ME.into()],
            ..Default::default()
        };
        let found = handle(&ctx.pool, &user, query).await.unwrap();
        assert_eq!(found[ME].user_id, SPACE_USER);
        assert!(found[ME].home_space.get("Home space").is_err());
    }
}
