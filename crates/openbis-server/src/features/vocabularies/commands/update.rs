use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    auth::{authorization::require_instance_admin_for, Session},
    error::ApiResult,
    features::{
        shared::{updates::present, validation::blank_to_none},
        vocabularies,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VocabularyUpdate {
    pub vocabulary_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_from_list: Option<bool>,
    /// `null` clears the template
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub url_template: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateVocabulariesCommand {
    pub updates: Vec<VocabularyUpdate>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &UpdateVocabulariesCommand,
) -> ApiResult<()> {
    let now = Utc::now();
    for update in &command.updates {
        let vocabulary = vocabularies::require(conn, &update.vocabulary_id).await?;
        require_instance_admin_for(session, "VocabularyPermId", &vocabulary.code)?;

        if let Some(description) = &update.description {
            sqlx::query("UPDATE vocabularies SET description = ? WHERE id = ?")
                .bind(blank_to_none(Some(description.clone())))
                .bind(vocabulary.id)
                .execute(&mut *conn)
                .await?;
        }
        if let Some(chosen_from_list) = update.chosen_from_list {
            sqlx::query("UPDATE vocabularies SET chosen_from_list = ? WHERE id = ?")
                .bind(chosen_from_list)
                .bind(vocabulary.id)
                .execute(&mut *conn)
                .await?;
        }
        if let Some(url_template) = &update.url_template {
            sqlx::query("UPDATE vocabularies SET url_template = ? WHERE id = ?")
                .bind(blank_to_none(url_template.clone()))
                .bind(vocabulary.id)
                .execute(&mut *conn)
                .await?;
        }

        sqlx::query("UPDATE vocabularies SET modification_date = ? WHERE id = ?")
            .bind(now)
            .bind(vocabulary.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdateVocabulariesCommand) -> ApiResult<()> {
    let ids: Vec<&str> = command.updates.iter().map(|u| u.vocabulary_id.as_str()).collect();
    access_log::record(&session.user_id, "update-vocabularies", &[("VOCABULARY_UPDATES", format!("{:?}", ids))]);

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{TestContext, SPACE_POWER_USER};

    #[tokio::test]
    async fn test_update_fields() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let update = VocabularyUpdate {
            vocabulary_id: "organism".into(),
            description: Some("Model organisms".into()),
            chosen_from_list: Some(false),
            url_template: Some(Some("https://example.org/${term}".into())),
        };
        handle(&ctx.pool, &admin, UpdateVocabulariesCommand { updates: vec![update] })
            .await
            .unwrap();

        let row: (String, bool, String) = sqlx::query_as(
            "SELECT description, chosen_from_list, url_template FROM vocabularies WHERE code = 'ORGANISM'",
        )
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
        assert_eq!(row, ("Model organisms".into(), false, "https://example.org/${term}".into()));
    }

    #[test]
    fn test_null_template_clears() {
        let update: VocabularyUpdate =
            serde_json::from_str(r#"{"vocabulary_id": "ORGANISM", "url_template": null}"#).unwrap();
        assert_eq!(update.url_template, Some(None));
        let update: VocabularyUpdate = serde_json::from_str(r#"{"vocabulary_id": "ORGANISM"}"#).unwrap();
        assert_eq!(update.url_template, None);
    }

    #[tokio::test]
    async fn test_power_user_rejected() {
        let ctx = TestContext::new().await;
        let session = ctx.session(SPACE_POWER_USER).await;
        let update = VocabularyUpdate {
            vocabulary_id: "ORGANISM".into(),
            description: Some("x".into()),
            ..Default::default()
        };
        let err = handle(&ctx.pool, &session, UpdateVocabulariesCommand { updates: vec![update] })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Access denied to object with VocabularyPermId = [ORGANISM]");
    }
}
