use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{load_rows, to_vocabularies, Vocabulary, VocabularyFetchOptions};
use crate::{access_log, access_log::LogRepr, auth::Session, error::ApiResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetVocabulariesQuery {
    pub ids: Vec<String>,
    #[serde(default)]
    pub fetch_options: VocabularyFetchOptions,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: GetVocabulariesQuery,
) -> ApiResult<BTreeMap<String, Vocabulary>> {
    access_log::record(&session.user_id, "get-vocabularies", &[("VOCABULARY_IDS", query.ids.log_repr())]);

    let wanted: Vec<String> = query.ids.iter().map(|id| id.trim().to_uppercase()).collect();
    let mut conn = pool.acquire().await?;
    let rows = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| wanted.contains(&row.code))
        .collect();
    let vocabularies = to_vocabularies(&mut conn, rows, &query.fetch_options).await?;
    Ok(vocabularies.into_iter().map(|v| (v.perm_id.clone(), v)).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        shared::test_helpers::{TestContext, SPACE_OBSERVER},
        vocabularies::{
            commands::{create, CreateVocabulariesCommand, VocabularyCreation, VocabularyTermCreation},
            queries::VocabularyTermFetchOptions,
        },
    };

    #[tokio::test]
    async fn test_created_vocabulary_round_trips_with_sorted_terms() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let creation = VocabularyCreation {
            description: Some("Greek letters".into()),
            managed_internally: true,
            chosen_from_list: false,
            url_template: Some("https://letters.example/${term}".into()),
            terms: vec![
                VocabularyTermCreation {
                    label: Some("Last".into()),
                    ..VocabularyTermCreation::new("OMEGA")
                },
                VocabularyTermCreation::new("ALPHA"),
            ],
            ..VocabularyCreation::new("LETTERS")
        };
        create::handle(&ctx.pool, &admin, CreateVocabulariesCommand { creations: vec![creation] })
            .await
            .unwrap();

        let query = GetVocabulariesQuery {
            ids: vec!["letters".into(), "MISSING".into()],
            fetch_options: VocabularyFetchOptions {
                terms: Some(VocabularyTermFetchOptions::default()),
                ..Default::default()
            },
        };
        let observer = ctx.session(SPACE_OBSERVER).await;
        let found = handle(&ctx.pool, &observer, query).await.unwrap();
        assert_eq!(found.len(), 1);

        let letters = &found["LETTERS"];
        assert_eq!(letters.description.as_deref(), Some("Greek letters"));
        assert!(letters.managed_internally);
        assert!(!letters.chosen_from_list);
        assert!(!letters.internal_name_space);
        assert_eq!(letters.url_template.as_deref(), Some("https://letters.example/${term}"));
        assert!(letters.registrator.get("Registrator").is_err());

        let terms = letters.terms.get("Terms").unwrap();
        let codes: Vec<&str> = terms.iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes, vec!["ALPHA", "OMEGA"]);
        assert_eq!(terms[1].label.as_deref(), Some("Last"));
        assert_eq!(terms[1].ordinal, 1);
        assert!(terms[0].official);
    }

    #[tokio::test]
    async fn test_terms_not_fetched_by_default() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let query = GetVocabulariesQuery {
            ids: vec!["ORGANISM".into()],
            ..Default::default()
        };
        let found = handle(&ctx.pool, &admin, query).await.unwrap();
        let err = found["ORGANISM"].terms.get("Terms").unwrap_err();
        assert_eq!(err.to_string(), "Terms has not been fetched");
    }
}
