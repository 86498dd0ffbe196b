//! Create vocabularies command

use chrono::Utc;
use openbis_common::code::is_internal_code;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use super::{default_true, insert_term, VocabularyTermCreation};
use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin, Session},
    error::ApiResult,
    features::{
        shared::{
            error_helpers::map_unique_violation,
            validation::{blank_to_none, validate_internal_code},
        },
        vocabularies::VocabularyRecord,
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyCreation {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub managed_internally: bool,
    #[serde(default = "default_true")]
    pub chosen_from_list: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_template: Option<String>,
    #[serde(default)]
    pub terms: Vec<VocabularyTermCreation>,
}

impl VocabularyCreation {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: None,
            managed_internally: false,
            chosen_from_list: true,
            url_template: None,
            terms: Vec::new(),
        }
    }
}

crate::struct_log_repr!(VocabularyCreation, "VocabularyCreation", "code" => code);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVocabulariesCommand {
    pub creations: Vec<VocabularyCreation>,
}

/// Insert the vocabularies with their terms, returning the vocabulary codes
pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreateVocabulariesCommand,
) -> ApiResult<Vec<String>> {
    require_instance_admin(session, "Creating vocabularies")?;

    let now = Utc::now();
    let mut codes = Vec::with_capacity(command.creations.len());
    for creation in &command.creations {
        let code = validate_internal_code(&creation.code, "Vocabulary")?;
        let id = sqlx::query(
            r#"
            INSERT INTO vocabularies
                (code, description, managed_internally, internal_name_space, chosen_from_list,
                 url_template, registrator_id, registration_date, modification_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&code)
        .bind(blank_to_none(creation.description.clone()))
        .bind(creation.managed_internally)
        .bind(is_internal_code(&code))
        .bind(creation.chosen_from_list)
        .bind(blank_to_none(creation.url_template.clone()))
        .bind(session.person_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, || format!("Vocabulary '{}' already exists", code)))?
        .last_insert_rowid();

        let vocabulary = VocabularyRecord {
            id,
            code: code.clone(),
            managed_internally: creation.managed_internally,
        };
        for term in &creation.terms {
            insert_term(conn, session, &vocabulary, term).await?;
        }
        codes.push(code);
    }
    Ok(codes)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    command: CreateVocabulariesCommand,
) -> ApiResult<Vec<String>> {
    access_log::record(&session.user_id, "create-vocabularies", &[("NEW_VOCABULARIES", command.creations.log_repr())]);

    let mut tx = pool.begin().await?;
    let codes = execute(&mut tx, session, &command).await?;
    tx.commit().await?;

    tracing::info!(count = codes.len(), "Vocabularies created");
    Ok(codes)
}
