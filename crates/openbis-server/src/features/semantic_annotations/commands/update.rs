//! Update semantic annotations command
//!
//! Only the ontology references change; the target is fixed at creation.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use super::OntologyTerm;
use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin_for, Session},
    error::{ApiError, ApiResult},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticAnnotationUpdate {
    pub semantic_annotation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<OntologyTerm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<OntologyTerm>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSemanticAnnotationsCommand {
    pub updates: Vec<SemanticAnnotationUpdate>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &UpdateSemanticAnnotationsCommand,
) -> ApiResult<()> {
    for update in &command.updates {
        let perm_id = update.semantic_annotation_id.trim();
        require_instance_admin_for(session, "SemanticAnnotationPermId", perm_id)?;
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM semantic_annotations WHERE perm_id = ?")
            .bind(perm_id)
            .fetch_optional(&mut *conn)
            .await?;
        let id = id.ok_or_else(|| ApiError::not_found("SemanticAnnotationPermId", perm_id))?;

        for (prefix, term) in [("predicate", &update.predicate), ("descriptor", &update.descriptor)] {
            let Some(term) = term else {
                continue;
            };
            let sql = format!(
                "UPDATE semantic_annotations SET {p}_ontology_id = ?, {p}_ontology_version = ?, {p}_accession_id = ? WHERE id = ?",
                p = prefix
            );
            sqlx::query(&sql)
                .bind(&term.ontology_id)
                .bind(&term.ontology_version)
                .bind(&term.accession_id)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdateSemanticAnnotationsCommand) -> ApiResult<()> {
    let ids: Vec<&String> = command.updates.iter().map(|u| &u.semantic_annotation_id).collect();
    access_log::record(
        &session.user_id,
        "update-semantic-annotations",
        &[("SEMANTIC_ANNOTATION_UPDATES", ids.log_repr())],
    );

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
