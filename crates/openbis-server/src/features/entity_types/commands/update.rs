use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use super::{assign, unassign, validation_plugin_id, PropertyAssignmentCreation};
use crate::{
    access_log,
    auth::{authorization::require_instance_admin_for, Session},
    error::ApiResult,
    features::{
        entity_types::{require_type, EntityKindSpec},
        shared::{updates::present, validation::blank_to_none},
    },
};

/// Changes to the property assignments of a type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentsUpdate {
    /// Replace every assignment; unlisted property types are unassigned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<Vec<PropertyAssignmentCreation>>,
    pub add: Vec<PropertyAssignmentCreation>,
    /// Property type codes to unassign
    pub remove: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "A: Serialize", deserialize = "A: DeserializeOwned"))]
pub struct EntityTypeUpdate<A> {
    pub type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `null` unbinds the validation plugin
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub validation_plugin_id: Option<Option<String>>,
    /// Replaces the kind specific attributes as a whole
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<A>,
    #[serde(default)]
    pub property_assignments: AssignmentsUpdate,
}

impl<A> EntityTypeUpdate<A> {
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            description: None,
            validation_plugin_id: None,
            attributes: None,
            property_assignments: AssignmentsUpdate::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "A: Serialize", deserialize = "A: DeserializeOwned"))]
pub struct UpdateEntityTypesCommand<A> {
    pub updates: Vec<EntityTypeUpdate<A>>,
}

pub async fn execute<S: EntityKindSpec>(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &UpdateEntityTypesCommand<S::Attributes>,
) -> ApiResult<()> {
    let now = Utc::now();
    for update in &command.updates {
        let record = require_type(conn, S::KIND, &update.type_id).await?;
        require_instance_admin_for(session, "EntityTypePermId", &record.code)?;

        if let Some(description) = &update.description {
            sqlx::query("UPDATE entity_types SET description = ? WHERE id = ?")
                .bind(blank_to_none(Some(description.clone())))
                .bind(record.id)
                .execute(&mut *conn)
                .await?;
        }

        if let Some(plugin) = &update.validation_plugin_id {
            let plugin_id = match plugin {
                Some(name) => Some(validation_plugin_id(conn, S::KIND, name).await?),
                None => None,
            };
            sqlx::query("UPDATE entity_types SET validation_plugin_id = ? WHERE id = ?")
                .bind(plugin_id)
                .bind(record.id)
                .execute(&mut *conn)
                .await?;
        }

        if let Some(attributes) = &update.attributes {
            S::validate_attributes(attributes)?;
            sqlx::query("UPDATE entity_types SET attributes = ? WHERE id = ?")
                .bind(serde_json::to_string(attributes)?)
                .bind(record.id)
                .execute(&mut *conn)
                .await?;
        }

        apply_assignments::<S>(conn, record.id, &record.code, &update.property_assignments).await?;

        sqlx::query("UPDATE entity_types SET modification_date = ? WHERE id = ?")
            .bind(now)
            .bind(record.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn apply_assignments<S: EntityKindSpec>(
    conn: &mut SqliteConnection,
    type_id: i64,
    type_code: &str,
    update: &AssignmentsUpdate,
) -> ApiResult<()> {
    let current: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT pt.code FROM property_assignments pa
        JOIN property_types pt ON pt.id = pa.property_type_id
        WHERE pa.entity_type_id = ?
        "#,
    )
    .bind(type_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut to_remove: Vec<String> = update.remove.iter().map(|c| c.trim().to_uppercase()).collect();
    if let Some(set) = &update.set {
        let kept: Vec<String> = set.iter().map(|a| a.property_type_id.trim().to_uppercase()).collect();
        to_remove.extend(current.iter().filter(|code| !kept.contains(code)).cloned());
    }
    to_remove.sort();
    to_remove.dedup();
    for code in &to_remove {
        if current.contains(code) {
            unassign(conn, S::KIND, type_id, type_code, code).await?;
        }
    }

    let next_ordinal: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(ordinal), 0) FROM property_assignments WHERE entity_type_id = ?",
    )
    .bind(type_id)
    .fetch_one(&mut *conn)
    .await?;

    let added = update.set.iter().flatten().chain(update.add.iter());
    for (offset, assignment) in added.enumerate() {
        assign(conn, S::KIND, type_id, type_code, assignment, next_ordinal + offset as i64 + 1).await?;
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, kind = %S::KIND))]
pub async fn handle<S: EntityKindSpec>(
    pool: &SqlitePool,
    session: &Session,
    command: UpdateEntityTypesCommand<S::Attributes>,
) -> ApiResult<()> {
    let ids: Vec<&str> = command.updates.iter().map(|u| u.type_id.as_str()).collect();
    access_log::record(
        &session.user_id,
        &format!("update-{}", S::operation_noun()),
        &[("ENTITY_TYPE_UPDATES", format!("{:?}", ids))],
    );

    let mut tx = pool.begin().await?;
    execute::<S>(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        entity_types::{SampleTypeAttributes, SampleTypes},
        shared::test_helpers::{TestContext, GROUP_ADMIN},
    };

    fn command(update: EntityTypeUpdate<SampleTypeAttributes>) -> UpdateEntityTypesCommand<SampleTypeAttributes> {
        UpdateEntityTypesCommand { updates: vec![update] }
    }

    async fn assigned(ctx: &TestContext, type_code: &str) -> Vec<String> {
        sqlx::query_scalar(
            "SELECT pt.code FROM property_assignments pa JOIN property_types pt ON pt.id = pa.property_type_id \
             JOIN entity_types t ON t.id = pa.entity_type_id WHERE t.code = ? ORDER BY pt.code",
        )
        .bind(type_code)
        .fetch_all(&ctx.pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_add_and_remove_assignments() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let mut update = EntityTypeUpdate::new("WELL");
        update.property_assignments.add = vec![PropertyAssignmentCreation::new("SIZE")];
        update.property_assignments.remove = vec!["description".into()];
        handle::<SampleTypes>(&ctx.pool, &admin, command(update)).await.unwrap();

        assert_eq!(assigned(&ctx, "WELL").await, vec!["SIZE"]);
    }

    #[tokio::test]
    async fn test_set_replaces_assignments() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let mut update = EntityTypeUpdate::new("CELL_PLATE");
        update.property_assignments.set = Some(vec![PropertyAssignmentCreation::new("ORGANISM")]);
        handle::<SampleTypes>(&ctx.pool, &admin, command(update)).await.unwrap();

        assert_eq!(assigned(&ctx, "CELL_PLATE").await, vec!["ORGANISM"]);
    }

    #[tokio::test]
    async fn test_attributes_replaced() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let mut update = EntityTypeUpdate::new("WELL");
        update.attributes = Some(SampleTypeAttributes {
            subcode_unique: true,
            generated_code_prefix: "WL".into(),
            ..Default::default()
        });
        handle::<SampleTypes>(&ctx.pool, &admin, command(update)).await.unwrap();

        let mut conn = ctx.pool.acquire().await.unwrap();
        let record = require_type(&mut conn, SampleTypes::KIND, "WELL").await.unwrap();
        let attributes: SampleTypeAttributes = record.attributes().unwrap();
        assert!(attributes.subcode_unique);
        assert_eq!(attributes.generated_code_prefix, "WL");
    }

    #[tokio::test]
    async fn test_group_admin_cannot_update_types() {
        let ctx = TestContext::new().await;
        let session = ctx.session(GROUP_ADMIN).await;
        let mut update = EntityTypeUpdate::new("WELL");
        update.description = Some("x".into());
        let err = handle::<SampleTypes>(&ctx.pool, &session, command(update)).await.unwrap_err();
        assert_eq!(err.to_string(), "Access denied to object with EntityTypePermId = [WELL]");
    }
}
