//! Update samples command
//!
//! Besides properties and tags a sample can be moved between spaces,
//! projects and experiments, put into or taken out of a container and
//! relinked to parents and children.

use chrono::Utc;
use openbis_common::types::{EntityKind, Role};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;

use super::{create::annotate_all, resolve_placement, Placement};
use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::{ApiError, ApiResult},
    features::{
        samples::{self, relationships, Relationship, SampleRecord},
        shared::{
            identifiers::sample_identifier,
            properties::{self, PropertyMap},
            tags,
            updates::{plan_links, present},
            EntityRef, ListUpdate, TagId,
        },
    },
    index::{outbox, IndexAction},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleUpdate {
    pub sample_id: EntityRef,
    /// Space code; `null` makes the sample shared
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub space_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Option<EntityRef>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<Option<EntityRef>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub container_id: Option<Option<EntityRef>>,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub tag_ids: ListUpdate<TagId>,
    #[serde(default)]
    pub parent_ids: ListUpdate<EntityRef>,
    #[serde(default)]
    pub child_ids: ListUpdate<EntityRef>,
    /// Annotations to store on existing links
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl SampleUpdate {
    pub fn new(sample_id: EntityRef) -> Self {
        Self {
            sample_id,
            space_id: None,
            project_id: None,
            experiment_id: None,
            container_id: None,
            properties: PropertyMap::new(),
            tag_ids: ListUpdate::default(),
            parent_ids: ListUpdate::default(),
            child_ids: ListUpdate::default(),
            relationships: Vec::new(),
        }
    }

    fn moves(&self) -> bool {
        self.space_id.is_some() || self.project_id.is_some() || self.experiment_id.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSamplesCommand {
    pub updates: Vec<SampleUpdate>,
}

fn role_for(placement: &Placement) -> Role {
    if placement.space_id.is_some() {
        Role::User
    } else {
        Role::Admin
    }
}

fn current_placement(sample: &SampleRecord) -> Placement {
    Placement {
        space_id: sample.space_id,
        space_code: sample.space_code.clone(),
        project_id: sample.project_id,
        project_code: sample.project_code.clone(),
        experiment_id: sample.experiment_id,
    }
}

/// Perm id reference of a row in `table`
async fn perm_id_ref(
    conn: &mut SqliteConnection,
    table: &str,
    id: Option<i64>,
) -> ApiResult<Option<EntityRef>> {
    let Some(id) = id else {
        return Ok(None);
    };
    let perm_id: String = sqlx::query_scalar(&format!("SELECT perm_id FROM {} WHERE id = ?", table))
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(Some(EntityRef::PermId(perm_id)))
}

async fn relocate(
    conn: &mut SqliteConnection,
    session: &Session,
    sample: &SampleRecord,
    update: &SampleUpdate,
) -> ApiResult<()> {
    let space = match &update.space_id {
        Some(space) => space.clone(),
        None => sample.space_code.clone(),
    };
    let project = match &update.project_id {
        Some(project) => project.clone(),
        None => perm_id_ref(conn, "projects", sample.project_id).await?,
    };
    let experiment = match &update.experiment_id {
        Some(experiment) => experiment.clone(),
        None => perm_id_ref(conn, "experiments", sample.experiment_id).await?,
    };
    let placement = resolve_placement(conn, space.as_deref(), project.as_ref(), experiment.as_ref()).await?;
    if placement == current_placement(sample) {
        return Ok(());
    }

    let identifier = sample_identifier(
        placement.space_code.as_deref(),
        placement.project_code.as_deref(),
        sample.container_code.as_deref(),
        &sample.code,
    );
    placement.authorize(session, role_for(&placement), &identifier)?;
    let taken = samples::with_code(conn, &sample.code, true)
        .await?
        .iter()
        .any(|other| other.id != sample.id && other.identifier() == identifier);
    if taken {
        return Err(ApiError::user(format!("Sample '{}' already exists", identifier)));
    }

    sqlx::query("UPDATE samples SET space_id = ?, project_id = ?, experiment_id = ? WHERE id = ?")
        .bind(placement.space_id)
        .bind(placement.project_id)
        .bind(placement.experiment_id)
        .bind(sample.id)
        .execute(&mut *conn)
        .await?;
    if placement.experiment_id.is_some() {
        sqlx::query("UPDATE data_sets SET experiment_id = ? WHERE sample_id = ?")
            .bind(placement.experiment_id)
            .bind(sample.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn set_container(
    conn: &mut SqliteConnection,
    sample: &SampleRecord,
    container: Option<&EntityRef>,
) -> ApiResult<()> {
    let container_id = match container {
        Some(id) => {
            let container = samples::require(conn, id).await?;
            if container.id == sample.id {
                return Err(ApiError::user(format!(
                    "Sample '{}' cannot be its own container",
                    sample.identifier()
                )));
            }
            Some(container.id)
        },
        None => None,
    };
    sqlx::query("UPDATE samples SET container_id = ? WHERE id = ?")
        .bind(container_id)
        .bind(sample.id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Resolve every sample named in a list update, keyed by row id
async fn resolve_update(
    conn: &mut SqliteConnection,
    update: &ListUpdate<EntityRef>,
) -> ApiResult<(Option<Vec<i64>>, Vec<i64>, Vec<i64>, HashMap<i64, SampleRecord>)> {
    let mut records = HashMap::new();
    let mut ids_of = |list: Vec<SampleRecord>| -> Vec<i64> {
        list.into_iter()
            .map(|record| {
                let id = record.id;
                records.insert(id, record);
                id
            })
            .collect()
    };
    let set = match &update.set {
        Some(ids) => Some(samples::require_all(conn, ids).await?),
        None => None,
    };
    let add = samples::require_all(conn, &update.add).await?;
    let mut remove = Vec::new();
    for id in &update.remove {
        if let Some(record) = samples::resolve(conn, id).await? {
            remove.push(record);
        }
    }
    let set = set.map(&mut ids_of);
    let add = ids_of(add);
    let remove = ids_of(remove);
    Ok((set, add, remove, records))
}

async fn relink_parents(
    conn: &mut SqliteConnection,
    sample: &SampleRecord,
    update: &ListUpdate<EntityRef>,
) -> ApiResult<()> {
    if update.is_empty() {
        return Ok(());
    }
    let (set, add, remove, records) = resolve_update(conn, update).await?;
    let current = relationships::parents_of(conn, sample.id).await?;
    let plan = plan_links(&current, set.as_deref(), &add, &remove);
    for parent_id in &plan.remove {
        relationships::unlink(conn, *parent_id, sample.id).await?;
    }
    for parent_id in &plan.add {
        if let Some(parent) = records.get(parent_id) {
            relationships::link(conn, parent, sample).await?;
        }
    }
    Ok(())
}

async fn relink_children(
    conn: &mut SqliteConnection,
    sample: &SampleRecord,
    update: &ListUpdate<EntityRef>,
) -> ApiResult<()> {
    if update.is_empty() {
        return Ok(());
    }
    let (set, add, remove, records) = resolve_update(conn, update).await?;
    let current = relationships::children_of(conn, sample.id).await?;
    let plan = plan_links(&current, set.as_deref(), &add, &remove);
    for child_id in &plan.remove {
        relationships::unlink(conn, sample.id, *child_id).await?;
    }
    for child_id in &plan.add {
        if let Some(child) = records.get(child_id) {
            relationships::link(conn, sample, child).await?;
        }
    }
    Ok(())
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &UpdateSamplesCommand,
) -> ApiResult<()> {
    let now = Utc::now();
    for update in &command.updates {
        let sample = samples::require(conn, &update.sample_id).await?;
        let (kind, id) = sample.describe(&update.sample_id);
        let placement = current_placement(&sample);
        if placement.authorize(session, role_for(&placement), &id).is_err() {
            return Err(ApiError::unauthorized(kind, id));
        }

        if update.moves() {
            relocate(conn, session, &sample, update).await?;
        }
        if let Some(container) = &update.container_id {
            set_container(conn, &sample, container.as_ref()).await?;
        }
        properties::store(
            conn,
            EntityKind::Sample,
            sample.id,
            sample.type_id,
            &sample.type_code,
            &update.properties,
            false,
        )
        .await?;
        tags::apply_update(conn, session, EntityKind::Sample, sample.id, &update.tag_ids).await?;
        relink_parents(conn, &sample, &update.parent_ids).await?;
        relink_children(conn, &sample, &update.child_ids).await?;
        annotate_all(conn, &sample, &update.relationships).await?;

        sqlx::query("UPDATE samples SET modification_date = ? WHERE id = ?")
            .bind(now)
            .bind(sample.id)
            .execute(&mut *conn)
            .await?;
        outbox::record(conn, EntityKind::Sample, &sample.perm_id, IndexAction::Upsert).await?;
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdateSamplesCommand) -> ApiResult<()> {
    let ids: Vec<&EntityRef> = command.updates.iter().map(|u| &u.sample_id).collect();
    access_log::record(&session.user_id, "update-samples", &[("SAMPLE_UPDATES", ids.log_repr())]);

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        samples::commands::create::{self, CreateSamplesCommand, SampleCreation},
        shared::test_helpers::{TestContext, SPACE_USER},
    };

    async fn create_samples(ctx: &TestContext, space: &str, codes: &[&str]) {
        let admin = ctx.admin().await;
        let creations = codes
            .iter()
            .map(|code| SampleCreation::new("CELL_PLATE", Some(space), Some(code)))
            .collect();
        create::handle(&ctx.pool, &admin, CreateSamplesCommand { creations })
            .await
            .unwrap();
    }

    fn sample(identifier: &str) -> EntityRef {
        EntityRef::identifier(identifier)
    }

    async fn update(ctx: &TestContext, session: &Session, update: SampleUpdate) -> ApiResult<()> {
        handle(&ctx.pool, session, UpdateSamplesCommand { updates: vec![update] }).await
    }

    #[tokio::test]
    async fn test_parents_and_cycles() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        create_samples(&ctx, "CISD", &["A", "B", "C"]).await;

        let mut child = SampleUpdate::new(sample("/CISD/B"));
        child.parent_ids = ListUpdate::adding(vec![sample("/CISD/A")]);
        child.child_ids = ListUpdate::adding(vec![sample("/CISD/C")]);
        update(&ctx, &admin, child).await.unwrap();
        assert_eq!(ctx.count("SELECT COUNT(*) FROM sample_relationships").await, 2);

        let mut cycle = SampleUpdate::new(sample("/CISD/A"));
        cycle.parent_ids = ListUpdate::adding(vec![sample("/CISD/C")]);
        let err = update(&ctx, &admin, cycle).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Sample '/CISD/C' cannot be a parent of '/CISD/A' as this would create a cycle"
        );

        let mut unlink = SampleUpdate::new(sample("/CISD/B"));
        unlink.parent_ids = ListUpdate {
            set: Some(vec![]),
            ..Default::default()
        };
        update(&ctx, &admin, unlink).await.unwrap();
        assert_eq!(ctx.count("SELECT COUNT(*) FROM sample_relationships").await, 1);
    }

    #[tokio::test]
    async fn test_annotations_are_shared_by_both_sides() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        create_samples(&ctx, "CISD", &["PARENT", "CHILD"]).await;

        let mut link = SampleUpdate::new(sample("/CISD/CHILD"));
        link.parent_ids = ListUpdate::adding(vec![sample("/CISD/PARENT")]);
        update(&ctx, &admin, link).await.unwrap();

        // annotate from the parent side
        let mut annotate = SampleUpdate::new(sample("/CISD/PARENT"));
        let mut relationship = Relationship::new(sample("/CISD/CHILD"));
        relationship.child_annotations.insert("WELL".into(), "A1".into());
        annotate.relationships.push(relationship);
        update(&ctx, &admin, annotate).await.unwrap();

        let stored: (String, String) =
            sqlx::query_as("SELECT parent_annotations, child_annotations FROM sample_relationships")
                .fetch_one(&ctx.pool)
                .await
                .unwrap();
        assert_eq!(stored, ("{}".to_string(), r#"{"WELL":"A1"}"#.to_string()));
    }

    #[tokio::test]
    async fn test_move_into_project() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        create_samples(&ctx, "CISD", &["S1"]).await;

        let mut moved = SampleUpdate::new(sample("/CISD/S1"));
        moved.project_id = Some(Some(EntityRef::identifier("/CISD/NEMO")));
        update(&ctx, &admin, moved).await.unwrap();

        let mut conn = ctx.pool.acquire().await.unwrap();
        assert!(samples::resolve(&mut conn, &sample("/CISD/NEMO/S1")).await.unwrap().is_some());
        assert!(samples::resolve(&mut conn, &sample("/CISD/S1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_of_other_space_is_rejected() {
        let ctx = TestContext::new().await;
        create_samples(&ctx, "CISD", &["S1"]).await;
        let user = ctx.session(SPACE_USER).await;
        let mut change = SampleUpdate::new(sample("/CISD/S1"));
        change.properties.insert("DESCRIPTION".into(), "mine".into());
        let err = update(&ctx, &user, change).await.unwrap_err();
        assert_eq!(err.to_string(), "Access denied to object with SampleIdentifier = [/CISD/S1]");
    }
}
