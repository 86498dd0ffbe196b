//! Feature modules implementing the V3 API
//!
//! Each feature is a vertical slice with its own commands, queries and
//! routes. Write operations run in one transaction per batch; read
//! operations honour the caller's read scope.
//!
//! # Features
//!
//! - **sessions**: login and logout
//! - **server_info**: server information map
//! - **spaces**, **projects**, **experiments**, **samples**, **data_sets**,
//!   **materials**: the entity hierarchy
//! - **entity_types**: one generic registry for sample, experiment, data set
//!   and material types
//! - **vocabularies**, **property_types**, **plugins**, **semantic_annotations**:
//!   metadata describing entity properties
//! - **persons**, **authorization_groups**, **role_assignments**: who may do what
//! - **tags**: personal tags attached to entities
//! - **external_dms**: external data management systems for linked data
//! - **deletions**: trash records, confirmed or reverted
//! - **queries**: stored queries and the read-only SQL gateway
//! - **operation_executions**: batch execution tracking with maintenance tasks
//! - **global_search**: text search over the index
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Write operations (create, update, delete)
//! - `queries/` - Read operations (get, search)
//! - `routes.rs` - HTTP route definitions

pub mod authorization_groups;
pub mod data_sets;
pub mod deletions;
pub mod entity_types;
pub mod experiments;
pub mod external_dms;
pub mod global_search;
pub mod materials;
pub mod operation_executions;
pub mod persons;
pub mod plugins;
pub mod projects;
pub mod property_types;
pub mod queries;
pub mod role_assignments;
pub mod samples;
pub mod semantic_annotations;
pub mod server_info;
pub mod sessions;
pub mod shared;
pub mod spaces;
pub mod tags;
pub mod vocabularies;

use axum::{routing::get, Router};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::{config::Config, index::IndexSync};
use entity_types::{DataSetTypes, ExperimentTypes, MaterialTypes, SampleTypes};
use queries::QueryDatabases;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct AppState {
    /// Metadata store
    pub db: SqlitePool,
    pub config: Arc<Config>,
    /// Search index fed by the index outbox
    pub index: IndexSync,
    /// Databases reachable through stored queries and the SQL gateway
    pub query_databases: QueryDatabases,
}

/// Creates the V3 API router with all feature routes mounted
///
/// Sessions live at the root (`/login`, `/logout`); every other feature is
/// mounted under its own path prefix.
pub fn router(state: AppState) -> Router<()> {
    Router::new()
        .merge(sessions::sessions_routes())
        .route("/server-information", get(server_info::get_server_information))
        .nest("/spaces", spaces::spaces_routes())
        .nest("/projects", projects::projects_routes())
        .nest("/experiments", experiments::experiments_routes())
        .nest("/samples", samples::samples_routes())
        .nest("/data-sets", data_sets::data_sets_routes())
        .nest("/materials", materials::materials_routes())
        .nest("/sample-types", entity_types::entity_type_routes::<SampleTypes>())
        .nest("/experiment-types", entity_types::entity_type_routes::<ExperimentTypes>())
        .nest("/data-set-types", entity_types::entity_type_routes::<DataSetTypes>())
        .nest("/material-types", entity_types::entity_type_routes::<MaterialTypes>())
        .nest("/vocabularies", vocabularies::vocabularies_routes())
        .nest("/vocabulary-terms", vocabularies::vocabulary_terms_routes())
        .nest("/property-types", property_types::property_types_routes())
        .nest("/plugins", plugins::plugins_routes())
        .nest("/persons", persons::persons_routes())
        .nest("/role-assignments", role_assignments::role_assignments_routes())
        .nest("/authorization-groups", authorization_groups::authorization_groups_routes())
        .nest("/external-dms", external_dms::external_dms_routes())
        .nest("/semantic-annotations", semantic_annotations::semantic_annotations_routes())
        .nest("/tags", tags::tags_routes())
        .nest("/queries", queries::queries_routes())
        .nest("/deletions", deletions::deletions_routes())
        .nest("/operation-executions", operation_executions::operation_executions_routes())
        .nest("/global-search", global_search::global_search_routes())
        .with_state(state)
}
