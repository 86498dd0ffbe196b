//! Text search across experiments, samples, data sets and materials
//!
//! Hits come from the in-process index, so a write shows up once the index
//! worker has drained it. Results are limited to what the caller may read.

pub mod routes;

use openbis_common::types::EntityKind;
use serde::{Deserialize, Serialize};

use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::shared::{validation::require_non_empty, Paging, SearchResult},
    index::IndexSync,
};

pub use routes::global_search_routes;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSearchQuery {
    pub text: String,
    /// Restrict hits to these kinds; all kinds when absent
    pub kinds: Option<Vec<EntityKind>>,
    pub paging: Paging,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSearchObject {
    pub kind: EntityKind,
    pub perm_id: String,
    pub identifier: String,
    pub type_code: String,
    pub score: usize,
}

#[tracing::instrument(skip_all, fields(user = %session.user_id))]
pub async fn handle(
    index: &IndexSync,
    session: &Session,
    query: GlobalSearchQuery,
) -> ApiResult<SearchResult<GlobalSearchObject>> {
    access_log::record(
        &session.user_id,
        "search-globally",
        &[("SEARCH_TEXT", query.text.clone()), ("KINDS", format!("{:?}", query.kinds))],
    );
    let text = require_non_empty(Some(&query.text), "Search text")?;

    let hits = index
        .search(text, query.kinds.as_deref(), &session.read_scope())
        .await
        .into_iter()
        .map(|hit| GlobalSearchObject {
            kind: hit.kind,
            perm_id: hit.perm_id,
            identifier: hit.identifier,
            type_code: hit.type_code,
            score: hit.score,
        })
        .collect();

    let (window, total) = query.paging.apply(hits);
    Ok(SearchResult::new(window, total))
}
