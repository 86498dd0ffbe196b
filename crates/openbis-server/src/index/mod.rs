//! In-process search index kept in sync through the index outbox
//!
//! Writers append events to `index_outbox` inside their transaction. A
//! background worker drains the outbox in sequence order, rebuilds the
//! affected documents and publishes the last processed sequence number as a
//! watermark. [`IndexSync::flush`] resolves once the watermark covers every
//! event written before the call.

pub mod documents;
pub mod outbox;

use openbis_common::types::EntityKind;
use sqlx::{FromRow, SqlitePool};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio::{
    sync::{watch, Notify, RwLock},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    auth::ReadScope,
    error::{ApiError, ApiResult},
};

pub use documents::IndexDocument;
pub use outbox::IndexAction;

/// Events handled per drain round
const DRAIN_BATCH_SIZE: i64 = 500;

/// One global search hit
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub kind: EntityKind,
    pub perm_id: String,
    pub identifier: String,
    pub type_code: String,
    pub score: usize,
}

struct Inner {
    documents: RwLock<BTreeMap<(EntityKind, String), IndexDocument>>,
    watermark: watch::Sender<i64>,
    wake: Notify,
}

/// Handle to the shared index; cheap to clone
#[derive(Clone)]
pub struct IndexSync {
    inner: Arc<Inner>,
}

#[derive(FromRow)]
struct OutboxRow {
    seq: i64,
    entity_kind: String,
    perm_id: String,
    action: String,
}

impl Default for IndexSync {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexSync {
    pub fn new() -> Self {
        let (watermark, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                documents: RwLock::new(BTreeMap::new()),
                watermark,
                wake: Notify::new(),
            }),
        }
    }

    /// Wake the worker early; it also polls on its own
    pub fn notify(&self) {
        self.inner.wake.notify_one();
    }

    /// Last outbox sequence reflected in the index
    pub fn watermark(&self) -> i64 {
        *self.inner.watermark.borrow()
    }

    /// Wait until every event written so far has been indexed.
    ///
    /// Requires a running worker, see [`IndexSync::spawn_worker`].
    pub async fn flush(&self, pool: &SqlitePool) -> ApiResult<()> {
        let target = {
            let mut conn = pool.acquire().await?;
            outbox::last_sequence(&mut conn).await?
        };
        let mut receiver = self.inner.watermark.subscribe();
        self.notify();
        receiver
            .wait_for(|watermark| *watermark >= target)
            .await
            .map_err(|_| ApiError::Internal("Index watermark channel closed".to_string()))?;
        Ok(())
    }

    /// Process pending outbox events, returning how many were handled
    pub async fn drain(&self, pool: &SqlitePool) -> ApiResult<usize> {
        let mut handled = 0;
        loop {
            let mut conn = pool.acquire().await?;
            let rows: Vec<OutboxRow> = sqlx::query_as(
                "SELECT seq, entity_kind, perm_id, action FROM index_outbox WHERE seq > ? ORDER BY seq LIMIT ?",
            )
            .bind(self.watermark())
            .bind(DRAIN_BATCH_SIZE)
            .fetch_all(&mut *conn)
            .await?;

            let Some(last) = rows.last().map(|row| row.seq) else {
                return Ok(handled);
            };

            for row in &rows {
                let kind: EntityKind = row.entity_kind.parse()?;
                let key = (kind, row.perm_id.clone());
                let document = match IndexAction::parse(&row.action) {
                    Some(IndexAction::Upsert) => documents::build(&mut conn, kind, &row.perm_id).await?,
                    Some(IndexAction::Remove) => None,
                    None => {
                        tracing::warn!(seq = row.seq, action = %row.action, "Skipping unknown index action");
                        continue;
                    },
                };

                let mut docs = self.inner.documents.write().await;
                match document {
                    Some(document) => {
                        docs.insert(key, document);
                    },
                    None => {
                        docs.remove(&key);
                    },
                }
            }

            sqlx::query("DELETE FROM index_outbox WHERE seq <= ?")
                .bind(last)
                .execute(&mut *conn)
                .await?;
            drop(conn);

            handled += rows.len();
            self.inner.watermark.send_replace(last);
            tracing::debug!(watermark = last, events = rows.len(), "Index drained");
        }
    }

    /// Index every live entity from scratch and skip the pending outbox
    pub async fn rebuild(&self, pool: &SqlitePool) -> ApiResult<usize> {
        let mut conn = pool.acquire().await?;
        let last = outbox::last_sequence(&mut conn).await?;

        let mut fresh = BTreeMap::new();
        for kind in EntityKind::ALL {
            for perm_id in documents::live_perm_ids(&mut conn, *kind).await? {
                if let Some(document) = documents::build(&mut conn, *kind, &perm_id).await? {
                    fresh.insert((*kind, perm_id), document);
                }
            }
        }
        sqlx::query("DELETE FROM index_outbox WHERE seq <= ?")
            .bind(last)
            .execute(&mut *conn)
            .await?;

        let count = fresh.len();
        *self.inner.documents.write().await = fresh;
        self.inner.watermark.send_replace(last);
        tracing::info!(documents = count, "Search index rebuilt");
        Ok(count)
    }

    /// Run the drain loop until `cancel` fires
    pub fn spawn_worker(
        &self,
        pool: SqlitePool,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let index = self.clone();
        tokio::spawn(async move {
            tracing::info!("Index worker started");
            loop {
                if let Err(e) = index.drain(&pool).await {
                    tracing::error!(error = %e, "Index drain failed");
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = index.inner.wake.notified() => {},
                    _ = tokio::time::sleep(poll_interval) => {},
                }
            }
            tracing::info!("Index worker stopped");
        })
    }

    pub async fn contains(&self, kind: EntityKind, perm_id: &str) -> bool {
        self.inner
            .documents
            .read()
            .await
            .contains_key(&(kind, perm_id.to_string()))
    }

    /// Documents containing every word of `text`, best matches first
    pub async fn search(
        &self,
        text: &str,
        kinds: Option<&[EntityKind]>,
        scope: &ReadScope,
    ) -> Vec<IndexMatch> {
        let words: Vec<String> = text
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        if words.is_empty() {
            return Vec::new();
        }

        let docs = self.inner.documents.read().await;
        let mut matches: Vec<IndexMatch> = docs
            .values()
            .filter(|doc| kinds.map_or(true, |k| k.contains(&doc.kind)))
            .filter(|doc| scope.allows(doc.space_id, doc.project_id))
            .filter_map(|doc| {
                let mut score = 0;
                for word in &words {
                    let exact = doc.terms.iter().filter(|t| *t == word).count();
                    let partial = doc.terms.iter().filter(|t| t.contains(word.as_str())).count();
                    if partial == 0 {
                        return None;
                    }
                    score += exact * 10 + partial;
                }
                Some(IndexMatch {
                    kind: doc.kind,
                    perm_id: doc.perm_id.clone(),
                    identifier: doc.identifier.clone(),
                    type_code: doc.type_code.clone(),
                    score,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.identifier.cmp(&b.identifier)));
        matches
    }
}
