pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::error::ApiResult;

pub use get::GetExternalDmsQuery;
pub use search::{ExternalDmsSearchCriteria, SearchExternalDmsQuery};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExternalDms {
    pub perm_id: String,
    pub code: String,
    pub label: Option<String>,
    pub address: String,
    pub address_type: String,
    pub registration_date: DateTime<Utc>,
}

pub(crate) async fn load_all(conn: &mut SqliteConnection) -> ApiResult<Vec<ExternalDms>> {
    let rows = sqlx::query_as::<_, ExternalDms>(
        r#"
        SELECT code AS perm_id, code, label, address, address_type, registration_date
        FROM external_dms
        ORDER BY code
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}
