//! Test helpers and fixtures for database tests
//!
//! Every test builds its own in-memory database with the standard fixture
//! set loaded:
//!
//! - spaces `CISD`, `TEST-SPACE` and `TESTGROUP`
//! - projects `/CISD/NEMO`, `/TEST-SPACE/TEST-PROJECT`, `/TESTGROUP/TESTPROJ`
//! - users, all with password [`PASSWORD`]: `admin` (instance admin),
//!   `observer` (instance observer), `test_space_observer`, `test_space_user`
//!   and `test_space_power_user` (roles on `TEST-SPACE`), `test_group_admin`,
//!   `test_group_observer` and `test_group_power_user` (roles on `TESTGROUP`
//!   through authorization groups)
//! - property types `DESCRIPTION`, `SIZE` and `ORGANISM` (vocabulary
//!   `ORGANISM` with terms `RAT`, `HUMAN`)
//! - sample types `CELL_PLATE` and `WELL`, experiment type `SIRNA_HCS`, data
//!   set types `HCS_IMAGE` and `LINK_TYPE`, material type `VIRUS`
//!
//! ```rust,ignore
//! let ctx = TestContext::new().await;
//! let admin = ctx.admin().await;
//! let ids = create::handle(&ctx.pool, &admin, command).await.unwrap();
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use sqlx::SqlitePool;
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{
    auth::{hash_password, load_session, open_session, Session},
    config::Config,
    db,
    features::{queries::QueryDatabases, AppState},
    index::IndexSync,
};

/// Password of every fixture user
pub const PASSWORD: &str = "password";

pub const INSTANCE_ADMIN: &str = "admin";
pub const INSTANCE_OBSERVER: &str = "observer";
pub const SPACE_OBSERVER: &str = "test_space_observer";
pub const SPACE_USER: &str = "test_space_user";
pub const SPACE_POWER_USER: &str = "test_space_power_user";
pub const GROUP_ADMIN: &str = "test_group_admin";
pub const GROUP_OBSERVER: &str = "test_group_observer";
pub const GROUP_POWER_USER: &str = "test_group_power_user";

/// Every fixture user except the instance admin
pub const NON_ADMIN_USERS: &[&str] = &[
    INSTANCE_OBSERVER,
    SPACE_OBSERVER,
    SPACE_USER,
    SPACE_POWER_USER,
    GROUP_ADMIN,
    GROUP_OBSERVER,
    GROUP_POWER_USER,
];

const FIXTURES: &str = r#"
INSERT INTO spaces (code, description, registration_date, modification_date) VALUES
    ('CISD', 'Default space', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z'),
    ('TEST-SPACE', 'Space of the space scoped users', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z'),
    ('TESTGROUP', 'Space of the group scoped users', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z');

INSERT INTO projects (perm_id, code, space_id, registration_date, modification_date)
SELECT '20260101000000000-1', 'NEMO', id, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z' FROM spaces WHERE code = 'CISD';
INSERT INTO projects (perm_id, code, space_id, registration_date, modification_date)
SELECT '20260101000000000-2', 'TEST-PROJECT', id, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z' FROM spaces WHERE code = 'TEST-SPACE';
INSERT INTO projects (perm_id, code, space_id, registration_date, modification_date)
SELECT '20260101000000000-3', 'TESTPROJ', id, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z' FROM spaces WHERE code = 'TESTGROUP';

INSERT INTO authorization_groups (code, registration_date, modification_date) VALUES
    ('GROUP_ADMINS', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z'),
    ('GROUP_OBSERVERS', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z'),
    ('GROUP_POWER_USERS', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z');

INSERT INTO vocabularies (code, description, registration_date, modification_date) VALUES
    ('ORGANISM', 'Organisms', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z');
INSERT INTO vocabulary_terms (vocabulary_id, code, ordinal, registration_date)
SELECT id, 'RAT', 1, '2026-01-01T00:00:00Z' FROM vocabularies WHERE code = 'ORGANISM';
INSERT INTO vocabulary_terms (vocabulary_id, code, ordinal, registration_date)
SELECT id, 'HUMAN', 2, '2026-01-01T00:00:00Z' FROM vocabularies WHERE code = 'ORGANISM';

INSERT INTO entity_types (kind, code, description, attributes, modification_date) VALUES
    ('SAMPLE', 'CELL_PLATE', 'Cell plate', '{"generated_code_prefix":"S"}', '2026-01-01T00:00:00Z'),
    ('SAMPLE', 'WELL', 'Plate well', '{"generated_code_prefix":"W"}', '2026-01-01T00:00:00Z'),
    ('EXPERIMENT', 'SIRNA_HCS', 'siRNA screening', '{}', '2026-01-01T00:00:00Z'),
    ('DATA_SET', 'HCS_IMAGE', 'Images', '{}', '2026-01-01T00:00:00Z'),
    ('DATA_SET', 'LINK_TYPE', 'Linked data', '{}', '2026-01-01T00:00:00Z'),
    ('MATERIAL', 'VIRUS', 'Virus', '{}', '2026-01-01T00:00:00Z');

INSERT INTO property_types (code, label, description, data_type, registration_date) VALUES
    ('DESCRIPTION', 'Description', 'A description', 'VARCHAR', '2026-01-01T00:00:00Z'),
    ('SIZE', 'Size', 'A size', 'INTEGER', '2026-01-01T00:00:00Z');
INSERT INTO property_types (code, label, description, data_type, vocabulary_id, registration_date)
SELECT 'ORGANISM', 'Organism', 'The organism', 'CONTROLLEDVOCABULARY', id, '2026-01-01T00:00:00Z'
FROM vocabularies WHERE code = 'ORGANISM';

INSERT INTO property_assignments (entity_type_id, property_type_id, ordinal, mandatory)
SELECT t.id, p.id, 1, 0 FROM entity_types t, property_types p
WHERE t.code IN ('CELL_PLATE', 'WELL', 'SIRNA_HCS', 'HCS_IMAGE', 'LINK_TYPE', 'VIRUS') AND p.code = 'DESCRIPTION';
INSERT INTO property_assignments (entity_type_id, property_type_id, ordinal, mandatory)
SELECT t.id, p.id, 2, 0 FROM entity_types t, property_types p
WHERE t.code IN ('CELL_PLATE', 'SIRNA_HCS') AND p.code IN ('SIZE', 'ORGANISM');
"#;

/// (user, role, space code, authorization group) for every fixture user
const USERS: &[(&str, Option<&str>, Option<&str>, Option<&str>)] = &[
    (INSTANCE_ADMIN, Some("ADMIN"), None, None),
    (INSTANCE_OBSERVER, Some("OBSERVER"), None, None),
    (SPACE_OBSERVER, Some("OBSERVER"), Some("TEST-SPACE"), None),
    (SPACE_USER, Some("USER"), Some("TEST-SPACE"), None),
    (SPACE_POWER_USER, Some("POWER_USER"), Some("TEST-SPACE"), None),
    (GROUP_ADMIN, None, None, Some("GROUP_ADMINS")),
    (GROUP_OBSERVER, None, None, Some("GROUP_OBSERVERS")),
    (GROUP_POWER_USER, None, None, Some("GROUP_POWER_USERS")),
];

/// Group roles, all scoped to `TESTGROUP`
const GROUP_ROLES: &[(&str, &str)] = &[
    ("GROUP_ADMINS", "ADMIN"),
    ("GROUP_OBSERVERS", "OBSERVER"),
    ("GROUP_POWER_USERS", "POWER_USER"),
];

/// Hash of [`PASSWORD`], computed once per test binary
fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).expect("password hash"))
}

async fn load_fixtures(pool: &SqlitePool) {
    sqlx::raw_sql(FIXTURES).execute(pool).await.expect("fixtures");

    let now = Utc::now();
    for (user, role, space, group) in USERS {
        let person_id = sqlx::query(
            "INSERT INTO persons (user_id, first_name, active, registration_date) VALUES (?, ?, 1, ?)",
        )
        .bind(user)
        .bind(user)
        .bind(now)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid();
        sqlx::query("INSERT INTO credentials (person_id, password_hash) VALUES (?, ?)")
            .bind(person_id)
            .bind(password_hash())
            .execute(pool)
            .await
            .unwrap();

        if let Some(role) = role {
            sqlx::query(
                "INSERT INTO role_assignments (role, space_id, person_id, registration_date) \
                 VALUES (?, (SELECT id FROM spaces WHERE code = ?), ?, ?)",
            )
            .bind(role)
            .bind(space)
            .bind(person_id)
            .bind(now)
            .execute(pool)
            .await
            .unwrap();
        }
        if let Some(group) = group {
            sqlx::query(
                "INSERT INTO authorization_group_persons (group_id, person_id) \
                 SELECT id, ? FROM authorization_groups WHERE code = ?",
            )
            .bind(person_id)
            .bind(group)
            .execute(pool)
            .await
            .unwrap();
        }
    }

    for (group, role) in GROUP_ROLES {
        sqlx::query(
            "INSERT INTO role_assignments (role, space_id, group_id, registration_date) \
             SELECT ?, (SELECT id FROM spaces WHERE code = 'TESTGROUP'), id, ? FROM authorization_groups WHERE code = ?",
        )
        .bind(role)
        .bind(now)
        .bind(group)
        .execute(pool)
        .await
        .unwrap();
    }
}

/// A private database with fixtures and a running index worker
pub struct TestContext {
    pub pool: SqlitePool,
    pub index: IndexSync,
    pub config: Arc<Config>,
    _worker: DropGuard,
}

impl TestContext {
    pub async fn new() -> Self {
        let pool = db::connect_in_memory().await.expect("in-memory database");
        db::migrate(&pool).await.expect("migrations");
        load_fixtures(&pool).await;

        let index = IndexSync::new();
        let cancel = CancellationToken::new();
        index.spawn_worker(pool.clone(), Duration::from_millis(20), cancel.clone());

        Self {
            pool,
            index,
            config: Arc::new(Config::default()),
            _worker: cancel.drop_guard(),
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            db: self.pool.clone(),
            config: self.config.clone(),
            index: self.index.clone(),
            query_databases: QueryDatabases::metadata_only(self.pool.clone(), &self.config),
        }
    }

    /// Open a session for a fixture (or test created) user
    pub async fn session(&self, user_id: &str) -> Session {
        let person_id: i64 = sqlx::query_scalar("SELECT id FROM persons WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .unwrap_or_else(|_| panic!("unknown user {}", user_id));
        let mut conn = self.pool.acquire().await.unwrap();
        let token = open_session(&mut conn, person_id, user_id, Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();
        load_session(&mut conn, &token).await.unwrap()
    }

    pub async fn admin(&self) -> Session {
        self.session(INSTANCE_ADMIN).await
    }

    /// Row id of an object looked up by a single column
    pub async fn id_of(&self, table: &str, column: &str, value: &str) -> i64 {
        let sql = format!("SELECT id FROM {} WHERE {} = ?", table, column);
        sqlx::query_scalar(&sql)
            .bind(value)
            .fetch_one(&self.pool)
            .await
            .unwrap_or_else(|_| panic!("no {} with {} = {}", table, column, value))
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(&self.pool).await.unwrap()
    }

    /// Wait until the search index has caught up with every change
    pub async fn flush_index(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.index.flush(&self.pool))
            .await
            .expect("index flush timed out")
            .unwrap();
    }
}

#[tokio::test]
async fn test_fixture_roles() {
    let ctx = TestContext::new().await;

    let admin = ctx.admin().await;
    assert!(admin.is_instance_admin());

    let group_admin = ctx.session(GROUP_ADMIN).await;
    let testgroup = ctx.id_of("spaces", "code", "TESTGROUP").await;
    assert!(group_admin.has_space_role(testgroup, openbis_common::types::Role::Admin));
    assert!(!group_admin.is_instance_admin());
}
