//! Authentication and authorization
//!
//! A [`Session`] is resolved once per request from the bearer token and carries
//! every role the person holds, directly or through authorization groups.
//! Handlers receive the session by reference and check privileges with the
//! helpers in [`authorization`].

pub mod authorization;
pub mod extractor;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use openbis_common::types::{Role, RoleLevel};
use sha2::{Digest, Sha256};
use sqlx::{FromRow, SqliteConnection};

use crate::error::{ApiError, ApiResult};

pub use authorization::ReadScope;
pub use extractor::Caller;

/// Salted Argon2id hash of a password, as a PHC string
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a password against a stored PHC string; malformed hashes never match
pub fn verify_password(password: &str, phc: &str) -> bool {
    PasswordHash::new(phc)
        .map(|hash| Argon2::default().verify_password(password.as_bytes(), &hash).is_ok())
        .unwrap_or(false)
}

/// Hex encoded SHA-256 digest under which a session token is stored
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Set or replace the password of a person
pub async fn store_password(conn: &mut SqliteConnection, person_id: i64, password: &str) -> ApiResult<()> {
    let hash = hash_password(password)?;
    sqlx::query(
        "INSERT INTO credentials (person_id, password_hash) VALUES (?, ?) \
         ON CONFLICT (person_id) DO UPDATE SET password_hash = excluded.password_hash",
    )
    .bind(person_id)
    .bind(hash)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Open a session for a person and return its bearer token. Only the
/// token's digest is stored.
pub async fn open_session(
    conn: &mut SqliteConnection,
    person_id: i64,
    user_id: &str,
    expires_at: DateTime<Utc>,
) -> ApiResult<String> {
    let token = format!("{}-{}", user_id, uuid::Uuid::new_v4());
    sqlx::query("INSERT INTO sessions (token_digest, person_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(token_digest(&token))
        .bind(person_id)
        .bind(Utc::now())
        .bind(expires_at)
        .execute(&mut *conn)
        .await?;
    Ok(token)
}

/// One role held by the session owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub role: Role,
    pub level: RoleLevel,
    pub space_id: Option<i64>,
    pub project_id: Option<i64>,
    /// Space of the project for project level grants
    pub project_space_id: Option<i64>,
}

/// An authenticated caller
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub person_id: i64,
    pub user_id: String,
    pub home_space_id: Option<i64>,
    pub roles: Vec<RoleGrant>,
}

#[derive(FromRow)]
struct SessionRow {
    expires_at: DateTime<Utc>,
    person_id: i64,
    user_id: String,
    home_space_id: Option<i64>,
    active: bool,
}

#[derive(FromRow)]
struct RoleRow {
    role: String,
    space_id: Option<i64>,
    project_id: Option<i64>,
    project_space_id: Option<i64>,
}

/// Load the roles of a person, including those inherited from groups
pub async fn load_roles(conn: &mut SqliteConnection, person_id: i64) -> ApiResult<Vec<RoleGrant>> {
    let rows: Vec<RoleRow> = sqlx::query_as(
        r#"
        SELECT r.role, r.space_id, r.project_id, pr.space_id AS project_space_id
        FROM role_assignments r
        LEFT JOIN projects pr ON pr.id = r.project_id
        WHERE r.person_id = ?
           OR r.group_id IN (SELECT group_id FROM authorization_group_persons WHERE person_id = ?)
        "#,
    )
    .bind(person_id)
    .bind(person_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| {
            let level = if row.project_id.is_some() {
                RoleLevel::Project
            } else if row.space_id.is_some() {
                RoleLevel::Space
            } else {
                RoleLevel::Instance
            };
            Ok(RoleGrant {
                role: row.role.parse()?,
                level,
                space_id: row.space_id,
                project_id: row.project_id,
                project_space_id: row.project_space_id,
            })
        })
        .collect()
}

/// Resolve a session token.
///
/// Unknown, expired and deactivated sessions all yield [`ApiError::InvalidSession`].
pub async fn load_session(conn: &mut SqliteConnection, token: &str) -> ApiResult<Session> {
    let row: Option<SessionRow> = sqlx::query_as(
        r#"
        SELECT s.expires_at, p.id AS person_id, p.user_id, p.home_space_id, p.active
        FROM sessions s
        JOIN persons p ON p.id = s.person_id
        WHERE s.token_digest = ?
        "#,
    )
    .bind(token_digest(token))
    .fetch_optional(&mut *conn)
    .await?;

    let row = row.ok_or(ApiError::InvalidSession)?;
    if row.expires_at < Utc::now() || !row.active {
        return Err(ApiError::InvalidSession);
    }

    let roles = load_roles(conn, row.person_id).await?;

    Ok(Session {
        token: token.to_string(),
        person_id: row.person_id,
        user_id: row.user_id,
        home_space_id: row.home_space_id,
        roles,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashes_are_salted() {
        let first = hash_password("password").unwrap();
        let second = hash_password("password").unwrap();
        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(verify_password("password", &first));
        assert!(verify_password("password", &second));
        assert!(!verify_password("Password", &first));
        assert!(!verify_password("password", "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"));
    }

    #[test]
    fn test_token_digest_is_stable_hex() {
        let digest = token_digest("admin-1");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, token_digest("admin-1"));
        assert_ne!(digest, token_digest("admin-2"));
    }
}
