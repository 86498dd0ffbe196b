//! Checking, binding and running read-only SQL
//!
//! A statement may reference `${name}` variables. They are replaced by
//! positional parameters and bound from the caller's parameter map, so their
//! values never become part of the SQL text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::{
    ast::{visit_relations, SetExpr, Statement},
    dialect::SQLiteDialect,
    parser::Parser,
};
use sqlx::{sqlite::SqliteRow, Column, Executor, Row, SqlitePool, Statement as _, TypeInfo, ValueRef};
use std::{
    collections::{BTreeMap, BTreeSet},
    ops::ControlFlow,
};

use crate::error::{ApiError, ApiResult};

/// Column of a query result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    pub title: String,
}

/// Query result: column titles and rows of JSON values in column order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableModel {
    pub columns: Vec<TableColumn>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl TableModel {
    /// Values of one column, by title
    pub fn column(&self, title: &str) -> Option<Vec<&serde_json::Value>> {
        let index = self.columns.iter().position(|c| c.title == title)?;
        Some(self.rows.iter().filter_map(|row| row.get(index)).collect())
    }
}

/// A statement that passed every check, ready to run
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub values: Vec<String>,
}

fn variable_pattern() -> ApiResult<Regex> {
    Regex::new(r"\$\{([^}]+)\}").map_err(|e| ApiError::Internal(e.to_string()))
}

/// Names of the `${name}` variables in `sql`, in order of appearance
pub fn variables(sql: &str) -> ApiResult<Vec<String>> {
    let pattern = variable_pattern()?;
    Ok(pattern
        .captures_iter(sql)
        .map(|captures| captures[1].trim().to_string())
        .collect())
}

/// Strip trailing terminators and reject a `;` anywhere else
fn single_statement(sql: &str) -> ApiResult<&str> {
    let statement = sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if statement.is_empty() {
        return Err(ApiError::user("Sql cannot be empty"));
    }
    if statement.contains(';') {
        return Err(ApiError::user(
            "Sorry, only one query statement is allowed: A ';' somewhere in the middle has been found.",
        ));
    }
    Ok(statement)
}

fn reads_only(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => true,
        SetExpr::Query(query) => reads_only(&query.body),
        SetExpr::SetOperation { left, right, .. } => reads_only(left) && reads_only(right),
        _ => false,
    }
}

/// Reject anything but a single select statement
pub fn check_select(sql: &str) -> ApiResult<()> {
    let statement = single_statement(sql)?;
    let placeholders = variable_pattern()?.replace_all(statement, "?");
    let parsed = Parser::parse_sql(&SQLiteDialect {}, &placeholders)
        .map_err(|e| ApiError::user(format!("Invalid SQL: {}", e)))?;

    match parsed.as_slice() {
        [Statement::Query(query)] if reads_only(&query.body) => Ok(()),
        [_] => Err(ApiError::user("Sorry, only select statements are allowed.")),
        _ => Err(ApiError::user(
            "Sorry, only one query statement is allowed: A ';' somewhere in the middle has been found.",
        )),
    }
}

/// Reject a statement that reads any of the `denied` tables, however the
/// name is qualified, quoted or nested
pub fn deny_relations(sql: &str, denied: &[&str]) -> ApiResult<()> {
    let parsed = Parser::parse_sql(&SQLiteDialect {}, sql)
        .map_err(|e| ApiError::user(format!("Invalid SQL: {}", e)))?;
    let found = visit_relations(&parsed, |name| match name.0.last() {
        Some(table) if denied.iter().any(|d| d.eq_ignore_ascii_case(&table.value)) => {
            ControlFlow::Break(table.value.clone())
        },
        _ => ControlFlow::Continue(()),
    });
    match found {
        ControlFlow::Break(table) => Err(ApiError::AuthorizationFailure(format!(
            "Access to table '{}' is not allowed",
            table
        ))),
        ControlFlow::Continue(()) => Ok(()),
    }
}

/// Check `sql` and bind `parameters` to its variables.
///
/// Every variable needs a value and every parameter must name a variable.
pub fn bind(sql: &str, parameters: &BTreeMap<String, String>) -> ApiResult<BoundStatement> {
    check_select(sql)?;
    let statement = single_statement(sql)?;

    let names = variables(statement)?;
    let known: BTreeSet<&str> = names.iter().map(String::as_str).collect();
    let unbound: Vec<&str> = known
        .iter()
        .copied()
        .filter(|name| !parameters.contains_key(*name))
        .collect();
    if !unbound.is_empty() {
        return Err(ApiError::user(format!(
            "Following variables are not bound: {}",
            unbound.join(", ")
        )));
    }
    if let Some(unknown) = parameters.keys().find(|name| !known.contains(name.as_str())) {
        return Err(ApiError::user(format!("Unknown variable '{}'", unknown)));
    }

    let values = names
        .iter()
        .filter_map(|name| parameters.get(name).cloned())
        .collect();
    Ok(BoundStatement {
        sql: variable_pattern()?.replace_all(statement, "?").into_owned(),
        values,
    })
}

fn cell(row: &SqliteRow, index: usize) -> ApiResult<serde_json::Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(serde_json::Value::Null);
    }
    let value = match raw.type_info().name() {
        "INTEGER" | "BOOLEAN" => serde_json::Value::from(row.try_get::<i64, _>(index)?),
        "REAL" | "NUMERIC" => serde_json::Value::from(row.try_get::<f64, _>(index)?),
        "BLOB" => serde_json::Value::from(hex::encode(row.try_get::<Vec<u8>, _>(index)?)),
        _ => serde_json::Value::from(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}

/// Run a bound statement inside a transaction that is always rolled back
pub async fn run(pool: &SqlitePool, statement: &BoundStatement) -> ApiResult<TableModel> {
    let mut tx = pool.begin().await?;

    let prepared = (&mut *tx).prepare(statement.sql.as_str()).await?;
    let columns: Vec<TableColumn> = prepared
        .columns()
        .iter()
        .map(|column| TableColumn {
            title: column.name().to_string(),
        })
        .collect();

    let mut query = sqlx::query(&statement.sql);
    for value in &statement.values {
        query = query.bind(value);
    }
    let fetched = query.fetch_all(&mut *tx).await?;
    tx.rollback().await?;

    let mut rows = Vec::with_capacity(fetched.len());
    for row in &fetched {
        let cells = (0..columns.len())
            .map(|index| cell(row, index))
            .collect::<ApiResult<Vec<_>>>()?;
        rows.push(cells);
    }
    Ok(TableModel { columns, rows })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_trailing_semicolon_is_fine_middle_one_is_not() {
        assert!(check_select("SELECT code FROM spaces;  ").is_ok());
        let err = check_select("SELECT code FROM spaces; SELECT 1").unwrap_err();
        assert!(err.to_string().contains("only one query statement is allowed"));
    }

    #[test]
    fn test_only_selects() {
        assert!(check_select("WITH s AS (SELECT code FROM spaces) SELECT * FROM s").is_ok());
        assert!(check_select("SELECT 1 UNION SELECT 2").is_ok());
        for sql in [
            "DELETE FROM spaces",
            "UPDATE spaces SET code = 'X'",
            "INSERT INTO spaces (code) VALUES ('X')",
            "DROP TABLE spaces",
        ] {
            let err = check_select(sql).unwrap_err();
            assert!(err.to_string().contains("only select statements are allowed"), "{}", sql);
        }
    }

    #[test]
    fn test_denied_relations_in_any_position() {
        let denied = &["sessions", "credentials"];
        assert!(deny_relations("SELECT user_id FROM persons", denied).is_ok());
        for sql in [
            "SELECT * FROM sessions",
            "SELECT s.token_digest FROM main.sessions s",
            "SELECT * FROM \"Sessions\"",
            "SELECT * FROM [credentials]",
            "SELECT p.user_id FROM persons p JOIN credentials c ON c.person_id = p.id",
            "SELECT (SELECT password_hash FROM credentials LIMIT 1)",
            "WITH t AS (SELECT * FROM sessions) SELECT * FROM t",
            "SELECT 1 UNION SELECT person_id FROM sessions",
        ] {
            let err = deny_relations(sql, denied).unwrap_err();
            assert!(matches!(err, ApiError::AuthorizationFailure(_)), "{}", sql);
        }
    }

    #[test]
    fn test_variables_bound_in_order() {
        let bound = bind(
            "SELECT * FROM samples WHERE code = ${code} OR perm_id = ${id} OR code = ${code}",
            &params(&[("code", "S1"), ("id", "P1")]),
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT * FROM samples WHERE code = ? OR perm_id = ? OR code = ?");
        assert_eq!(bound.values, vec!["S1", "P1", "S1"]);
    }

    #[test]
    fn test_unbound_and_unknown_variables() {
        let err = bind("SELECT * FROM spaces WHERE code = ${code}", &params(&[])).unwrap_err();
        assert!(err.to_string().contains("variables are not bound"));

        let err = bind("SELECT * FROM spaces", &params(&[("code", "CISD")])).unwrap_err();
        assert!(err.to_string().contains("Unknown variable"));
    }
}
