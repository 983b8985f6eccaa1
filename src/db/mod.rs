//! Database initialization, migrations, and the row-to-JSON adapter.
//!
//! SYSTEM CONTEXT
//! ==============
//! Startup uses this module to create the shared SQLx pool and enforce schema
//! migrations before accepting API traffic. Read-only listing endpoints run a
//! catalog query through [`query_json`] and hand the resulting JSON array to
//! the client unchanged, so the SQL column names define the response shape.

pub mod catalog;

use serde_json::{Map, Value};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Initialize the `PostgreSQL` connection pool and run migrations.
///
/// # Errors
///
/// Returns an error if the connection or migrations fail.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;

    Ok(pool)
}

/// Positional parameter for [`query_json`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Int(i64),
    NullInt,
    Text(String),
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Option<i64>> for SqlParam {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::NullInt, Self::Int)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Wrap a SELECT so Postgres aggregates its rows into one JSON array.
#[must_use]
pub fn wrap_json_agg(sql: &str) -> String {
    let inner = sql.trim().trim_end_matches(';').trim_end();
    format!("SELECT COALESCE(json_agg(row_to_json(q)), '[]'::json) FROM ({inner}) AS q")
}

/// Run `sql` and return its rows as a JSON array with camelCase keys.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn query_json(pool: &PgPool, sql: &str, params: &[SqlParam]) -> Result<Value, sqlx::Error> {
    let wrapped = wrap_json_agg(sql);
    let mut query = sqlx::query_scalar::<_, Value>(&wrapped);
    for param in params {
        query = match param {
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::NullInt => query.bind(None::<i64>),
            SqlParam::Text(v) => query.bind(v.clone()),
        };
    }
    let rows = query.fetch_one(pool).await?;
    Ok(camelize_keys(rows))
}

/// Convert a `snake_case` identifier to `camelCase`.
#[must_use]
pub fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' {
            // leading underscores are kept as-is
            if out.is_empty() {
                out.push(ch);
            } else {
                upper_next = true;
            }
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Recursively rename every object key in `value` to camelCase.
#[must_use]
pub fn camelize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let renamed: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (to_camel_case(&k), camelize_keys(v)))
                .collect();
            Value::Object(renamed)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(camelize_keys).collect()),
        other => other,
    }
}

/// Whether `err` is a Postgres unique-constraint violation.
#[must_use]
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Whether `err` is a Postgres foreign-key violation.
#[must_use]
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// First element of a JSON array, if any.
#[must_use]
pub fn first_row(rows: Value) -> Option<Value> {
    match rows {
        Value::Array(mut items) if !items.is_empty() => Some(items.swap_remove(0)),
        _ => None,
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
