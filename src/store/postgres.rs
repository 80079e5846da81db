//! Postgres-backed stores. Directory documents live in a single JSONB table
//! keyed by `(collection, scope, id)`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{types::Json, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{
    BlockList, BlockRecord, Collection, DirectoryStore, LoginAudit, LoginEntry, RawRecord,
    StoreError,
};

pub const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Applies [`SCHEMA_SQL`] statement by statement.
///
/// # Errors
/// Returns an error if any statement fails.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
    }
    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

fn map_sqlx_error(err: &sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err)
            if db_err
                .code()
                .is_some_and(|code| code.as_ref() == INSUFFICIENT_PRIVILEGE) =>
        {
            StoreError::PermissionDenied
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Backend("database pool unavailable".to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BlockList for PgStore {
    async fn is_blocked(&self, uid: &str) -> Result<bool, StoreError> {
        let query = "SELECT 1 FROM blocked_users WHERE uid = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(uid)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_sqlx_error(&err))?;
        Ok(row.is_some())
    }

    async fn block(&self, record: &BlockRecord) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO blocked_users (uid, display_name, email, reason, blocked_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (uid) DO UPDATE
                SET display_name = EXCLUDED.display_name,
                    email = EXCLUDED.email,
                    reason = EXCLUDED.reason,
                    blocked_at = EXCLUDED.blocked_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&record.uid)
            .bind(&record.display_name)
            .bind(&record.email)
            .bind(&record.reason)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_sqlx_error(&err))?;
        Ok(())
    }
}

#[async_trait]
impl LoginAudit for PgStore {
    async fn record_login(&self, entry: &LoginEntry) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO user_logins (id, uid, display_name, email, logged_in_at)
            VALUES ($1, $2, $3, $4, NOW())
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(Uuid::now_v7())
            .bind(&entry.uid)
            .bind(&entry.display_name)
            .bind(&entry.email)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_sqlx_error(&err))?;
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for PgStore {
    async fn list(&self, collection: &Collection) -> Result<Vec<RawRecord>, StoreError> {
        let query = r"
            SELECT id, document
            FROM directory_records
            WHERE collection = $1 AND scope = $2
            ORDER BY id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(collection.name())
            .bind(collection.scope())
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_sqlx_error(&err))?;

        rows.iter()
            .map(|row| {
                let id: String = row
                    .try_get("id")
                    .map_err(|err| StoreError::Backend(err.to_string()))?;
                let Json(document): Json<Value> = row
                    .try_get("document")
                    .map_err(|err| StoreError::Backend(err.to_string()))?;
                Ok(RawRecord::new(&id, document))
            })
            .collect()
    }

    async fn update_photo(
        &self,
        collection: &Collection,
        id: &str,
        photo: &str,
    ) -> Result<(), StoreError> {
        let query = r"
            UPDATE directory_records
            SET document = jsonb_set(document, '{photo}', to_jsonb($4::text), true)
            WHERE collection = $1 AND scope = $2 AND id = $3
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(collection.name())
            .bind(collection.scope())
            .bind(id)
            .bind(photo)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_sqlx_error(&err))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(format!(
                "no {} document with id {id}",
                collection.name()
            )));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|err| map_sqlx_error(&err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{borrow::Cow, error::Error as StdError, fmt};

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    #[test]
    fn insufficient_privilege_maps_to_permission_denied() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("42501"),
        }));
        assert_eq!(map_sqlx_error(&err), StoreError::PermissionDenied);

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(matches!(map_sqlx_error(&err), StoreError::Backend(_)));

        assert!(matches!(
            map_sqlx_error(&sqlx::Error::RowNotFound),
            StoreError::Backend(_)
        ));
    }

    #[test]
    fn schema_splits_into_statements() {
        let statements = split_sql_statements(SCHEMA_SQL);
        assert_eq!(statements.len(), 4);
        assert!(statements
            .iter()
            .all(|statement| statement.ends_with(';') && !statement.starts_with("--")));
        assert!(statements[0].contains("blocked_users"));
        assert!(statements[3].contains("directory_records"));
    }

    #[test]
    fn split_keeps_trailing_statement_without_semicolon() {
        let statements = split_sql_statements("SELECT 1;\n-- note\nSELECT 2");
        assert_eq!(statements, vec!["SELECT 1;".to_string(), "SELECT 2".to_string()]);
    }
}
