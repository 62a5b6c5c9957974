//! Thin pass-throughs over the driver plus a prepared-statement cache.
//!
//! Statements prepared against one connection go stale when the schema
//! changes under them; the server then fails execution with
//! `feature_not_supported` ("cached plan must not change result type") or
//! reports the statement name as unknown. Those failures are re-tagged as
//! [`ExecuteError::Reset`] so callers know to drop their cached statement
//! and re-prepare, instead of treating the error as fatal.

use indexmap::IndexMap;
use thiserror::Error;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Row, RowStream, Statement};

use crate::{Error as CrateError, Result};

/// Execution failure, split by whether the prepared statement survived.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The statement was invalidated server-side; discard it, re-prepare
    /// and retry.
    #[error("prepared statement invalidated: {0}")]
    Reset(#[source] tokio_postgres::Error),
    /// Any other driver error, propagated unchanged.
    #[error(transparent)]
    Database(#[from] tokio_postgres::Error),
}

impl ExecuteError {
    fn classify(error: tokio_postgres::Error) -> Self {
        let reset = matches!(
            error.code(),
            Some(code)
                if *code == SqlState::FEATURE_NOT_SUPPORTED
                    || *code == SqlState::INVALID_SQL_STATEMENT_NAME
        );
        if reset {
            ExecuteError::Reset(error)
        } else {
            ExecuteError::Database(error)
        }
    }
}

/// Prepare a statement and run it in one go, returning the statement for
/// reuse alongside the rows.
pub async fn prepare_execute(
    client: &Client,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<(Statement, Vec<Row>)> {
    let statement = client.prepare(sql).await?;
    let rows = client.query(&statement, params).await?;
    Ok((statement, rows))
}

/// Run a one-off query.
pub async fn query(
    client: &Client,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<Vec<Row>> {
    Ok(client.query(sql, params).await?)
}

/// Stream rows from a prepared statement.
pub async fn stream(
    client: &Client,
    statement: &Statement,
    params: &[&(dyn ToSql + Sync)],
) -> Result<RowStream> {
    Ok(client
        .query_raw(statement, params.iter().map(|param| *param as &dyn ToSql))
        .await?)
}

/// Execute a prepared statement, re-tagging invalidation as a reset
/// signal.
pub async fn execute(
    client: &Client,
    statement: &Statement,
    params: &[&(dyn ToSql + Sync)],
) -> std::result::Result<u64, ExecuteError> {
    client
        .execute(statement, params)
        .await
        .map_err(ExecuteError::classify)
}

/// Prepared statements keyed by SQL text, in preparation order.
#[derive(Default)]
pub struct StatementCache {
    statements: IndexMap<String, Statement>,
}

impl StatementCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Get the cached statement for `sql`, preparing it on a miss.
    pub async fn prepare(&mut self, client: &Client, sql: &str) -> Result<Statement> {
        if let Some(statement) = self.statements.get(sql) {
            return Ok(statement.clone());
        }
        let statement = client.prepare(sql).await?;
        self.statements.insert(sql.to_string(), statement.clone());
        Ok(statement)
    }

    /// Drop the cached statement for `sql`, if any.
    pub fn invalidate(&mut self, sql: &str) -> bool {
        self.statements.shift_remove(sql).is_some()
    }
}

/// Execute through the cache. On a reset signal the cache entry is
/// evicted before the error surfaces, so the next call re-prepares.
pub async fn execute_cached(
    client: &Client,
    cache: &mut StatementCache,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> std::result::Result<u64, ExecuteError> {
    let statement = match cache.prepare(client, sql).await {
        Ok(statement) => statement,
        Err(CrateError::Postgres(error)) => return Err(ExecuteError::classify(error)),
    };
    match execute(client, &statement, params).await {
        Err(error @ ExecuteError::Reset(_)) => {
            tracing::debug!(sql, "evicting prepared statement after reset signal");
            cache.invalidate(sql);
            Err(error)
        }
        other => other,
    }
}
