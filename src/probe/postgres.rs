//! PostgreSQL probe executor backed by a sqlx pool

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{Column, Postgres, Row, TypeInfo};
use std::time::Duration;

use super::{ProbeError, ProbeExecutor, ProbeResult, Scalar};
use crate::config::DatabaseConfig;

pub const MAX_CONNECTIONS: u32 = 15;
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_LIFETIME: Duration = Duration::from_secs(2 * 60 * 60);
pub const APPLICATION_NAME: &str = "pgalert";

/// Runs probes on a connection pool for one instance
#[derive(Debug, Clone)]
pub struct PgProbeExecutor {
    pool: PgPool,
}

impl PgProbeExecutor {
    /// Open the pool and verify the instance is reachable
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let ssl_mode: PgSslMode = config.sslmode.parse()?;
        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .ssl_mode(ssl_mode)
            .application_name(APPLICATION_NAME);
        if !config.username.is_empty() {
            options = options.username(&config.username);
        }
        if !config.password.is_empty() {
            options = options.password(&config.password);
        }

        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .idle_timeout(IDLE_TIMEOUT)
            .max_lifetime(MAX_LIFETIME)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Decode every column. A column that cannot be decoded becomes
    /// `Null`; the row itself is always kept.
    fn decode_row(row: &PgRow) -> Vec<Scalar> {
        row.columns()
            .iter()
            .map(|column| {
                let kind = ColumnKind::of(column.type_info().name());
                decode_column(row, column.ordinal(), kind).unwrap_or_else(|e| {
                    let error = ProbeError::Decode {
                        column: column.name().to_string(),
                        message: e.to_string(),
                    };
                    tracing::warn!(error = %error, "Column decoded as null");
                    Scalar::Null
                })
            })
            .collect()
    }
}

#[async_trait]
impl ProbeExecutor for PgProbeExecutor {
    async fn execute(&self, sql: &str) -> Result<ProbeResult, ProbeError> {
        // Simple protocol: every value arrives in text format, so types
        // without a native mapping can still be read as text
        let rows = sqlx::raw_sql(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ProbeError::Query(e.to_string()))?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        Ok(ProbeResult {
            columns,
            rows: rows.iter().map(Self::decode_row).collect(),
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> Result<Option<T>, sqlx::Error>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(idx)
}

/// How a column is read, by PostgreSQL type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int2,
    Int4,
    Int8,
    Oid,
    Float4,
    Float8,
    Numeric,
    Bool,
    Text,
    Timestamptz,
    Timestamp,
    Date,
    Json,
    /// Anything else (INTERVAL, INET, UUID, arrays, ...): the server's text form
    Raw,
}

impl ColumnKind {
    fn of(type_name: &str) -> Self {
        match type_name {
            "INT2" => Self::Int2,
            "INT4" => Self::Int4,
            "INT8" => Self::Int8,
            "OID" => Self::Oid,
            "FLOAT4" => Self::Float4,
            "FLOAT8" => Self::Float8,
            "NUMERIC" => Self::Numeric,
            "BOOL" => Self::Bool,
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" | "UNKNOWN" => Self::Text,
            "TIMESTAMPTZ" => Self::Timestamptz,
            "TIMESTAMP" => Self::Timestamp,
            "DATE" => Self::Date,
            "JSON" | "JSONB" => Self::Json,
            _ => Self::Raw,
        }
    }
}

fn decode_column(row: &PgRow, idx: usize, kind: ColumnKind) -> Result<Scalar, sqlx::Error> {
    let value = match kind {
        ColumnKind::Int2 => get::<i16>(row, idx)?.map(|v| Scalar::Int(v.into())),
        ColumnKind::Int4 => get::<i32>(row, idx)?.map(|v| Scalar::Int(v.into())),
        ColumnKind::Int8 => get::<i64>(row, idx)?.map(Scalar::Int),
        ColumnKind::Oid => {
            get::<sqlx::postgres::types::Oid>(row, idx)?.map(|v| Scalar::Int(v.0.into()))
        }
        ColumnKind::Float4 => get::<f32>(row, idx)?.map(|v| Scalar::Float(v.into())),
        ColumnKind::Float8 => get::<f64>(row, idx)?.map(Scalar::Float),
        ColumnKind::Numeric => {
            get::<sqlx::types::Decimal>(row, idx)?.map(|v| Scalar::Text(v.to_string()))
        }
        ColumnKind::Bool => get::<bool>(row, idx)?.map(Scalar::Bool),
        ColumnKind::Text => get::<String>(row, idx)?.map(Scalar::Text),
        ColumnKind::Timestamptz => {
            get::<DateTime<Utc>>(row, idx)?.map(|v| Scalar::Text(v.to_rfc3339()))
        }
        ColumnKind::Timestamp => {
            get::<NaiveDateTime>(row, idx)?.map(|v| Scalar::Text(v.and_utc().to_rfc3339()))
        }
        ColumnKind::Date => get::<NaiveDate>(row, idx)?.map(|v| Scalar::Text(v.to_string())),
        ColumnKind::Json => {
            get::<sqlx::types::JsonValue>(row, idx)?.map(|v| Scalar::Text(v.to_string()))
        }
        ColumnKind::Raw => row
            .try_get_unchecked::<Option<String>, _>(idx)?
            .map(Scalar::Text),
    };

    Ok(value.unwrap_or(Scalar::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_kinds() {
        assert_eq!(ColumnKind::of("INT8"), ColumnKind::Int8);
        assert_eq!(ColumnKind::of("FLOAT8"), ColumnKind::Float8);
        assert_eq!(ColumnKind::of("NAME"), ColumnKind::Text);
        assert_eq!(ColumnKind::of("JSONB"), ColumnKind::Json);
        assert_eq!(ColumnKind::of("TIMESTAMPTZ"), ColumnKind::Timestamptz);
    }

    #[test]
    fn test_unmapped_types_read_as_text() {
        for name in ["INTERVAL", "INET", "UUID", "INT8[]", "NAME[]", "MONEY"] {
            assert_eq!(ColumnKind::of(name), ColumnKind::Raw, "{name}");
        }
    }

    async fn live_executor() -> Option<PgProbeExecutor> {
        let url = std::env::var("PGALERT_TEST_DATABASE_URL").ok()?;
        let pool = PgPool::connect(&url).await.unwrap();
        Some(PgProbeExecutor::from_pool(pool))
    }

    // Needs PGALERT_TEST_DATABASE_URL pointing at a reachable server
    #[tokio::test]
    #[ignore]
    async fn test_rows_with_unmapped_columns_are_kept() {
        let Some(executor) = live_executor().await else {
            return;
        };

        let result = executor
            .execute("SELECT 150::int8 AS total, '127.0.0.1'::inet AS addr, interval '5 minutes' AS age")
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["total", "addr", "age"]);
        assert_eq!(
            result.rows,
            vec![vec![
                Scalar::Int(150),
                Scalar::Text("127.0.0.1".to_string()),
                Scalar::Text("00:05:00".to_string()),
            ]]
        );

        let result = executor
            .execute("SELECT count(*), max(client_addr) FROM pg_stat_activity")
            .await
            .unwrap();
        assert_eq!(result.rows.len(), 1);
        assert!(matches!(result.rows[0][0], Scalar::Int(n) if n >= 1));
        executor.close().await;
    }

    #[tokio::test]
    #[ignore]
    async fn test_native_types_and_nulls() {
        let Some(executor) = live_executor().await else {
            return;
        };

        let result = executor
            .execute("SELECT 2.5::float8, true, 'idle'::text, NULL::int4, 1.50::numeric")
            .await
            .unwrap();

        assert_eq!(
            result.rows[0],
            vec![
                Scalar::Float(2.5),
                Scalar::Bool(true),
                Scalar::Text("idle".to_string()),
                Scalar::Null,
                Scalar::Text("1.50".to_string()),
            ]
        );
        executor.close().await;
    }
}
