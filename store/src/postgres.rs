//! Postgres-backed rate history store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ratequorum_common::{CurrencyPair, RateError, RateResult, RateSnapshot, SnapshotMetadata};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::history::RateHistoryStore;

/// Rate history persisted to Postgres.
///
/// Uses the runtime query API, so no live database is needed at build time.
pub struct PgRateHistoryStore {
    pool: PgPool,
}

impl PgRateHistoryStore {
    /// Create a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the backing table and index if they do not exist.
    pub async fn ensure_schema(&self) -> RateResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rate_snapshots (
                id UUID PRIMARY KEY,
                pair TEXT NOT NULL,
                rate NUMERIC(18, 8) NOT NULL,
                metadata JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_rate_snapshots_pair_created_at \
             ON rate_snapshots (pair, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }
}

fn store_error(e: sqlx::Error) -> RateError {
    RateError::Store(e.to_string())
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    id: Uuid,
    pair: String,
    rate: Decimal,
    metadata: Json<SnapshotMetadata>,
    created_at: DateTime<Utc>,
}

impl SnapshotRow {
    fn into_snapshot(self) -> RateResult<RateSnapshot> {
        Ok(RateSnapshot {
            id: self.id,
            pair: self.pair.parse()?,
            rate: self.rate,
            metadata: self.metadata.0,
            timestamp: self.created_at,
        })
    }
}

#[async_trait]
impl RateHistoryStore for PgRateHistoryStore {
    async fn save(&self, snapshot: &RateSnapshot) -> RateResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rate_snapshots (id, pair, rate, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(snapshot.id)
        .bind(snapshot.pair.to_string())
        .bind(snapshot.rate)
        .bind(Json(&snapshot.metadata))
        .bind(snapshot.timestamp)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn find_latest(&self, pair: &CurrencyPair) -> RateResult<Option<RateSnapshot>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            "SELECT id, pair, rate, metadata, created_at \
             FROM rate_snapshots WHERE pair = $1 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(pair.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(SnapshotRow::into_snapshot).transpose()
    }

    async fn find_in_range(
        &self,
        pair: &CurrencyPair,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RateResult<Vec<RateSnapshot>> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            "SELECT id, pair, rate, metadata, created_at \
             FROM rate_snapshots \
             WHERE pair = $1 AND created_at BETWEEN $2 AND $3 \
             ORDER BY created_at ASC",
        )
        .bind(pair.to_string())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter().map(SnapshotRow::into_snapshot).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_row_conversion() {
        let row = SnapshotRow {
            id: Uuid::new_v4(),
            pair: "USD-NGN".to_string(),
            rate: dec!(1520.5),
            metadata: Json(SnapshotMetadata::Direct {
                provider: "OpenExchangeRates".to_string(),
            }),
            created_at: Utc::now(),
        };

        let snapshot = row.into_snapshot().unwrap();
        assert_eq!(snapshot.pair.to_string(), "USD-NGN");
        assert_eq!(snapshot.rate, dec!(1520.5));
    }

    #[test]
    fn test_row_conversion_rejects_bad_pair() {
        let row = SnapshotRow {
            id: Uuid::new_v4(),
            pair: "garbage".to_string(),
            rate: dec!(1),
            metadata: Json(SnapshotMetadata::Direct {
                provider: "test".to_string(),
            }),
            created_at: Utc::now(),
        };

        assert!(matches!(
            row.into_snapshot(),
            Err(RateError::InvalidPair(_))
        ));
    }
}
