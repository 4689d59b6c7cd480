use analysis_core::OhlcvBar;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::MarketDataResult;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ohlcv_bars (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    date TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume REAL NOT NULL,
    adjusted_close REAL NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(symbol, date)
);
CREATE INDEX IF NOT EXISTS idx_ohlcv_symbol_date ON ohlcv_bars(symbol, date)
"#;

#[derive(Debug, sqlx::FromRow)]
struct BarRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    adjusted_close: f64,
}

impl From<BarRow> for OhlcvBar {
    fn from(row: BarRow) -> Self {
        OhlcvBar {
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            adjusted_close: row.adjusted_close,
        }
    }
}

/// Persistent daily bar store keyed by (symbol, date).
///
/// Used as write-through storage for fresh history and as the fallback
/// source when the provider is unavailable. Entries are never expired.
#[derive(Clone)]
pub struct OhlcvCache {
    pool: SqlitePool,
}

impl OhlcvCache {
    pub async fn connect(database_url: &str) -> MarketDataResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Share an existing pool; creates the cache table if needed.
    pub async fn from_pool(pool: SqlitePool) -> MarketDataResult<Self> {
        let cache = Self { pool };
        cache.init_schema().await?;
        Ok(cache)
    }

    async fn init_schema(&self) -> MarketDataResult<()> {
        for statement in SCHEMA.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or overwrite one bar.
    pub async fn upsert(&self, symbol: &str, bar: &OhlcvBar) -> MarketDataResult<()> {
        self.upsert_bars(symbol, std::slice::from_ref(bar)).await
    }

    /// Write a batch in one transaction. On any failure the transaction is
    /// rolled back before the error is returned, so nothing from the batch
    /// is kept.
    pub async fn upsert_bars(&self, symbol: &str, bars: &[OhlcvBar]) -> MarketDataResult<()> {
        if bars.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        if let Err(e) = Self::write_bars(&mut *tx, symbol, bars, &now).await {
            tx.rollback().await?;
            return Err(e.into());
        }

        tx.commit().await?;
        tracing::debug!("Cached {} bars for {}", bars.len(), symbol);
        Ok(())
    }

    async fn write_bars(
        conn: &mut SqliteConnection,
        symbol: &str,
        bars: &[OhlcvBar],
        updated_at: &str,
    ) -> Result<(), sqlx::Error> {
        for bar in bars {
            sqlx::query(
                r#"
                INSERT INTO ohlcv_bars (symbol, date, open, high, low, close, volume, adjusted_close, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(symbol, date) DO UPDATE SET
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    volume = excluded.volume,
                    adjusted_close = excluded.adjusted_close,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(symbol)
            .bind(bar.date)
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(bar.volume)
            .bind(bar.adjusted_close)
            .bind(updated_at)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Bars for `symbol` dated on or after `since`, ascending by date.
    pub async fn query(&self, symbol: &str, since: NaiveDate) -> MarketDataResult<Vec<OhlcvBar>> {
        let rows = sqlx::query_as::<_, BarRow>(
            r#"
            SELECT date, open, high, low, close, volume, adjusted_close
            FROM ohlcv_bars
            WHERE symbol = ? AND date >= ?
            ORDER BY date ASC
            "#,
        )
        .bind(symbol)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OhlcvBar::from).collect())
    }

    /// Close of the most recent cached bar.
    pub async fn latest_price(&self, symbol: &str) -> MarketDataResult<Option<f64>> {
        let row: Option<(f64,)> = sqlx::query_as(
            "SELECT close FROM ohlcv_bars WHERE symbol = ? ORDER BY date DESC LIMIT 1",
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(close,)| close))
    }

    pub async fn count(&self, symbol: &str) -> MarketDataResult<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ohlcv_bars WHERE symbol = ?")
            .bind(symbol)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: &str, close: f64) -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1_000.0,
            adjusted_close: close,
        }
    }

    async fn memory_cache() -> OhlcvCache {
        OhlcvCache::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_upsert_same_key_keeps_last_write() {
        let cache = memory_cache().await;
        cache.upsert("AAPL", &bar("2024-03-01", 100.0)).await.unwrap();
        cache.upsert("AAPL", &bar("2024-03-01", 105.5)).await.unwrap();

        assert_eq!(cache.count("AAPL").await.unwrap(), 1);
        let since = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = cache.query("AAPL", since).await.unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 105.5);
        assert_eq!(bars[0].high, 106.5);
    }

    #[tokio::test]
    async fn test_query_filters_and_orders() {
        let cache = memory_cache().await;
        cache
            .upsert_bars(
                "MSFT",
                &[bar("2024-03-03", 3.0), bar("2024-03-01", 1.0), bar("2024-02-15", 0.5)],
            )
            .await
            .unwrap();
        cache.upsert("AAPL", &bar("2024-03-02", 9.0)).await.unwrap();

        let since = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let bars = cache.query("MSFT", since).await.unwrap();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 3.0]);
    }

    #[tokio::test]
    async fn test_latest_price() {
        let cache = memory_cache().await;
        assert_eq!(cache.latest_price("NVDA").await.unwrap(), None);

        cache
            .upsert_bars("NVDA", &[bar("2024-01-02", 48.0), bar("2024-01-05", 50.0)])
            .await
            .unwrap();
        assert_eq!(cache.latest_price("NVDA").await.unwrap(), Some(50.0));
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let cache = memory_cache().await;
        cache.upsert_bars("AAPL", &[]).await.unwrap();
        assert_eq!(cache.count("AAPL").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_nothing() {
        let cache = memory_cache().await;
        sqlx::query(
            "CREATE TRIGGER reject_large_close BEFORE INSERT ON ohlcv_bars
             WHEN NEW.close >= 100 BEGIN SELECT RAISE(ABORT, 'disk full'); END",
        )
        .execute(cache.pool())
        .await
        .unwrap();

        let result = cache
            .upsert_bars(
                "AAPL",
                &[bar("2024-03-01", 98.0), bar("2024-03-02", 99.0), bar("2024-03-03", 101.0)],
            )
            .await;
        assert!(matches!(result, Err(crate::error::MarketDataError::Cache(_))));
        assert_eq!(cache.count("AAPL").await.unwrap(), 0);

        cache.upsert("AAPL", &bar("2024-03-04", 97.0)).await.unwrap();
        assert_eq!(cache.count("AAPL").await.unwrap(), 1);
    }
}
