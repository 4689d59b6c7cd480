use analysis_core::{AnalysisError, Holding, PortfolioSource, Transaction, TransactionKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    portfolio_id INTEGER NOT NULL,
    symbol TEXT NOT NULL,
    transaction_type TEXT NOT NULL,
    shares REAL NOT NULL,
    price REAL NOT NULL,
    fees REAL NOT NULL DEFAULT 0,
    transaction_date TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_transactions_portfolio ON transactions(portfolio_id, transaction_date);
CREATE TABLE IF NOT EXISTS holdings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    portfolio_id INTEGER NOT NULL,
    symbol TEXT NOT NULL,
    shares REAL NOT NULL,
    avg_cost REAL NOT NULL,
    sector TEXT,
    current_price REAL NOT NULL DEFAULT 0,
    UNIQUE(portfolio_id, symbol)
)
"#;

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    symbol: String,
    transaction_type: String,
    shares: f64,
    price: f64,
    fees: f64,
    transaction_date: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct HoldingRow {
    symbol: String,
    shares: f64,
    avg_cost: f64,
    sector: Option<String>,
    current_price: f64,
}

fn db_err(e: sqlx::Error) -> AnalysisError {
    AnalysisError::DatabaseError(e.to_string())
}

/// SQLite-backed portfolio ledger and holdings, read-only from the
/// analytics' point of view. Write helpers exist for seeding.
#[derive(Clone)]
pub struct SqlitePortfolioStore {
    pool: SqlitePool,
}

impl SqlitePortfolioStore {
    pub async fn connect(database_url: &str) -> Result<Self, AnalysisError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(db_err)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, AnalysisError> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), AnalysisError> {
        for statement in SCHEMA.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await.map_err(db_err)?;
            }
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn add_transaction(&self, portfolio_id: i64, tx: &Transaction) -> Result<i64, AnalysisError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO transactions (portfolio_id, symbol, transaction_type, shares, price, fees, transaction_date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(portfolio_id)
        .bind(&tx.symbol)
        .bind(tx.kind.as_str())
        .bind(tx.shares)
        .bind(tx.price)
        .bind(tx.fees)
        .bind(tx.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(id)
    }

    pub async fn upsert_holding(&self, portfolio_id: i64, holding: &Holding) -> Result<(), AnalysisError> {
        sqlx::query(
            r#"
            INSERT INTO holdings (portfolio_id, symbol, shares, avg_cost, sector, current_price)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(portfolio_id, symbol) DO UPDATE SET
                shares = excluded.shares,
                avg_cost = excluded.avg_cost,
                sector = excluded.sector,
                current_price = excluded.current_price
            "#,
        )
        .bind(portfolio_id)
        .bind(&holding.symbol)
        .bind(holding.shares)
        .bind(holding.avg_cost)
        .bind(&holding.sector)
        .bind(holding.current_price)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}

#[async_trait]
impl PortfolioSource for SqlitePortfolioStore {
    async fn list_transactions(&self, portfolio_id: i64) -> Result<Vec<Transaction>, AnalysisError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, symbol, transaction_type, shares, price, fees, transaction_date
            FROM transactions
            WHERE portfolio_id = ?
            ORDER BY transaction_date ASC, id ASC
            "#,
        )
        .bind(portfolio_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let transactions = rows
            .into_iter()
            .filter_map(|row| match row.transaction_type.parse::<TransactionKind>() {
                Ok(kind) => Some(Transaction {
                    id: Some(row.id),
                    symbol: row.symbol,
                    kind,
                    shares: row.shares,
                    price: row.price,
                    fees: row.fees,
                    timestamp: row.transaction_date,
                }),
                Err(e) => {
                    tracing::warn!("Skipping transaction {}: {}", row.id, e);
                    None
                }
            })
            .collect();

        Ok(transactions)
    }

    async fn list_holdings(&self, portfolio_id: i64) -> Result<Vec<Holding>, AnalysisError> {
        let rows = sqlx::query_as::<_, HoldingRow>(
            r#"
            SELECT symbol, shares, avg_cost, sector, current_price
            FROM holdings
            WHERE portfolio_id = ? AND shares > 0
            ORDER BY symbol
            "#,
        )
        .bind(portfolio_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|r| Holding {
                symbol: r.symbol,
                shares: r.shares,
                avg_cost: r.avg_cost,
                sector: r.sector,
                current_price: r.current_price,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{days_ago, holding, tx};

    async fn memory_store() -> SqlitePortfolioStore {
        SqlitePortfolioStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_transactions_round_trip_in_date_order() {
        let store = memory_store().await;
        store
            .add_transaction(1, &tx("MSFT", TransactionKind::Sell, 1.0, 410.0, days_ago(1)))
            .await
            .unwrap();
        store
            .add_transaction(1, &tx("MSFT", TransactionKind::Buy, 3.0, 400.0, days_ago(9)))
            .await
            .unwrap();
        store
            .add_transaction(2, &tx("AAPL", TransactionKind::Buy, 1.0, 190.0, days_ago(5)))
            .await
            .unwrap();

        let txs = store.list_transactions(1).await.unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].kind, TransactionKind::Buy);
        assert_eq!(txs[1].kind, TransactionKind::Sell);
        assert!(txs[0].timestamp < txs[1].timestamp);
    }

    #[tokio::test]
    async fn test_unknown_transaction_type_is_skipped() {
        let store = memory_store().await;
        store
            .add_transaction(1, &tx("AAPL", TransactionKind::Buy, 1.0, 190.0, days_ago(5)))
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO transactions (portfolio_id, symbol, transaction_type, shares, price, fees, transaction_date)
             VALUES (1, 'AAPL', 'SPLIT', 2, 0.5, 0, ?)",
        )
        .bind(days_ago(2))
        .execute(store.pool())
        .await
        .unwrap();

        let txs = store.list_transactions(1).await.unwrap();
        assert_eq!(txs.len(), 1);
    }

    #[tokio::test]
    async fn test_holdings_upsert_and_listing() {
        let store = memory_store().await;
        store.upsert_holding(7, &holding("AAPL", 5.0, Some("Technology"), 190.0)).await.unwrap();
        store.upsert_holding(7, &holding("AAPL", 8.0, Some("Technology"), 195.0)).await.unwrap();
        store.upsert_holding(7, &holding("XOM", 0.0, Some("Energy"), 110.0)).await.unwrap();

        let holdings = store.list_holdings(7).await.unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].shares, 8.0);
        assert_eq!(holdings[0].current_price, 195.0);
        assert!(store.list_holdings(8).await.unwrap().is_empty());
    }
}
