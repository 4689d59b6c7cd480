use async_trait::async_trait;
use crate::{AnalysisError, Holding, Transaction};

/// Read access to the portfolio persistence service.
///
/// Transactions and holdings are owned by that collaborator; analytics only
/// ever reads them.
#[async_trait]
pub trait PortfolioSource: Send + Sync {
    /// All transactions of a portfolio, ascending by timestamp.
    async fn list_transactions(&self, portfolio_id: i64) -> Result<Vec<Transaction>, AnalysisError>;

    async fn list_holdings(&self, portfolio_id: i64) -> Result<Vec<Holding>, AnalysisError>;
}
