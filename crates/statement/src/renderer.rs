use thiserror::Error;
use tracing::instrument;

use passbook_core::AccountId;
use passbook_infra::{LedgerError, TransactionHistory};

use crate::config::{ConfigError, StatementConfig};
use crate::pdf::{EncodeError, PageLayout, encode_pdf};
use crate::statement::{Statement, build_statement};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatementError {
    /// Reading the account history failed; nothing was rendered.
    #[error("failed to read transaction history: {0}")]
    History(#[from] LedgerError),

    #[error("invalid statement configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to encode statement: {0}")]
    Encode(#[from] EncodeError),
}

/// Renders account statements as PDF documents.
///
/// Read-only with respect to the ledger: it only calls
/// [`TransactionHistory::history`].
#[derive(Debug, Clone)]
pub struct StatementRenderer {
    config: StatementConfig,
    layout: PageLayout,
}

impl StatementRenderer {
    pub fn new(config: StatementConfig) -> Result<Self, StatementError> {
        Self::with_layout(config, PageLayout::default())
    }

    pub fn with_layout(config: StatementConfig, layout: PageLayout) -> Result<Self, StatementError> {
        config.validate()?;
        let max = layout.max_lines();
        if config.page_budget > max {
            return Err(ConfigError::PageBudgetTooLarge {
                budget: config.page_budget,
                max,
            }
            .into());
        }
        Ok(Self { config, layout })
    }

    pub fn config(&self) -> &StatementConfig {
        &self.config
    }

    /// Suggested download name for rendered statements.
    pub fn file_name(&self) -> &str {
        &self.config.file_name
    }

    /// Fetch the account's history and lay it out, without encoding.
    pub fn statement<H>(
        &self,
        history: &H,
        account_id: AccountId,
        holder_name: &str,
    ) -> Result<Statement, StatementError>
    where
        H: TransactionHistory + ?Sized,
    {
        let transactions = history.history(account_id)?;
        Ok(build_statement(holder_name, &transactions, &self.config))
    }

    /// Render the account's statement as PDF bytes.
    #[instrument(skip_all, fields(account_id = %account_id))]
    pub fn render<H>(
        &self,
        history: &H,
        account_id: AccountId,
        holder_name: &str,
    ) -> Result<Vec<u8>, StatementError>
    where
        H: TransactionHistory + ?Sized,
    {
        let statement = self.statement(history, account_id, holder_name)?;
        let bytes = encode_pdf(&statement, &self.layout)?;
        tracing::info!(
            pages = statement.page_count(),
            transactions = statement.line_count(),
            bytes = bytes.len(),
            "statement rendered"
        );
        Ok(bytes)
    }
}

impl Default for StatementRenderer {
    fn default() -> Self {
        Self {
            config: StatementConfig::default(),
            layout: PageLayout::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passbook_ledger::Transaction;

    struct BrokenHistory;

    impl TransactionHistory for BrokenHistory {
        fn history(&self, _account_id: AccountId) -> Result<Vec<Transaction>, LedgerError> {
            Err(LedgerError::Internal("disk on fire".to_string()))
        }
    }

    #[test]
    fn history_failure_propagates_unchanged() {
        let err = StatementRenderer::default()
            .render(&BrokenHistory, AccountId::new(), "x")
            .unwrap_err();
        assert_eq!(
            err,
            StatementError::History(LedgerError::Internal("disk on fire".to_string()))
        );
    }

    #[test]
    fn budget_larger_than_page_is_rejected() {
        let config = StatementConfig {
            page_budget: 40,
            ..StatementConfig::default()
        };
        assert_eq!(
            StatementRenderer::new(config).unwrap_err(),
            StatementError::Config(ConfigError::PageBudgetTooLarge { budget: 40, max: 36 })
        );
    }

    #[test]
    fn default_file_name() {
        assert_eq!(StatementRenderer::default().file_name(), "transaction_statement.pdf");
    }

    #[test]
    fn keeps_the_validated_config() {
        let config = StatementConfig {
            page_budget: 10,
            currency_prefix: "INR ".to_string(),
            ..StatementConfig::default()
        };
        let renderer = StatementRenderer::new(config.clone()).unwrap();
        assert_eq!(renderer.config(), &config);
    }
}
