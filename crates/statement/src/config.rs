//! Statement configuration.

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PAGE_BUDGET: &str = "PASSBOOK_PAGE_BUDGET";
pub const ENV_CURRENCY_PREFIX: &str = "PASSBOOK_CURRENCY_PREFIX";
pub const ENV_STATEMENT_FILE: &str = "PASSBOOK_STATEMENT_FILE";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("page budget must be at least 1")]
    ZeroPageBudget,

    #[error("page budget {budget} exceeds the {max} lines a page can hold")]
    PageBudgetTooLarge { budget: usize, max: usize },

    #[error("invalid timestamp format '{0}'")]
    TimestampFormat(String),

    #[error("statement file name cannot be empty")]
    EmptyFileName,
}

/// How statements are laid out as text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatementConfig {
    /// Maximum transaction lines per page.
    pub page_budget: usize,
    /// Printed before every amount. The standard PDF fonts only cover Latin-1,
    /// so currency glyphs such as the rupee sign are spelled out.
    pub currency_prefix: String,
    /// `chrono` strftime pattern for transaction timestamps (rendered in UTC).
    pub timestamp_format: String,
    /// Header text; the holder name is appended after a space.
    pub title_prefix: String,
    /// Suggested download name.
    pub file_name: String,
}

impl Default for StatementConfig {
    fn default() -> Self {
        Self {
            page_budget: 36,
            currency_prefix: "Rs. ".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            title_prefix: "Transaction Statement for".to_string(),
            file_name: "transaction_statement.pdf".to_string(),
        }
    }
}

impl StatementConfig {
    /// Defaults overlaid with `PASSBOOK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup` (same keys as `from_env`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_PAGE_BUDGET) {
            config.page_budget = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_PAGE_BUDGET,
                value: raw.clone(),
            })?;
        }
        if let Some(prefix) = lookup(ENV_CURRENCY_PREFIX) {
            config.currency_prefix = prefix;
        }
        if let Some(file_name) = lookup(ENV_STATEMENT_FILE) {
            config.file_name = file_name;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_budget == 0 {
            return Err(ConfigError::ZeroPageBudget);
        }
        if self.file_name.trim().is_empty() {
            return Err(ConfigError::EmptyFileName);
        }
        if StrftimeItems::new(&self.timestamp_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::TimestampFormat(self.timestamp_format.clone()));
        }
        Ok(())
    }
}
