//! Pure statement layout: ordered history in, pages of text lines out.
//!
//! Nothing here touches the ledger or any output encoding, so pagination can be
//! tested on plain strings.

use std::fmt::Write as _;

use chrono::SecondsFormat;
use serde::Serialize;

use passbook_ledger::Transaction;

use crate::config::StatementConfig;

/// One page of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementPage {
    /// Present on the first page only.
    pub header: Option<String>,
    pub lines: Vec<String>,
}

/// A laid-out statement, independent of how it will be encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub pages: Vec<StatementPage>,
}

impl Statement {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Transaction lines across all pages (headers excluded).
    pub fn line_count(&self) -> usize {
        self.pages.iter().map(|p| p.lines.len()).sum()
    }

    pub fn header(&self) -> Option<&str> {
        self.pages.first().and_then(|p| p.header.as_deref())
    }
}

/// Lay out `transactions` (already in display order) for `holder_name`.
pub fn build_statement(
    holder_name: &str,
    transactions: &[Transaction],
    config: &StatementConfig,
) -> Statement {
    let header = format!("{} {}", config.title_prefix, holder_name);
    let lines = transactions.iter().map(|t| format_line(t, config)).collect();
    let pages = paginate(header, lines, config.page_budget);
    tracing::debug!(
        lines = transactions.len(),
        pages = pages.len(),
        "statement laid out"
    );
    Statement { pages }
}

/// `"<timestamp> - <Kind> <currency><amount>"`.
pub fn format_line(transaction: &Transaction, config: &StatementConfig) -> String {
    let mut timestamp = String::new();
    if write!(timestamp, "{}", transaction.timestamp.format(&config.timestamp_format)).is_err() {
        // Only reachable with an unvalidated pattern.
        timestamp = transaction.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
    }
    format!(
        "{timestamp} - {} {}{}",
        transaction.kind, config.currency_prefix, transaction.amount
    )
}

/// Split `lines` into pages of at most `page_budget` lines.
///
/// The header goes on the first page. An empty statement is a single page with
/// just the header; a page is only started when a line needs it, so there is
/// never a trailing empty page.
pub fn paginate(header: String, lines: Vec<String>, page_budget: usize) -> Vec<StatementPage> {
    let budget = page_budget.max(1);
    let mut pages = vec![StatementPage {
        header: Some(header),
        lines: Vec::with_capacity(lines.len().min(budget)),
    }];
    let mut on_page = 0usize;

    for line in lines {
        if on_page == budget {
            pages.push(StatementPage {
                header: None,
                lines: Vec::with_capacity(budget),
            });
            on_page = 0;
        }
        if let Some(page) = pages.last_mut() {
            page.lines.push(line);
        }
        on_page += 1;
    }

    pages
}
