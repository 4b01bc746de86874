//! Statement rendering: an account's transaction history as a paginated PDF.
//!
//! Layout ([`statement`]) is pure and independent of the encoding ([`pdf`]);
//! [`StatementRenderer`] wires both to the ledger's read side.

pub mod config;
pub mod pdf;
pub mod renderer;
pub mod statement;

pub use config::{ConfigError, StatementConfig};
pub use pdf::{CONTENT_TYPE, EncodeError, PageLayout, encode_pdf};
pub use renderer::{StatementError, StatementRenderer};
pub use statement::{Statement, StatementPage, build_statement, paginate};
