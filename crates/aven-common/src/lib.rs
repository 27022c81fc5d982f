// Aven common -- shared types for every compiler crate.

pub mod issue;
pub mod span;
pub mod token;

pub use issue::{Issue, IssueList, Severity};
pub use span::{LineIndex, Span};
pub use token::{keyword_from_str, Token, TokenKind};
