//! Shared-expense ledger engine.
//!
//! Pure domain types (`Money`, `Expense`, `Ledger`, `Group`, balances) plus
//! the `Engine` directory that loads and persists groups through sea-orm.

pub use analysis::{GroupAnalysis, GroupDetail, GroupSummary, MemberBalance};
pub use balances::{Balance, Settlement, SplitPolicy, compute_balances, settle};
pub use cache::AnalysisCache;
pub use commands::{ExpenseCmd, GroupCmd, GroupUpdate, SplitSpec};
pub use currency::Currency;
pub use error::EngineError;
pub use expenses::{ApprovalStatus, Expense, ExpenseId, ExpenseSource, ExpenseStatus, Participant};
pub use export::expenses_to_csv;
pub use extract::{
    ExpenseDraft, ExpenseExtractor, ExtractError, ExtractFuture, ReceiptInput, ReceiptUpload, TextInput,
    parse_quick_add,
};
pub use groups::{Group, GroupKind, NewGroup};
pub use ledger::{ExpenseFilter, Ledger, LedgerCursor};
pub use locks::GroupLocks;
pub use members::Member;
pub use money::{Locale, Money};
pub use ops::{Engine, EngineBuilder, EngineConfig, ExpensePage};
pub use users::{User, UserId};

mod analysis;
mod balances;
mod cache;
mod commands;
mod currency;
mod error;
mod expenses;
mod export;
mod extract;
mod groups;
mod ledger;
mod locks;
mod members;
mod money;
mod ops;
mod participants;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
