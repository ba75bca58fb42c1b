//! Turning free text and receipt images into expense drafts.
//!
//! The engine talks to the parsing service only through [`ExpenseExtractor`];
//! the HTTP client lives in the server crate. [`parse_quick_add`] is the local
//! fallback for text input when no service is configured.

use std::{fmt::Debug, future::Future, pin::Pin};

use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError, Money, ResultEngine, util::normalize_category};

/// What a parser recovered from the input. Nothing here is trusted: the
/// draft goes through the same validation as a manual expense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub amount: Money,
    pub description: String,
    pub category: Option<String>,
    /// Display name of whoever paid, matched against the group's members.
    pub payer_name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TextInput {
    pub text: String,
    pub user_name: String,
    pub currency: Currency,
    pub member_names: Vec<String>,
}

/// A receipt as uploaded by a member.
#[derive(Clone, Debug)]
pub struct ReceiptUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: Option<String>,
    pub caption: Option<String>,
}

/// What the parsing service receives for a receipt.
#[derive(Clone, Debug)]
pub struct ReceiptInput {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: Option<String>,
    pub caption: Option<String>,
    pub user_name: String,
    pub currency: Currency,
    pub member_names: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("parsing service unavailable: {0}")]
    Unavailable(String),
    #[error("parsing service failed: {0}")]
    Upstream(String),
    #[error("parsing service returned an unusable draft: {0}")]
    InvalidDraft(String),
}

pub type ExtractFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ExpenseDraft, ExtractError>> + Send + 'a>>;

pub trait ExpenseExtractor: Debug + Send + Sync {
    fn parse_text<'a>(&'a self, input: &'a TextInput) -> ExtractFuture<'a>;

    fn parse_receipt<'a>(&'a self, input: &'a ReceiptInput) -> ExtractFuture<'a>;
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a quick-add message into a draft.
///
/// Rules:
/// - the first token is the amount (`90`, `12.50`, `12,50`)
/// - optional `#tag` (max 1) => category
/// - optional `@name` (max 1) => payer
/// - everything else is the description
pub fn parse_quick_add(input: &str, currency: Currency) -> ResultEngine<ExpenseDraft> {
    let trimmed = collapse_whitespace(input.trim());
    if trimmed.is_empty() {
        return Err(EngineError::Validation("text_input is empty".to_string()));
    }

    let mut parts = trimmed.splitn(2, ' ');
    let amount_str = parts.next().unwrap_or_default();
    let tail = parts.next().unwrap_or("").trim();

    let amount = Money::parse_major(amount_str, currency).map_err(|_| {
        EngineError::Validation(format!(
            "cannot read an amount from '{amount_str}', start with e.g. '90 dinner'"
        ))
    })?;
    if !amount.is_positive() {
        return Err(EngineError::Validation("amount must be > 0".to_string()));
    }

    let mut tag: Option<String> = None;
    let mut payer: Option<String> = None;
    let mut words: Vec<&str> = Vec::new();
    for token in tail.split_whitespace() {
        if let Some(raw) = token.strip_prefix('#').filter(|raw| !raw.is_empty()) {
            if tag.is_some() {
                return Err(EngineError::Validation("too many tags: max 1".to_string()));
            }
            tag = Some(normalize_category(Some(raw)));
        } else if let Some(raw) = token.strip_prefix('@').filter(|raw| !raw.is_empty()) {
            if payer.is_some() {
                return Err(EngineError::Validation("too many payers: max 1".to_string()));
            }
            payer = Some(raw.to_string());
        } else {
            words.push(token);
        }
    }

    let description = words.join(" ");
    if description.is_empty() {
        return Err(EngineError::Validation(
            "add a description after the amount".to_string(),
        ));
    }

    Ok(ExpenseDraft {
        amount,
        description,
        category: tag,
        payer_name: payer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_then_description() {
        let draft = parse_quick_add("90 dinner at the beach", Currency::Inr).unwrap();
        assert_eq!(draft.amount.minor(), 9000);
        assert_eq!(draft.description, "dinner at the beach");
        assert_eq!(draft.category, None);
        assert_eq!(draft.payer_name, None);
    }

    #[test]
    fn tag_and_payer_can_be_anywhere() {
        let draft = parse_quick_add("12,50  #Food cab @Ravi home", Currency::Eur).unwrap();
        assert_eq!(draft.amount.minor(), 1250);
        assert_eq!(draft.category.as_deref(), Some("food"));
        assert_eq!(draft.payer_name.as_deref(), Some("Ravi"));
        assert_eq!(draft.description, "cab home");
    }

    #[test]
    fn rejects_bad_input() {
        for input in ["", "   ", "dinner 90", "0 nothing", "-5 refund", "90", "90 #a #b x"] {
            assert!(
                matches!(
                    parse_quick_add(input, Currency::Inr),
                    Err(EngineError::Validation(_))
                ),
                "{input}"
            );
        }
    }
}
