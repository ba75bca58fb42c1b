//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use unicode_normalization::UnicodeNormalization;

use crate::{Currency, EngineError, ResultEngine};

pub(crate) const MAX_NAME_LEN: usize = 80;
pub(crate) const MAX_DESCRIPTION_LEN: usize = 280;

/// Trim and validate a required display name.
pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!(
            "{label} name must not be empty"
        )));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(EngineError::Validation(format!(
            "{label} name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

pub(crate) fn normalize_description(value: &str) -> ResultEngine<String> {
    let trimmed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if trimmed.is_empty() {
        return Err(EngineError::InvalidExpense(
            "description must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(EngineError::InvalidExpense(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(trimmed)
}

/// Canonical category key: NFKC, lowercase, inner whitespace collapsed.
///
/// Missing or blank categories fall back to `general`.
pub(crate) fn normalize_category(value: Option<&str>) -> String {
    let normalized: String = value.unwrap_or_default().nfkc().collect::<String>();
    let collapsed = normalized
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let collapsed = collapsed.trim_start_matches('#').to_string();
    if collapsed.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        collapsed
    }
}

pub(crate) const DEFAULT_CATEGORY: &str = "general";

/// Loose comparison key for matching display names typed by humans or
/// returned by a parser.
pub(crate) fn name_key(value: &str) -> String {
    value
        .nfkc()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse a currency code stored in the DB into a strongly typed `Currency`.
pub(crate) fn model_currency(value: &str) -> ResultEngine<Currency> {
    Currency::try_from(value)
        .map_err(|_| EngineError::CorruptLedger(format!("invalid stored currency: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_canonicalized() {
        assert_eq!(normalize_category(Some("  Food ")), "food");
        assert_eq!(normalize_category(Some("#Travel   Plans")), "travel plans");
        assert_eq!(normalize_category(Some("ＦＯＯＤ")), "food");
        assert_eq!(normalize_category(None), "general");
        assert_eq!(normalize_category(Some("   ")), "general");
    }

    #[test]
    fn names_are_trimmed_and_required() {
        assert_eq!(normalize_required_name("  Goa trip ", "group").unwrap(), "Goa trip");
        assert!(normalize_required_name("   ", "group").is_err());
        assert!(normalize_required_name(&"x".repeat(81), "group").is_err());
    }

    #[test]
    fn name_keys_ignore_case_and_spacing() {
        assert_eq!(name_key(" John   Doe"), name_key("john doe"));
    }
}
