//! Internal helpers for input validation and normalization.
//!
//! These utilities are **not** part of the public API.

use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Trim a required name and reject it when empty.
pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidName(format!(
            "{label} name must not be empty"
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

/// Comparison key for names that must be unique per owner: NFKC, lowercase,
/// inner whitespace collapsed.
pub(crate) fn name_key(value: &str) -> String {
    let composed: String = value.nfkc().collect();
    composed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse a UUID and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidId(format!("invalid {label} id")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_key_folds_case_width_and_spaces() {
        assert_eq!(name_key("  Food   &  Drink "), "food & drink");
        assert_eq!(name_key("ＦＯＯＤ"), "food");
    }

    #[test]
    fn required_name_rejects_blank() {
        assert!(normalize_required_name("   ", "category").is_err());
        assert_eq!(normalize_required_name(" Fun ", "category").unwrap(), "Fun");
    }
}
