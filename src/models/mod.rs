//! Database models and DTOs for all domain entities.

pub mod company;
pub mod entry;
pub mod form;
pub mod pagination;

use validator::ValidationError;

/// Rejects strings that are empty once surrounding whitespace is trimmed.
pub(crate) fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}
