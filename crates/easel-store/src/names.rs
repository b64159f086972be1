//! Slot name validation.
//!
//! Valid slot names:
//! - Must be non-empty
//! - Consist of `/`-separated segments
//! - Segments are non-empty, use only `[A-Za-z0-9._-]`, and do not start
//!   with `.`
//!
//! The rules keep every name usable as a relative file path.

use crate::error::{StoreError, StoreResult};

fn invalid(name: &str, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidSlotName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a slot name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use easel_store::names::validate_slot_name;
///
/// assert!(validate_slot_name("catalog/index").is_ok());
/// assert!(validate_slot_name("shadow/0190f3a2-7c1e").is_ok());
/// assert!(validate_slot_name("").is_err());
/// assert!(validate_slot_name("../escape").is_err());
/// ```
pub fn validate_slot_name(name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "slot name must not be empty"));
    }

    for segment in name.split('/') {
        if segment.is_empty() {
            return Err(invalid(name, "segments must not be empty"));
        }
        if segment.starts_with('.') {
            return Err(invalid(
                name,
                format!("segment must not start with '.': {segment:?}"),
            ));
        }
        if let Some(ch) = segment
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
        }
    }

    Ok(())
}
