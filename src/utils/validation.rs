//! Input validation primitives.
//!
//! Ergonomic helpers for the common boundary checks: non-blank strings and
//! string ids that must parse to the numeric ids the pipeline service uses
//! internally.

use crate::error::{Error, Result};

/// Require a string to be non-empty after trimming.
///
/// Returns a reference to the trimmed string on success.
pub fn require_non_empty<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::validation_invalid_argument(
            field,
            "parameter cannot be empty or whitespace",
        ))
    } else {
        Ok(trimmed)
    }
}

/// Parse an opaque string id into the numeric id used on the wire.
///
/// Ids are strings at the public boundary; anything non-numeric is a contract
/// violation, not a lookup miss.
pub fn require_numeric_id(value: &str, field: &str) -> Result<i32> {
    let trimmed = require_non_empty(value, field)?;
    trimmed.parse::<i32>().map_err(|_| {
        Error::validation_invalid_argument(
            field,
            format!("'{}' is not a numeric id", trimmed),
        )
    })
}
