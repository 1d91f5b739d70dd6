//! Pre-flight parameter checks.
//!
//! Every builder runs these before it assembles a request, so a failed check
//! means nothing was sent.

use crate::encode::AccountIds;
use crate::error::ApiError;

pub fn require_id(name: &'static str, id: u64) -> Result<u64, ApiError> {
    if id == 0 {
        return Err(ApiError::MissingParameter { name });
    }
    Ok(id)
}

pub fn require_str<'a>(name: &'static str, value: &'a str) -> Result<&'a str, ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::MissingParameter { name });
    }
    Ok(value)
}

pub fn require_ids<'a>(
    name: &'static str,
    ids: &'a AccountIds,
) -> Result<&'a AccountIds, ApiError> {
    if ids.is_empty() {
        return Err(ApiError::MissingParameter { name });
    }
    Ok(ids)
}

/// Case-insensitive lookup of `value` in `allowed`, returning the index of
/// the match.
pub fn parse_choice(
    name: &'static str,
    value: &str,
    allowed: &'static [&'static str],
) -> Result<usize, ApiError> {
    let needle = value.trim();
    allowed
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(needle))
        .ok_or_else(|| ApiError::InvalidParameter {
            name,
            value: value.to_string(),
            allowed,
        })
}
