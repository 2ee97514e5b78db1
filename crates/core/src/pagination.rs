//! Limit/offset clamping shared by every list operation.

use serde::Deserialize;

/// Default page size for list operations.
pub const DEFAULT_LIMIT: i64 = 50;

/// Maximum page size for list operations.
pub const MAX_LIMIT: i64 = 100;

/// Clamp a user-provided limit to `[1, max]`, falling back to `default`.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

/// Clamp a user-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// Generic pagination parameters (`?limit=&offset=`).
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A clamped page window handed to the store layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: clamp_limit(Some(limit), DEFAULT_LIMIT, MAX_LIMIT),
            offset: clamp_offset(Some(offset)),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, 0)
    }
}

impl From<&PaginationParams> for Page {
    fn from(params: &PaginationParams) -> Self {
        Self {
            limit: clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT),
            offset: clamp_offset(params.offset),
        }
    }
}
