//! Pure checks used by the racing coordinator.

/// Returns `true` for any 2xx status code.
///
/// # Examples
///
/// ```
/// use dbgfetch_fetch::core::is_success;
///
/// assert!(is_success(200));
/// assert!(is_success(206));
/// assert!(!is_success(304));
/// assert!(!is_success(404));
/// ```
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Returns `true` when `size` is over the optional `limit`.
///
/// # Examples
///
/// ```
/// use dbgfetch_fetch::core::exceeds_limit;
///
/// assert!(!exceeds_limit(None, u64::MAX));
/// assert!(!exceeds_limit(Some(1024), 1024));
/// assert!(exceeds_limit(Some(1024), 1025));
/// ```
pub fn exceeds_limit(limit: Option<u64>, size: u64) -> bool {
    limit.is_some_and(|limit| size > limit)
}
