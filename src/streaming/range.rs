//! HTTP Range header resolution.
//!
//! Resolves a single-range header against a known resource length into a
//! closed byte interval. Out-of-bounds ranges are rejected, never clamped;
//! the caller answers rejection with 416 and the true total length.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    /// Wrong prefix, wrong part count, non-numeric parts, or a
    /// multi-range request (comma-separated ranges are unsupported).
    #[error("malformed range header")]
    Malformed,
    /// Syntactically valid but outside `[0, total)`.
    #[error("range out of bounds")]
    OutOfBounds,
}

/// Resolve a Range header value against a resource of `total` bytes.
///
/// An empty header value resolves to the full range `(0, total - 1)`.
/// Supported forms:
/// - `bytes=start-end`
/// - `bytes=start-`
/// - `bytes=-suffix` (last `suffix` bytes)
pub fn resolve_range(header: &str, total: u64) -> Result<(u64, u64), RangeError> {
    if total == 0 {
        return Err(RangeError::OutOfBounds);
    }

    if header.is_empty() {
        return Ok((0, total - 1));
    }

    let raw = header.strip_prefix("bytes=").ok_or(RangeError::Malformed)?;

    if raw.contains(',') {
        return Err(RangeError::Malformed);
    }

    let parts: Vec<&str> = raw.split('-').collect();
    if parts.len() != 2 {
        return Err(RangeError::Malformed);
    }

    let start_part = parts[0].trim();
    let end_part = parts[1].trim();

    match (start_part.is_empty(), end_part.is_empty()) {
        // bytes=-500: the last 500 bytes
        (true, false) => {
            let suffix: u64 = end_part.parse().map_err(|_| RangeError::Malformed)?;
            if suffix == 0 || suffix > total {
                return Err(RangeError::OutOfBounds);
            }
            Ok((total - suffix, total - 1))
        }
        // bytes=500-: from 500 to the end
        (false, true) => {
            let start: u64 = start_part.parse().map_err(|_| RangeError::Malformed)?;
            if start >= total {
                return Err(RangeError::OutOfBounds);
            }
            Ok((start, total - 1))
        }
        // bytes=0-499
        (false, false) => {
            let start: u64 = start_part.parse().map_err(|_| RangeError::Malformed)?;
            let end: u64 = end_part.parse().map_err(|_| RangeError::Malformed)?;
            if start >= total || end >= total || end < start {
                return Err(RangeError::OutOfBounds);
            }
            Ok((start, end))
        }
        // bytes=-
        (true, true) => Err(RangeError::Malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_range() {
        assert_eq!(resolve_range("bytes=0-499", 1000), Ok((0, 499)));
        assert_eq!(resolve_range("bytes=500-999", 1000), Ok((500, 999)));
        assert_eq!(resolve_range("bytes=7-7", 1000), Ok((7, 7)));
    }

    #[test]
    fn test_open_ended_range() {
        assert_eq!(resolve_range("bytes=500-", 1000), Ok((500, 999)));
        assert_eq!(resolve_range("bytes=0-", 1000), Ok((0, 999)));
        assert_eq!(
            resolve_range("bytes=1000-", 1000),
            Err(RangeError::OutOfBounds)
        );
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(resolve_range("bytes=-200", 1000), Ok((800, 999)));
        assert_eq!(resolve_range("bytes=-1000", 1000), Ok((0, 999)));
        assert_eq!(
            resolve_range("bytes=-1001", 1000),
            Err(RangeError::OutOfBounds)
        );
        assert_eq!(resolve_range("bytes=-0", 1000), Err(RangeError::OutOfBounds));
    }

    #[test]
    fn test_empty_header_is_full_range() {
        assert_eq!(resolve_range("", 1000), Ok((0, 999)));
        assert_eq!(resolve_range("", 1), Ok((0, 0)));
    }

    #[test]
    fn test_out_of_bounds_is_rejected_not_clamped() {
        assert_eq!(
            resolve_range("bytes=0-2000", 1000),
            Err(RangeError::OutOfBounds)
        );
        assert_eq!(
            resolve_range("bytes=40-50", 32),
            Err(RangeError::OutOfBounds)
        );
        assert_eq!(
            resolve_range("bytes=900-100", 1000),
            Err(RangeError::OutOfBounds)
        );
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(resolve_range("bytes=-", 1000), Err(RangeError::Malformed));
        assert_eq!(
            resolve_range("bytes=abc-def", 1000),
            Err(RangeError::Malformed)
        );
        assert_eq!(resolve_range("0-499", 1000), Err(RangeError::Malformed));
        assert_eq!(
            resolve_range("items=0-499", 1000),
            Err(RangeError::Malformed)
        );
        assert_eq!(
            resolve_range("bytes=0-1-2", 1000),
            Err(RangeError::Malformed)
        );
    }

    #[test]
    fn test_multi_range_is_rejected() {
        assert_eq!(
            resolve_range("bytes=0-5,10-20", 1000),
            Err(RangeError::Malformed)
        );
    }

    #[test]
    fn test_empty_resource_rejects_everything() {
        assert_eq!(resolve_range("bytes=0-0", 0), Err(RangeError::OutOfBounds));
        assert_eq!(resolve_range("bytes=-1", 0), Err(RangeError::OutOfBounds));
    }
}
