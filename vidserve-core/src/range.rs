//! HTTP Range header parsing and validation.
//!
//! Only the single-range form `bytes=<start>-<end>` is accepted, with
//! either bound optional. Anything else, including multi-range lists,
//! is rejected as malformed rather than partially honored.

use std::fmt;

use axum::http::{HeaderMap, header};

/// Inclusive byte range `[start, end]` into a file of known size.
///
/// Always satisfies `start <= end < size` for the size it was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Range covering a whole file, or None for an empty file.
    pub fn full(size: u64) -> Option<Self> {
        size.checked_sub(1).map(|end| Self { start: 0, end })
    }

    /// Number of bytes covered by the range.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` header of a 206 response.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Range bounds exactly as the client sent them, before defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl RangeSpec {
    /// Parses a `Range` header value.
    ///
    /// The `bytes=` unit is matched case-insensitively and surrounding
    /// whitespace is ignored, mirroring what common players send.
    ///
    /// # Errors
    ///
    /// - `RangeError::Malformed` - Missing `bytes=`, not exactly one `-`, non-numeric bound, or both bounds empty
    pub fn parse(header: &str) -> Result<Self, RangeError> {
        let malformed = || RangeError::Malformed {
            header: header.to_string(),
        };

        let value = header.trim();
        let spec = value
            .get(..6)
            .filter(|unit| unit.eq_ignore_ascii_case("bytes="))
            .map(|_| &value[6..])
            .ok_or_else(malformed)?;

        let mut parts = spec.split('-');
        let (Some(start), Some(end), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(malformed());
        };

        let start = parse_bound(start).ok_or_else(malformed)?;
        let end = parse_bound(end).ok_or_else(malformed)?;
        if start.is_none() && end.is_none() {
            return Err(malformed());
        }

        Ok(Self { start, end })
    }

    /// Applies defaults and validates the range against a file size.
    ///
    /// A missing start means 0 and a missing end means the last byte.
    /// With the start omitted, an end of exactly `size` is read as the
    /// last byte so `bytes=-<size>` selects the whole file. Otherwise
    /// `start > end` or `end >= size` is unsatisfiable.
    ///
    /// # Errors
    ///
    /// - `RangeError::NotSatisfiable` - Range falls outside the file
    pub fn resolve(self, size: u64) -> Result<ByteRange, RangeError> {
        let not_satisfiable = || RangeError::NotSatisfiable {
            spec: self.to_string(),
            size,
        };

        let last = size.checked_sub(1).ok_or_else(not_satisfiable)?;
        let start = self.start.unwrap_or(0);
        let end = match (self.start, self.end) {
            (_, None) => last,
            (None, Some(end)) if end == size => last,
            (_, Some(end)) => end,
        };

        if start > end || end >= size {
            return Err(not_satisfiable());
        }

        Ok(ByteRange { start, end })
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(start) = self.start {
            write!(f, "{start}")?;
        }
        f.write_str("-")?;
        if let Some(end) = self.end {
            write!(f, "{end}")?;
        }
        Ok(())
    }
}

/// Parses an optional decimal bound; `Some(None)` for an empty bound.
fn parse_bound(raw: &str) -> Option<Option<u64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(None);
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok().map(Some)
}

/// Parses a `Range` header value and resolves it against `size` in one step.
///
/// # Examples
/// ```
/// use vidserve_core::range::parse_range_header;
/// let range = parse_range_header("bytes=100-199", 1000).unwrap();
/// assert_eq!((range.start, range.end, range.len()), (100, 199, 100));
/// ```
///
/// # Errors
///
/// - `RangeError::Malformed` - Header could not be parsed
/// - `RangeError::NotSatisfiable` - Range falls outside the file
pub fn parse_range_header(header: &str, size: u64) -> Result<ByteRange, RangeError> {
    RangeSpec::parse(header)?.resolve(size)
}

/// Extracts the `Range` header, if present.
///
/// # Errors
///
/// - `RangeError::Malformed` - Header value is not valid visible ASCII
pub fn extract_range_header(headers: &HeaderMap) -> Result<Option<&str>, RangeError> {
    headers
        .get(header::RANGE)
        .map(|value| {
            value.to_str().map_err(|_| RangeError::Malformed {
                header: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            })
        })
        .transpose()
}

/// Errors produced while interpreting a `Range` header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("Invalid Range header: {header:?}")]
    Malformed { header: String },

    #[error("Requested range {spec} not satisfiable for {size} bytes")]
    NotSatisfiable { spec: String, size: u64 },
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_parse_range_header_valid() {
        let range = parse_range_header("bytes=100-199", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 100, end: 199 });
        assert_eq!(range.len(), 100);
        assert_eq!(range.content_range(1000), "bytes 100-199/1000");
    }

    #[test]
    fn test_parse_range_header_open_end() {
        let range = parse_range_header("bytes=500-", 1000).unwrap();
        assert_eq!((range.start, range.end, range.len()), (500, 999, 500));
    }

    #[test]
    fn test_single_byte_boundaries() {
        assert_eq!(parse_range_header("bytes=0-0", 1000).unwrap().len(), 1);

        let last = parse_range_header("bytes=999-", 1000).unwrap();
        assert_eq!((last.start, last.end, last.len()), (999, 999, 1));
    }

    #[test]
    fn test_omitted_start() {
        let range = parse_range_header("bytes=-199", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 199 });

        let whole = parse_range_header("bytes=-1000", 1000).unwrap();
        assert_eq!(Some(whole), ByteRange::full(1000));
    }

    #[test]
    fn test_omitted_start_past_size_is_not_satisfiable() {
        for header in ["bytes=-1001", "bytes=-5000"] {
            assert!(
                matches!(
                    parse_range_header(header, 1000),
                    Err(RangeError::NotSatisfiable { size: 1000, .. })
                ),
                "{header} should be unsatisfiable"
            );
        }
    }

    #[test]
    fn test_end_at_or_past_size_is_not_satisfiable() {
        for header in ["bytes=1000-1050", "bytes=0-1000", "bytes=1000-", "bytes=5000-"] {
            assert!(
                matches!(
                    parse_range_header(header, 1000),
                    Err(RangeError::NotSatisfiable { size: 1000, .. })
                ),
                "{header} should be unsatisfiable"
            );
        }
    }

    #[test]
    fn test_start_after_end_is_not_satisfiable() {
        let err = parse_range_header("bytes=200-100", 1000).unwrap_err();
        assert_eq!(
            err,
            RangeError::NotSatisfiable {
                spec: "200-100".to_string(),
                size: 1000
            }
        );
    }

    #[test]
    fn test_empty_file_has_no_satisfiable_range() {
        assert!(ByteRange::full(0).is_none());
        for header in ["bytes=0-0", "bytes=0-", "bytes=-0"] {
            assert!(matches!(
                parse_range_header(header, 0),
                Err(RangeError::NotSatisfiable { .. })
            ));
        }
    }

    #[test]
    fn test_malformed_headers() {
        for header in [
            "bytes=abc-xyz",
            "bytes=10",
            "bytes=-",
            "bytes=0-10,20-30",
            "bytes=1-2-3",
            "items=0-10",
            "0-10",
            "bytes=+5-10",
            "bytes=0x10-20",
            "bytes=99999999999999999999999-",
            "",
        ] {
            assert!(
                matches!(RangeSpec::parse(header), Err(RangeError::Malformed { .. })),
                "{header:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_tolerates_case_and_whitespace() {
        let spec = RangeSpec::parse("  Bytes= 10 - 20 ").unwrap();
        assert_eq!(
            spec,
            RangeSpec {
                start: Some(10),
                end: Some(20)
            }
        );
    }

    #[test]
    fn test_extract_range_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_range_header(&headers), Ok(None));

        headers.insert(header::RANGE, HeaderValue::from_static("bytes=0-1"));
        assert_eq!(extract_range_header(&headers), Ok(Some("bytes=0-1")));

        headers.insert(header::RANGE, HeaderValue::from_bytes(b"bytes=\xff-1").unwrap());
        assert!(matches!(
            extract_range_header(&headers),
            Err(RangeError::Malformed { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_valid_ranges_resolve_exactly(size in 1u64..1_000_000, a in any::<u64>(), b in any::<u64>()) {
            let (x, y) = (a % size, b % size);
            let (start, end) = (x.min(y), x.max(y));

            let range = parse_range_header(&format!("bytes={start}-{end}"), size).unwrap();
            prop_assert_eq!(range, ByteRange { start, end });
            prop_assert_eq!(range.len(), end - start + 1);
        }

        #[test]
        fn prop_end_beyond_file_is_rejected(size in 0u64..1_000_000, start in 0u64..1_000, overshoot in 0u64..1_000) {
            let end = size + overshoot;
            let result = parse_range_header(&format!("bytes={start}-{end}"), size);
            let is_not_satisfiable = matches!(result, Err(RangeError::NotSatisfiable { .. }));
            prop_assert!(is_not_satisfiable);
        }

        #[test]
        fn prop_open_end_reaches_last_byte(size in 1u64..1_000_000, a in any::<u64>()) {
            let start = a % size;
            let range = parse_range_header(&format!("bytes={start}-"), size).unwrap();
            prop_assert_eq!(range.end, size - 1);
        }
    }
}
