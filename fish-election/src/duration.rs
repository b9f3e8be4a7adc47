//! Parsing for the small duration-string grammar used by `Resources::lifetime`
//! and `Settings::default_resource_lifetime` (§6.5): an integer followed by
//! one of `s`, `m`, `h`, `d`. Empty string means "unset".

use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid duration string {0:?}")]
pub struct DurationParseError(pub String);

/// `None` for an empty/unset string, `Some(duration)` otherwise. A duration of
/// zero is valid input and distinct from "unset" — callers that treat
/// non-positive as "no deadline" check `Duration::is_zero()` themselves.
pub fn parse_lifetime(s: &str) -> Result<Option<Duration>, DurationParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    let (digits, suffix) = s.split_at(s.len() - 1);
    let scale = match suffix {
        "s" => 1u64,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(DurationParseError(s.to_string())),
    };
    let count: u64 = digits
        .parse()
        .map_err(|_| DurationParseError(s.to_string()))?;
    Ok(Some(Duration::from_secs(count.saturating_mul(scale))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_unset() {
        assert_eq!(parse_lifetime("").unwrap(), None);
        assert_eq!(parse_lifetime("   ").unwrap(), None);
    }

    #[test]
    fn parses_each_suffix() {
        assert_eq!(parse_lifetime("2s").unwrap(), Some(Duration::from_secs(2)));
        assert_eq!(
            parse_lifetime("30m").unwrap(),
            Some(Duration::from_secs(30 * 60))
        );
        assert_eq!(
            parse_lifetime("2h").unwrap(),
            Some(Duration::from_secs(2 * 60 * 60))
        );
        assert_eq!(
            parse_lifetime("1d").unwrap(),
            Some(Duration::from_secs(24 * 60 * 60))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_lifetime("five seconds").is_err());
        assert!(parse_lifetime("10").is_err());
    }
}
