//! Domain-level failures shared across layers.

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("`{0}` is not a valid IANA timezone")]
    InvalidTimezone(String),
}

/// The canonical timezone parse. Config validation and server bootstrap
/// both go through here so they reject the same inputs with the same
/// error.
pub fn parse_timezone(value: &str) -> Result<chrono_tz::Tz, DomainError> {
    value.parse().map_err(|_| DomainError::InvalidTimezone(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{parse_timezone, DomainError};

    #[test]
    fn known_zone_parses() {
        assert_eq!(parse_timezone("Europe/Berlin"), Ok(chrono_tz::Europe::Berlin));
    }

    #[test]
    fn unknown_zone_is_named_in_the_error() {
        let err = parse_timezone("Mars/Olympus_Mons").expect_err("should fail");
        assert_eq!(err, DomainError::InvalidTimezone("Mars/Olympus_Mons".to_string()));
        assert!(err.to_string().contains("Mars/Olympus_Mons"));
    }
}
