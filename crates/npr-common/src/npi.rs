//! National Provider Identifier (NPI) check digit utilities
//!
//! An NPI is ten ASCII digits. The last digit is a Luhn check digit computed
//! over the card-issuer prefix `80840` followed by the first nine digits.
//!
//! Both [`is_valid_npi`] and [`generate_npi`] fail closed: malformed input is
//! reported as invalid (or `None`), never as a panic.

use crate::error::{NprError, Result};

/// Issuer prefix prepended to the nine base digits before the Luhn pass
pub const NPI_PREFIX: &str = "80840";

/// Total length of an NPI
pub const NPI_LENGTH: usize = 10;

/// Length of the base that the check digit is computed from
pub const NPI_BASE_LENGTH: usize = 9;

/// Compute the check digit for a nine digit base.
///
/// Returns `None` if `base` is not exactly nine ASCII digits.
pub fn check_digit(base: &str) -> Option<u8> {
    if base.len() != NPI_BASE_LENGTH || !base.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    // Walk prefix + base right to left, doubling the rightmost digit and every
    // second one after it.
    let sum: u32 = NPI_PREFIX
        .bytes()
        .chain(base.bytes())
        .rev()
        .enumerate()
        .map(|(index, byte)| {
            let digit = u32::from(byte - b'0');
            if index % 2 == 0 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();

    Some(((10 - sum % 10) % 10) as u8)
}

/// Check whether `npi` is a well formed identifier with a correct check digit
pub fn is_valid_npi(npi: &str) -> bool {
    if npi.len() != NPI_LENGTH || !npi.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let (base, check) = npi.split_at(NPI_BASE_LENGTH);
    match check_digit(base) {
        Some(expected) => check.as_bytes()[0] - b'0' == expected,
        None => false,
    }
}

/// Build a full NPI from a nine digit base by appending its check digit
pub fn generate_npi(base: &str) -> Option<String> {
    check_digit(base).map(|digit| format!("{}{}", base, digit))
}

/// Validate an NPI, returning a [`NprError::Validation`] that explains why it
/// was rejected
pub fn validate_npi(npi: &str) -> Result<()> {
    if npi.len() != NPI_LENGTH {
        return Err(NprError::validation(format!(
            "NPI '{}' must be {} digits, got {}",
            npi,
            NPI_LENGTH,
            npi.chars().count()
        )));
    }

    if !npi.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NprError::validation(format!(
            "NPI '{}' contains non-digit characters",
            npi
        )));
    }

    if !is_valid_npi(npi) {
        return Err(NprError::validation(format!("NPI '{}' fails the check digit", npi)));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_valid_npi() {
        assert!(is_valid_npi("1234567893"));
        assert_eq!(check_digit("123456789"), Some(3));
    }

    #[test]
    fn test_wrong_check_digit() {
        assert!(!is_valid_npi("1234567890"));
        assert!(!is_valid_npi("1234567894"));
    }

    #[test]
    fn test_malformed_inputs_are_invalid() {
        for input in ["", "123", "12345678931", "12345678a3", " 234567893", "１234567893"] {
            assert!(!is_valid_npi(input), "{:?} should be invalid", input);
        }
        assert_eq!(check_digit("12345678"), None);
        assert_eq!(check_digit("12345678x"), None);
        assert_eq!(generate_npi("abc"), None);
    }

    #[test]
    fn test_validate_npi_reasons() {
        let err = validate_npi("12345").unwrap_err();
        assert!(err.to_string().contains("must be 10 digits"));

        let err = validate_npi("12345678ab").unwrap_err();
        assert!(err.to_string().contains("non-digit"));

        let err = validate_npi("1234567890").unwrap_err();
        assert!(err.to_string().contains("check digit"));

        assert!(validate_npi("1234567893").is_ok());
    }

    proptest! {
        #[test]
        fn generated_npi_always_validates(base in "[0-9]{9}") {
            let npi = generate_npi(&base).unwrap();
            prop_assert_eq!(npi.len(), NPI_LENGTH);
            prop_assert!(npi.starts_with(&base));
            prop_assert!(is_valid_npi(&npi));
        }

        #[test]
        fn single_digit_change_is_detected(base in "[0-9]{9}", position in 0usize..10, bump in 1u8..10) {
            let npi = generate_npi(&base).unwrap();
            let mut bytes = npi.into_bytes();
            bytes[position] = b'0' + (bytes[position] - b'0' + bump) % 10;
            let mutated = String::from_utf8(bytes).unwrap();
            prop_assert!(!is_valid_npi(&mutated));
        }

        #[test]
        fn arbitrary_strings_never_panic(input in "\\PC{0,16}") {
            let _ = is_valid_npi(&input);
            let _ = validate_npi(&input);
        }
    }
}
