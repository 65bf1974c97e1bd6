//! Identity-number validation.
//!
//! Classifies an 11-digit national identity number as a valid fnr, a valid
//! dnr, or one of three invalid categories. Checks run in a fixed order and
//! the first failing check decides the reported reason:
//!
//! 1. format (exactly 11 ASCII digits)
//! 2. calendar date (day/month/two-digit year, dnr day offset by 40)
//! 3. the two control digits (weighted modulo 11)
//!
//! Everything in this module is pure and needs no synchronization.

pub mod tally;

pub use tally::IdentTally;

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

/// Number of digits in an identity number.
pub const IDENT_LENGTH: usize = 11;

/// Weights for the first control digit (position 9).
const FIRST_CONTROL_WEIGHTS: [u32; 9] = [3, 7, 6, 1, 8, 9, 4, 5, 2];

/// Weights for the second control digit (position 10).
const SECOND_CONTROL_WEIGHTS: [u32; 10] = [5, 4, 3, 2, 7, 6, 5, 4, 3, 2];

/// Offset added to the day of month in a dnr.
const DNR_DAY_OFFSET: u32 = 40;

/// Kind of a valid identity number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentKind {
    /// Primary national identity number.
    Fnr,
    /// Secondary (temporary) identity number.
    Dnr,
}

impl IdentKind {
    /// Lowercase label value used in metric series.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentKind::Fnr => "fnr",
            IdentKind::Dnr => "dnr",
        }
    }
}

impl fmt::Display for IdentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an identity number was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidReason {
    /// Not exactly 11 decimal digits.
    BadFormat,
    /// Day/month/year do not form a calendar date.
    BadDate,
    /// One of the two control digits does not match.
    BadControlDigits,
}

impl InvalidReason {
    /// Category label value, e.g. `invalid_date`.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::BadFormat => "format",
            InvalidReason::BadDate => "date",
            InvalidReason::BadControlDigits => "control",
        }
    }
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationResult {
    Valid { kind: IdentKind },
    Invalid { reason: InvalidReason },
}

impl ValidationResult {
    /// True for a well-formed fnr or dnr.
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid { .. })
    }
}

/// How the two-digit birth year is expanded to a full year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CenturyRule {
    /// Always `1900 + yy`.
    #[default]
    Flat1900,
    /// Century derived from the individual number (digits 7-9).
    IndividualNumber,
}

impl CenturyRule {
    /// Expand a two-digit year. `None` means no century applies.
    fn full_year(&self, two_digit_year: u32, individual_number: u32) -> Option<i32> {
        let yy = i32::try_from(two_digit_year).ok()?;
        match self {
            CenturyRule::Flat1900 => Some(1900 + yy),
            CenturyRule::IndividualNumber => match individual_number {
                0..=499 => Some(1900 + yy),
                500..=749 if two_digit_year >= 54 => Some(1800 + yy),
                500..=999 if two_digit_year <= 39 => Some(2000 + yy),
                900..=999 if two_digit_year >= 40 => Some(1900 + yy),
                _ => None,
            },
        }
    }
}

impl FromStr for CenturyRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(CenturyRule::Flat1900),
            "individual_number" => Ok(CenturyRule::IndividualNumber),
            other => Err(format!(
                "expected 'flat' or 'individual_number', got '{}'",
                other
            )),
        }
    }
}

/// Classify an identity number using the flat `1900 + yy` century rule.
pub fn classify(s: &str) -> ValidationResult {
    classify_with(s, CenturyRule::Flat1900)
}

/// Classify an identity number with an explicit century rule.
pub fn classify_with(s: &str, rule: CenturyRule) -> ValidationResult {
    let Some(digits) = parse_digits(s) else {
        return ValidationResult::Invalid {
            reason: InvalidReason::BadFormat,
        };
    };
    let [d0, d1, d2, d3, d4, d5, d6, d7, d8, d9, d10] = digits;

    let leading = d0 * 10 + d1;
    let (kind, day) = if d0 > 3 {
        (IdentKind::Dnr, leading - DNR_DAY_OFFSET)
    } else {
        (IdentKind::Fnr, leading)
    };
    let month = d2 * 10 + d3;
    let two_digit_year = d4 * 10 + d5;
    let individual_number = d6 * 100 + d7 * 10 + d8;

    let date = rule
        .full_year(two_digit_year, individual_number)
        .and_then(|year| NaiveDate::from_ymd_opt(year, month, day));
    if date.is_none() {
        return ValidationResult::Invalid {
            reason: InvalidReason::BadDate,
        };
    }

    // An expected value of 10 can never match a single digit.
    if expected_control(&FIRST_CONTROL_WEIGHTS, &digits) != d9 {
        return ValidationResult::Invalid {
            reason: InvalidReason::BadControlDigits,
        };
    }
    if expected_control(&SECOND_CONTROL_WEIGHTS, &digits) != d10 {
        return ValidationResult::Invalid {
            reason: InvalidReason::BadControlDigits,
        };
    }

    ValidationResult::Valid { kind }
}

fn parse_digits(s: &str) -> Option<[u32; IDENT_LENGTH]> {
    if s.len() != IDENT_LENGTH || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut digits = [0u32; IDENT_LENGTH];
    for (slot, byte) in digits.iter_mut().zip(s.bytes()) {
        *slot = u32::from(byte - b'0');
    }
    Some(digits)
}

/// Weighted modulo-11 control digit over the leading digits.
fn expected_control(weights: &[u32], digits: &[u32]) -> u32 {
    let sum: u32 = weights.iter().zip(digits).map(|(w, d)| w * d).sum();
    match sum % 11 {
        0 => 0,
        remainder => 11 - remainder,
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    const VALID_FNR: &str = "15058510170";
    const VALID_DNR: &str = "55058510164";

    fn invalid(reason: InvalidReason) -> ValidationResult {
        ValidationResult::Invalid { reason }
    }

    #[test]
    fn test_known_bad_inputs() {
        assert_eq!(classify("01234567891"), invalid(InvalidReason::BadDate));
        assert_eq!(classify("2222"), invalid(InvalidReason::BadFormat));
        assert_eq!(classify("01012000a1"), invalid(InvalidReason::BadFormat));
        assert_eq!(
            classify("010120002398573984753241"),
            invalid(InvalidReason::BadFormat)
        );
    }

    #[test]
    fn test_format_failures() {
        for input in [
            "",
            "1505851017",
            "150585101700",
            "1505851017a",
            " 5058510170",
            "15058510170 ",
            "-5058510170",
            "١٥٠٥٨٥١٠١٧٠",
        ] {
            assert_eq!(
                classify(input),
                invalid(InvalidReason::BadFormat),
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_valid_fnr() {
        assert_eq!(
            classify(VALID_FNR),
            ValidationResult::Valid {
                kind: IdentKind::Fnr
            }
        );
    }

    #[test]
    fn test_valid_dnr_is_fnr_day_plus_forty() {
        assert_eq!(
            classify(VALID_DNR),
            ValidationResult::Valid {
                kind: IdentKind::Dnr
            }
        );
    }

    #[test]
    fn test_flipping_last_digit_breaks_control_only() {
        for last in ['1', '5', '9'] {
            let mut number = VALID_FNR[..10].to_string();
            number.push(last);
            assert_eq!(
                classify(&number),
                invalid(InvalidReason::BadControlDigits),
                "number {}",
                number
            );
        }
    }

    #[test]
    fn test_first_control_digit_mismatch() {
        assert_eq!(
            classify("15058510180"),
            invalid(InvalidReason::BadControlDigits)
        );
    }

    #[test]
    fn test_remainder_one_always_fails_control() {
        // Weighted sum of "010190108" leaves remainder 1, so the expected
        // first control digit is 10.
        for suffix in ["00", "10", "01", "99"] {
            let number = format!("010190108{}", suffix);
            assert_eq!(
                classify(&number),
                invalid(InvalidReason::BadControlDigits),
                "number {}",
                number
            );
        }
    }

    #[test]
    fn test_date_checked_before_control_digits() {
        // Day 32 and month 13, both with garbage control digits.
        assert_eq!(classify("32019010800"), invalid(InvalidReason::BadDate));
        assert_eq!(classify("01139010800"), invalid(InvalidReason::BadDate));
        // Day 00.
        assert_eq!(classify("00019010800"), invalid(InvalidReason::BadDate));
        // Dnr with true day 00 (leading 40).
        assert_eq!(classify("40019010800"), invalid(InvalidReason::BadDate));
    }

    #[test]
    fn test_leap_years_under_flat_rule() {
        assert!(classify("29029614502").is_valid());
        assert_eq!(classify("29029712350"), invalid(InvalidReason::BadDate));
        // 1900 is not a leap year.
        assert_eq!(classify("29020053478"), invalid(InvalidReason::BadDate));
    }

    #[test]
    fn test_individual_number_rule_infers_2000s() {
        // id 534 with yy 00 is born 2000, which is a leap year.
        assert_eq!(
            classify_with("29020053478", CenturyRule::IndividualNumber),
            ValidationResult::Valid {
                kind: IdentKind::Fnr
            }
        );
    }

    #[test]
    fn test_individual_number_rule_gaps_are_bad_dates() {
        // id 800 with yy 60 has no century.
        assert!(classify("01016080000").is_valid());
        assert_eq!(
            classify_with("01016080000", CenturyRule::IndividualNumber),
            invalid(InvalidReason::BadDate)
        );
        // id 500 with yy 60 is the 1800s.
        assert!(classify_with("01016050012", CenturyRule::IndividualNumber).is_valid());
    }

    #[test]
    fn test_individual_number_rule_agrees_below_500() {
        assert_eq!(
            classify_with(VALID_FNR, CenturyRule::IndividualNumber),
            classify(VALID_FNR)
        );
    }

    #[test]
    fn test_century_rule_from_str() {
        assert_eq!("flat".parse::<CenturyRule>(), Ok(CenturyRule::Flat1900));
        assert_eq!(
            "individual_number".parse::<CenturyRule>(),
            Ok(CenturyRule::IndividualNumber)
        );
        assert!("sql".parse::<CenturyRule>().is_err());
        assert_eq!(CenturyRule::default(), CenturyRule::Flat1900);
    }

    #[test]
    fn test_label_strings() {
        assert_eq!(IdentKind::Fnr.to_string(), "fnr");
        assert_eq!(IdentKind::Dnr.as_str(), "dnr");
        assert_eq!(InvalidReason::BadFormat.as_str(), "format");
        assert_eq!(InvalidReason::BadDate.as_str(), "date");
        assert_eq!(InvalidReason::BadControlDigits.as_str(), "control");
    }
}
