//! Counting classification outcomes.

use super::{classify_with, CenturyRule, IdentKind, InvalidReason, ValidationResult};

/// Per-category counts of classified identity numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentTally {
    pub valid_fnr: u64,
    pub valid_dnr: u64,
    pub invalid_format: u64,
    pub invalid_date: u64,
    pub invalid_control: u64,
}

impl IdentTally {
    /// Classify every input with `rule` and count the outcomes.
    pub fn from_idents<'a, I>(idents: I, rule: CenturyRule) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tally = Self::default();
        for ident in idents {
            tally.record(classify_with(ident, rule));
        }
        tally
    }

    pub fn record(&mut self, result: ValidationResult) {
        let slot = match result {
            ValidationResult::Valid {
                kind: IdentKind::Fnr,
            } => &mut self.valid_fnr,
            ValidationResult::Valid {
                kind: IdentKind::Dnr,
            } => &mut self.valid_dnr,
            ValidationResult::Invalid {
                reason: InvalidReason::BadFormat,
            } => &mut self.invalid_format,
            ValidationResult::Invalid {
                reason: InvalidReason::BadDate,
            } => &mut self.invalid_date,
            ValidationResult::Invalid {
                reason: InvalidReason::BadControlDigits,
            } => &mut self.invalid_control,
        };
        *slot += 1;
    }

    pub fn total(&self) -> u64 {
        self.valid_fnr
            + self.valid_dnr
            + self.invalid_format
            + self.invalid_date
            + self.invalid_control
    }

    /// `(category, count)` pairs in a fixed order, used as metric labels.
    pub fn categories(&self) -> [(&'static str, u64); 5] {
        [
            ("valid_fnr", self.valid_fnr),
            ("valid_dnr", self.valid_dnr),
            ("invalid_format", self.invalid_format),
            ("invalid_date", self.invalid_date),
            ("invalid_control", self.invalid_control),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_counts_each_category() {
        let idents = [
            "15058510170", // fnr
            "55058510164", // dnr
            "2222",        // format
            "01234567891", // date
            "15058510171", // control
            "15058510170", // fnr again
        ];
        let tally = IdentTally::from_idents(idents, CenturyRule::Flat1900);

        assert_eq!(
            tally,
            IdentTally {
                valid_fnr: 2,
                valid_dnr: 1,
                invalid_format: 1,
                invalid_date: 1,
                invalid_control: 1,
            }
        );
        assert_eq!(tally.total(), 6);
    }

    #[test]
    fn test_tally_respects_century_rule() {
        let idents = ["29020053478"];
        let flat = IdentTally::from_idents(idents, CenturyRule::Flat1900);
        let by_individual = IdentTally::from_idents(idents, CenturyRule::IndividualNumber);

        assert_eq!(flat.invalid_date, 1);
        assert_eq!(by_individual.valid_fnr, 1);
    }

    #[test]
    fn test_categories_order_is_stable() {
        let names: Vec<&str> = IdentTally::default()
            .categories()
            .iter()
            .map(|(name, _)| *name)
            .collect();
        assert_eq!(
            names,
            vec![
                "valid_fnr",
                "valid_dnr",
                "invalid_format",
                "invalid_date",
                "invalid_control"
            ]
        );
    }
}
