//! Extraction result: one ordered value per declared field.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::extraction::rules::patterns::{BILLING_PERIOD, CUPS, INVOICE_TOTAL, VAT_AMOUNT};

/// Value stored for a field that could not be located.
pub const NOT_FOUND: &str = "-";

/// Date format used on the invoices (dd/mm/yyyy).
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// A single extracted field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedField {
    /// Field name, as declared in the rule table.
    pub name: String,
    /// Normalized value, or [`NOT_FOUND`].
    pub value: String,
    /// Index of the pattern that matched, if any.
    pub pattern: Option<usize>,
}

impl ExtractedField {
    pub fn is_found(&self) -> bool {
        self.pattern.is_some()
    }
}

/// Result of extracting one document.
///
/// Holds exactly one entry per field of the rule set that produced it, in
/// declaration order. There is no way to modify it once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    fields: Vec<ExtractedField>,
}

impl ExtractionResult {
    pub fn new(fields: Vec<ExtractedField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[ExtractedField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&ExtractedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Stored value of a field (the sentinel when not found).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value.as_str())
    }

    pub fn is_found(&self, name: &str) -> bool {
        self.field(name).is_some_and(ExtractedField::is_found)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|f| (f.name.as_str(), f.value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields that matched a pattern.
    pub fn found_count(&self) -> usize {
        self.fields.iter().filter(|f| f.is_found()).count()
    }

    /// Names of the fields left at the sentinel.
    pub fn missing(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| !f.is_found())
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Field value as a decimal, ignoring a trailing currency suffix.
    pub fn decimal(&self, name: &str) -> Option<Decimal> {
        let field = self.field(name).filter(|f| f.is_found())?;
        let number = field
            .value
            .trim()
            .trim_end_matches(|c: char| !c.is_ascii_digit());
        Decimal::from_str(number).ok()
    }

    /// Field value as a dd/mm/yyyy date.
    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        let field = self.field(name).filter(|f| f.is_found())?;
        NaiveDate::parse_from_str(field.value.trim(), DATE_FORMAT).ok()
    }

    /// Field value as a `"start - end"` date range.
    pub fn date_range(&self, name: &str) -> Option<(NaiveDate, NaiveDate)> {
        let field = self.field(name).filter(|f| f.is_found())?;
        let (start, end) = field.value.split_once(" - ")?;
        let start = NaiveDate::parse_from_str(start.trim(), DATE_FORMAT).ok()?;
        let end = NaiveDate::parse_from_str(end.trim(), DATE_FORMAT).ok()?;
        Some((start, end))
    }

    /// Advisory consistency checks on the extracted values.
    ///
    /// Only looks at the fields of the built-in table; values are never
    /// changed.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.is_found(BILLING_PERIOD) {
            match self.date_range(BILLING_PERIOD) {
                Some((start, end)) if end < start => {
                    issues.push(format!("{} ends before it starts", BILLING_PERIOD));
                }
                Some(_) => {}
                None => issues.push(format!("{} has invalid dates", BILLING_PERIOD)),
            }
        }

        for name in [INVOICE_TOTAL, VAT_AMOUNT] {
            if self.is_found(name) && self.decimal(name).is_none() {
                issues.push(format!("{} is not a valid amount", name));
            }
        }

        if let (Some(total), Some(vat)) = (self.decimal(INVOICE_TOTAL), self.decimal(VAT_AMOUNT)) {
            if vat > total {
                issues.push(format!("{} exceeds {}", VAT_AMOUNT, INVOICE_TOTAL));
            }
        }

        if let Some(cups) = self.field(CUPS).filter(|f| f.is_found()) {
            let len = cups.value.chars().count();
            if len != 20 && len != 22 {
                issues.push(format!("{} has {} characters, expected 20 or 22", CUPS, len));
            }
        }

        issues
    }
}

/// Serializes as an ordered `{name: value}` object.
impl Serialize for ExtractionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            map.serialize_entry(&field.name, &field.value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn found(name: &str, value: &str) -> ExtractedField {
        ExtractedField {
            name: name.to_string(),
            value: value.to_string(),
            pattern: Some(0),
        }
    }

    fn missing(name: &str) -> ExtractedField {
        ExtractedField {
            name: name.to_string(),
            value: NOT_FOUND.to_string(),
            pattern: None,
        }
    }

    #[test]
    fn test_typed_views() {
        let result = ExtractionResult::new(vec![
            found(BILLING_PERIOD, "01/03/2024 - 31/03/2024"),
            found(INVOICE_TOTAL, "45.67€"),
            found("Fecha Fin Contrato", "15/09/2025"),
            missing(VAT_AMOUNT),
        ]);

        assert_eq!(
            result.date_range(BILLING_PERIOD),
            Some((
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
            ))
        );
        assert_eq!(result.decimal(INVOICE_TOTAL), Some(Decimal::from_str("45.67").unwrap()));
        assert_eq!(
            result.date("Fecha Fin Contrato"),
            NaiveDate::from_ymd_opt(2025, 9, 15)
        );
        assert_eq!(result.decimal(VAT_AMOUNT), None);
        assert_eq!(result.missing(), vec![VAT_AMOUNT]);
        assert_eq!(result.found_count(), 3);
    }

    #[test]
    fn test_serializes_in_field_order() {
        let result = ExtractionResult::new(vec![found("Z", "1"), missing("A")]);
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"Z":"1","A":"-"}"#);
    }

    #[test]
    fn test_validate_flags_inconsistencies() {
        let result = ExtractionResult::new(vec![
            found(BILLING_PERIOD, "31/03/2024 - 01/03/2024"),
            found(INVOICE_TOTAL, "5.00€"),
            found(VAT_AMOUNT, "7.93€"),
            found(CUPS, "ES12345"),
        ]);

        let issues = result.validate();
        assert_eq!(issues.len(), 3);
        assert!(issues[0].contains("ends before"));
        assert!(issues[1].contains("exceeds"));
        assert!(issues[2].contains("7 characters"));
    }

    #[test]
    fn test_validate_clean_result() {
        let result = ExtractionResult::new(vec![
            found(BILLING_PERIOD, "01/03/2024 - 31/03/2024"),
            found(INVOICE_TOTAL, "45.67€"),
            found(VAT_AMOUNT, "7.93€"),
            found(CUPS, "ES0021000000000000AB"),
        ]);
        assert!(result.validate().is_empty());
    }
}
