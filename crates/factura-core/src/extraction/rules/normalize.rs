//! Normalizers turning captured groups into stored field values.

use regex::Captures;
use serde::{Deserialize, Serialize};

/// How the capture groups of a matched pattern become the field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalizer {
    /// Trim surrounding whitespace.
    Text,
    /// Trim and use a dot as decimal separator.
    Numeric,
    /// Remove every whitespace character (supply point codes).
    Compact,
    /// Two groups joined as `"{start} - {end}"`.
    Range,
    /// Monetary amount read from capture `group`, with optional currency suffix.
    Amount {
        group: usize,
        #[serde(default = "default_currency")]
        currency: bool,
    },
}

fn default_currency() -> bool {
    true
}

impl Normalizer {
    /// Number of capture groups every pattern of the field must provide.
    pub fn group_count(&self) -> usize {
        match self {
            Normalizer::Text | Normalizer::Numeric | Normalizer::Compact => 1,
            Normalizer::Range => 2,
            Normalizer::Amount { group, .. } => (*group).max(1),
        }
    }

    /// Apply the normalizer to a successful match.
    ///
    /// A group that did not participate in the match reads as the empty
    /// string, so this never fails.
    pub fn apply(&self, caps: &Captures<'_>, currency_suffix: &str) -> String {
        match self {
            Normalizer::Text => group(caps, 1).trim().to_string(),
            Normalizer::Numeric => decimal_point(group(caps, 1).trim()),
            Normalizer::Compact => strip_whitespace(group(caps, 1)),
            Normalizer::Range => format!(
                "{} - {}",
                group(caps, 1).trim(),
                group(caps, 2).trim()
            ),
            Normalizer::Amount { group: index, currency } => {
                let amount = decimal_point(group(caps, (*index).max(1)).trim());
                if *currency {
                    format!("{}{}", amount, currency_suffix)
                } else {
                    amount
                }
            }
        }
    }

    /// Short label used when listing rules.
    pub fn label(&self) -> String {
        match self {
            Normalizer::Text => "text".to_string(),
            Normalizer::Numeric => "numeric".to_string(),
            Normalizer::Compact => "compact".to_string(),
            Normalizer::Range => "range".to_string(),
            Normalizer::Amount { group, currency: true } => format!("amount(group {}, currency)", group),
            Normalizer::Amount { group, currency: false } => format!("amount(group {})", group),
        }
    }
}

fn group<'t>(caps: &Captures<'t>, index: usize) -> &'t str {
    caps.get(index).map(|m| m.as_str()).unwrap_or("")
}

/// Spanish number to dot-decimal ("45,67" -> "45.67", "1.234,56" -> "1234.56").
///
/// Dots are only read as thousands separators when a decimal comma is present.
pub fn decimal_point(s: &str) -> String {
    if s.contains(',') {
        s.replace('.', "").replace(',', ".")
    } else {
        s.to_string()
    }
}

/// Remove all whitespace, including line breaks left by OCR.
pub fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use regex::Regex;

    fn caps<'t>(pattern: &str, text: &'t str) -> Captures<'t> {
        Regex::new(pattern).unwrap().captures(text).unwrap()
    }

    #[test]
    fn test_range_joins_both_groups() {
        let c = caps(r"(\S+) al (\S+)", "01/03/2024 al 31/03/2024");
        assert_eq!(Normalizer::Range.apply(&c, "€"), "01/03/2024 - 31/03/2024");
    }

    #[test]
    fn test_amount_uses_requested_group() {
        let c = caps(r"(\d+,\d{2}) (\d+,\d{2})", "37,74 7,93");
        let vat = Normalizer::Amount { group: 2, currency: true };
        assert_eq!(vat.apply(&c, "€"), "7.93€");

        let plain = Normalizer::Amount { group: 1, currency: false };
        assert_eq!(plain.apply(&c, "€"), "37.74");
    }

    #[test]
    fn test_compact_strips_all_whitespace() {
        let c = caps(r"(?s)(ES.*)", "ES 0021 0000\n0000 0000 AB");
        assert_eq!(Normalizer::Compact.apply(&c, ""), "ES0021000000000000AB");
    }

    #[test]
    fn test_text_keeps_commas_numeric_does_not() {
        let c = caps(r":(.*)", ": Calle Mayor 3, 2º ");
        assert_eq!(Normalizer::Text.apply(&c, ""), "Calle Mayor 3, 2º");

        let c = caps(r":(.*)", ": 3,45 ");
        assert_eq!(Normalizer::Numeric.apply(&c, ""), "3.45");
    }

    #[test]
    fn test_thousands_separator_dropped() {
        assert_eq!(decimal_point("1.234,56"), "1234.56");
        assert_eq!(decimal_point("12.345.678,90"), "12345678.90");
        assert_eq!(decimal_point("45.67"), "45.67");
        assert_eq!(decimal_point("254"), "254");

        let c = caps(r"(\S+) €", "1.234,56 €");
        let total = Normalizer::Amount { group: 1, currency: true };
        assert_eq!(total.apply(&c, "€"), "1234.56€");
    }

    #[test]
    fn test_missing_optional_group_is_empty() {
        let c = caps(r"a(b)?", "a");
        assert_eq!(Normalizer::Text.apply(&c, ""), "");
    }

    #[test]
    fn test_group_count() {
        assert_eq!(Normalizer::Text.group_count(), 1);
        assert_eq!(Normalizer::Range.group_count(), 2);
        assert_eq!(Normalizer::Amount { group: 2, currency: true }.group_count(), 2);
        assert_eq!(Normalizer::Amount { group: 0, currency: true }.group_count(), 1);
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&Normalizer::Amount { group: 2, currency: true }).unwrap();
        assert_eq!(json, r#"{"kind":"amount","group":2,"currency":true}"#);

        let parsed: Normalizer = serde_json::from_str(r#"{"kind":"amount","group":1}"#).unwrap();
        assert_eq!(parsed, Normalizer::Amount { group: 1, currency: true });

        let parsed: Normalizer = serde_json::from_str(r#"{"kind":"compact"}"#).unwrap();
        assert_eq!(parsed, Normalizer::Compact);
    }
}
