//! Rule-based invoice parser.

use tracing::{debug, info, trace};

use crate::error::RuleError;
use crate::models::config::ExtractionConfig;
use crate::models::record::{ExtractedField, ExtractionResult, NOT_FOUND};

use super::rules::{FieldSpec, RuleSet};
use super::InvoiceParser;

/// Parser applying a [`RuleSet`] to document text.
///
/// Holds no per-document state, so one instance can serve any number of
/// documents, from any number of threads.
#[derive(Debug, Clone)]
pub struct RuleParser {
    rules: RuleSet,
    currency_suffix: String,
}

impl RuleParser {
    /// Create a parser with the built-in rule table and a `€` suffix.
    pub fn new() -> Self {
        Self::with_rules(RuleSet::default())
    }

    /// Create a parser with a custom rule table.
    pub fn with_rules(rules: RuleSet) -> Self {
        Self {
            rules,
            currency_suffix: "€".to_string(),
        }
    }

    /// Set the suffix appended by amount normalizers.
    pub fn with_currency_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.currency_suffix = suffix.into();
        self
    }

    /// Build a parser from configuration, compiling custom rules if present.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, RuleError> {
        let rules = match &config.rules {
            Some(rules) => {
                debug!("Compiling {} configured field rules", rules.len());
                RuleSet::from_rules(rules)?
            }
            None => RuleSet::default(),
        };

        Ok(Self::with_rules(rules).with_currency_suffix(config.currency_suffix.clone()))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    fn extract_field(&self, spec: &FieldSpec, text: &str) -> ExtractedField {
        match spec.find(text) {
            Some((index, caps)) => {
                let value = spec.normalizer().apply(&caps, &self.currency_suffix);
                trace!("{}: pattern {} matched {:?}", spec.name(), index, &caps[0]);
                ExtractedField {
                    name: spec.name().to_string(),
                    value,
                    pattern: Some(index),
                }
            }
            None => {
                trace!("{}: no pattern matched", spec.name());
                ExtractedField {
                    name: spec.name().to_string(),
                    value: NOT_FOUND.to_string(),
                    pattern: None,
                }
            }
        }
    }
}

impl Default for RuleParser {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceParser for RuleParser {
    fn parse(&self, text: &str) -> ExtractionResult {
        info!(
            "Extracting {} fields from {} characters of text",
            self.rules.len(),
            text.len()
        );

        let fields: Vec<ExtractedField> = self
            .rules
            .fields()
            .iter()
            .map(|spec| self.extract_field(spec, text))
            .collect();

        let result = ExtractionResult::new(fields);

        debug!(
            "Found {}/{} fields",
            result.found_count(),
            result.len()
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::rules::patterns::*;
    use crate::extraction::rules::{FieldRule, Normalizer};
    use pretty_assertions::assert_eq;

    const SAMPLE_INVOICE: &str = r#"
        FACTURA DE ELECTRICIDAD
        Titular del contrato: MARIA LOPEZ GARCIA
        Dirección de suministro: Calle Mayor 12, 3º B, 28013 Madrid
        CUPS: ES 0021 0000 0000 0000 AB
        Mercado: Libre
        Peaje de acceso a la red (ATR): 2.0TD
        Potencia punta: 4,6 kW
        Potencia valle: 3,45 kW
        PERIODO DE FACTURACIÓN: 01/03/2024 - 31/03/2024
        DÍAS FACTURADOS: 31
        Energía consumida 254 kWh
        IVA: base 37,74 € cuota 7,93 €
        TOTAL IMPORTE FACTURA 45,67 €
        Fecha final del contrato: 15/09/2025
        Permanencia: No
    "#;

    fn value(result: &ExtractionResult, name: &str) -> String {
        result.get(name).unwrap().to_string()
    }

    #[test]
    fn test_parse_full_invoice() {
        let result = RuleParser::new().parse(SAMPLE_INVOICE);

        assert_eq!(value(&result, HOLDER), "MARIA LOPEZ GARCIA");
        assert_eq!(
            value(&result, SUPPLY_ADDRESS),
            "Calle Mayor 12, 3º B, 28013 Madrid"
        );
        assert_eq!(value(&result, CUPS), "ES0021000000000000AB");
        assert_eq!(value(&result, MARKET), "Libre");
        assert_eq!(value(&result, ACCESS_TOLL), "2.0TD");
        assert_eq!(value(&result, PEAK_POWER), "4.6");
        assert_eq!(value(&result, OFF_PEAK_POWER), "3.45");
        assert_eq!(value(&result, BILLING_PERIOD), "01/03/2024 - 31/03/2024");
        assert_eq!(value(&result, BILLED_DAYS), "31");
        assert_eq!(value(&result, TOTAL_CONSUMPTION), "254");
        assert_eq!(value(&result, VAT_AMOUNT), "7.93€");
        assert_eq!(value(&result, INVOICE_TOTAL), "45.67€");
        assert_eq!(value(&result, CONTRACT_END), "15/09/2025");
        assert_eq!(value(&result, PERMANENCE), "No");
        assert_eq!(value(&result, TARIFF_TYPE), "2.0TD");
        assert_eq!(result.found_count(), 15);
    }

    #[test]
    fn test_every_field_present_in_declared_order() {
        let parser = RuleParser::new();

        for text in ["", "   \n\t", "�� garbled Ã³ OCR ##", SAMPLE_INVOICE] {
            let result = parser.parse(text);
            let names: Vec<&str> = result.names().collect();
            let declared: Vec<&str> = parser.rules().names().collect();
            assert_eq!(names, declared);
        }
    }

    #[test]
    fn test_empty_text_is_all_sentinels() {
        let result = RuleParser::new().parse("");

        assert_eq!(result.found_count(), 0);
        assert!(result.values().all(|v| v == NOT_FOUND));
    }

    #[test]
    fn test_market() {
        let result = RuleParser::new().parse("Mercado: Libre");
        assert_eq!(value(&result, MARKET), "Libre");
    }

    #[test]
    fn test_billing_period() {
        let result =
            RuleParser::new().parse("PERIODO DE FACTURACIÓN: 01/03/2024 - 31/03/2024");
        assert_eq!(value(&result, BILLING_PERIOD), "01/03/2024 - 31/03/2024");
    }

    #[test]
    fn test_billing_period_alternate_wording() {
        let result = RuleParser::new().parse("Desde el 01/02/2024 hasta el 29/02/2024");
        assert_eq!(value(&result, BILLING_PERIOD), "01/02/2024 - 29/02/2024");
    }

    #[test]
    fn test_total_amount_gets_dot_and_suffix() {
        let result = RuleParser::new().parse("TOTAL IMPORTE FACTURA ... 45,67");
        assert_eq!(value(&result, INVOICE_TOTAL), "45.67€");
    }

    #[test]
    fn test_currency_suffix_is_configurable() {
        let result = RuleParser::new()
            .with_currency_suffix(" EUR")
            .parse("TOTAL FACTURA: 12,30");
        assert_eq!(value(&result, INVOICE_TOTAL), "12.30 EUR");
    }

    #[test]
    fn test_missing_cups_is_sentinel() {
        let result = RuleParser::new().parse("Factura sin código de suministro");
        assert_eq!(value(&result, CUPS), NOT_FOUND);
        assert!(!result.is_found(CUPS));
    }

    #[test]
    fn test_cups_whitespace_stripped() {
        let result = RuleParser::new().parse("ES 1234 5678 9012 3456 AB");
        assert_eq!(value(&result, CUPS), "ES1234567890123456AB");
    }

    #[test]
    fn test_cups_stops_at_line_end() {
        let result = RuleParser::new().parse("CUPS: ES0021000000000000AB\n1Periodo de lectura");
        assert_eq!(value(&result, CUPS), "ES0021000000000000AB");

        let result = RuleParser::new().parse("CUPS: ES 0021 0000 0000 0000 AB\n2P 3,45 kW");
        assert_eq!(value(&result, CUPS), "ES0021000000000000AB");
    }

    #[test]
    fn test_cups_with_border_point_suffix() {
        let result = RuleParser::new().parse("CUPS: ES0021000000000000AB1F\nMercado: Libre");
        assert_eq!(value(&result, CUPS), "ES0021000000000000AB1F");

        let result = RuleParser::new().parse("CUPS: ES 0021 0000 0000 0000 AB 1F");
        assert_eq!(value(&result, CUPS), "ES0021000000000000AB1F");
    }

    #[test]
    fn test_amounts_with_thousands_separator() {
        let result = RuleParser::new().parse(
            "IVA: base 5.879,67 € cuota 1.234,73 €\nTOTAL IMPORTE FACTURA 7.114,40 €",
        );
        assert_eq!(value(&result, VAT_AMOUNT), "1234.73€");
        assert_eq!(value(&result, INVOICE_TOTAL), "7114.40€");
        assert_eq!(
            result.decimal(INVOICE_TOTAL),
            Some(rust_decimal::Decimal::new(711440, 2))
        );
    }

    #[test]
    fn test_vat_ignores_words_ending_in_iva() {
        let result =
            RuleParser::new().parse("Energía activa 120,00 kWh 30,50 €\nIVA 21% 7,93 €");
        assert_eq!(value(&result, VAT_AMOUNT), "7.93€");
        assert_eq!(result.field(VAT_AMOUNT).unwrap().pattern, Some(1));

        let result = RuleParser::new().parse("Energía activa 120,00 kWh 30,50 €");
        assert_eq!(value(&result, VAT_AMOUNT), NOT_FOUND);
    }

    #[test]
    fn test_priority_wins_over_text_position() {
        let text = "Desde el 01/01/2024 hasta el 31/01/2024\n\
                    PERIODO DE FACTURACIÓN: 01/03/2024 - 31/03/2024\n\
                    TOTAL FACTURA 10,00\n\
                    TOTAL IMPORTE FACTURA 45,67";
        let result = RuleParser::new().parse(text);

        assert_eq!(value(&result, BILLING_PERIOD), "01/03/2024 - 31/03/2024");
        assert_eq!(value(&result, INVOICE_TOTAL), "45.67€");
        assert_eq!(result.field(BILLING_PERIOD).unwrap().pattern, Some(0));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = RuleParser::new();
        assert_eq!(parser.parse(SAMPLE_INVOICE), parser.parse(SAMPLE_INVOICE));
    }

    #[test]
    fn test_holder_does_not_run_into_next_line() {
        let result = RuleParser::new().parse("Titular:\nJUAN PEREZ\nDirección de suministro: Calle Sol 1\n");
        assert_eq!(value(&result, HOLDER), "JUAN PEREZ");
        assert_eq!(value(&result, SUPPLY_ADDRESS), "Calle Sol 1");
    }

    #[test]
    fn test_custom_rules_from_config() {
        let config = ExtractionConfig {
            currency_suffix: "€".to_string(),
            rules: Some(vec![
                FieldRule::new("Factura", Normalizer::Text).pattern(r"N[ºo] factura:\s*(\S+)"),
            ]),
        };
        let parser = RuleParser::from_config(&config).unwrap();
        let result = parser.parse("Nº factura: FE24-0001");

        assert_eq!(result.len(), 1);
        assert_eq!(value(&result, "Factura"), "FE24-0001");
    }

    #[test]
    fn test_invalid_config_rules_are_rejected() {
        let config = ExtractionConfig {
            currency_suffix: "€".to_string(),
            rules: Some(vec![FieldRule::new("Periodo", Normalizer::Range).pattern(r"(\d+)")]),
        };
        assert!(RuleParser::from_config(&config).is_err());
    }
}
