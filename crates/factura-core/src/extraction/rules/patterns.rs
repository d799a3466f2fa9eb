//! Built-in rule table for Spanish electricity invoices.
//!
//! Each field lists the wording used by the issuers we have seen, primary
//! wording first. All patterns are compiled case-insensitive.

use lazy_static::lazy_static;

use super::{FieldRule, Normalizer, RuleSet};

pub const HOLDER: &str = "Titular";
pub const SUPPLY_ADDRESS: &str = "Dirección de suministro";
pub const CUPS: &str = "CUPS";
pub const MARKET: &str = "Mercado";
pub const ACCESS_TOLL: &str = "Peaje de acceso a la red";
pub const PEAK_POWER: &str = "Potencia Punta (kW)";
pub const OFF_PEAK_POWER: &str = "Potencia Valle (kW)";
pub const BILLING_PERIOD: &str = "Periodo Facturación";
pub const BILLED_DAYS: &str = "Días Facturados";
pub const TOTAL_CONSUMPTION: &str = "Consumo Total (kWh)";
pub const VAT_AMOUNT: &str = "IVA (€)";
pub const INVOICE_TOTAL: &str = "Total Factura";
pub const CONTRACT_END: &str = "Fecha Fin Contrato";
pub const PERMANENCE: &str = "Permanencia";
pub const TARIFF_TYPE: &str = "Tipo Tarifa TD";

const DATE: &str = r"(\d{2}/\d{2}/\d{4})";
const NAME: &str = r"([A-ZÁÉÍÓÚÜÑ][A-ZÁÉÍÓÚÜÑ ]*)";
/// "1.234,56" or plain "45,67" / "45.67".
const AMOUNT: &str = r"(\d{1,3}(?:\.\d{3})+,\d{2}|\d+[\.,]\d{2})";

lazy_static! {
    /// The default table, compiled once.
    pub static ref DEFAULT_RULE_SET: RuleSet =
        RuleSet::from_rules(&default_rules()).expect("built-in rule table must compile");
}

/// The default electricity invoice rule table, in output order.
pub fn default_rules() -> Vec<FieldRule> {
    vec![
        FieldRule::new(HOLDER, Normalizer::Text)
            .pattern(format!(r"Titular[^:\n]*:\s*{NAME}"))
            .pattern(format!(r"Cliente[^:\n]*:\s*{NAME}")),
        FieldRule::new(SUPPLY_ADDRESS, Normalizer::Text)
            .pattern(r"Direcci[óo]n de suministro:\s*(C.*?)\n")
            .pattern(r"Direcci[óo]n de suministro:[ \t]*(\S.*)")
            .pattern(r"Suministro:[ \t]*(\S.*)")
            .pattern(r"Domicilio:[ \t]*(\S.*)"),
        FieldRule::new(CUPS, Normalizer::Compact)
            .pattern(r"(ES\s?\d{4}\s?\d{4}\s?\d{4}\s?\d{4}\s?[A-Z0-9]{2}(?:[ \t]?\d[A-Z])?)\b"),
        FieldRule::new(MARKET, Normalizer::Text)
            .pattern(r"Mercado[:\s]*(Libre|Regulado)"),
        FieldRule::new(ACCESS_TOLL, Normalizer::Text)
            .pattern(r"Peajes? de acceso a la red[^:]*[:\s]*(\d\.\dTD)")
            .pattern(r"Tarifa de acceso[^:]*[:\s]*(\d\.\dTD)"),
        FieldRule::new(PEAK_POWER, Normalizer::Numeric)
            .pattern(r"Potencia punta[:\s]*(\d+[\.,]?\d*)\s*kW")
            .pattern(r"Potencia punta.*?(\d+[\.,]?\d*)\s*kW")
            .pattern(r"Potencia punta[:\s]+(\d+(?:[\.,]\d+)?)"),
        FieldRule::new(OFF_PEAK_POWER, Normalizer::Numeric)
            .pattern(r"Potencia valle[:\s]*(\d+[\.,]?\d*)\s*kW")
            .pattern(r"Potencia valle.*?(\d+[\.,]?\d*)\s*kW")
            .pattern(r"Potencia valle[:\s]+(\d+(?:[\.,]\d+)?)"),
        FieldRule::new(BILLING_PERIOD, Normalizer::Range)
            .pattern(format!(r"PERIODO DE FACTURACI[ÓO]N[:\s]*{DATE}\s*[-–]\s*{DATE}"))
            .pattern(format!(r"Desde el\s*{DATE}\s*hasta el\s*{DATE}")),
        FieldRule::new(BILLED_DAYS, Normalizer::Numeric)
            .pattern(r"D[ÍI]AS FACTURADOS[:\s]*(\d+)")
            .pattern(r"N[úu]mero de d[íi]as.*?(\d+)"),
        FieldRule::new(TOTAL_CONSUMPTION, Normalizer::Numeric)
            .pattern(r"consumida[^\d]*(\d+[\.,]?\d*)\s*kWh")
            .pattern(r"Energ[íi]a activa total\s*:\s*(\d+[\.,]?\d*)")
            .pattern(r"Energ[íi]a consumida\s*(\d+)")
            .pattern(r"consumo total.*?[:\s]+(\d+)\s*kWh"),
        FieldRule::new(VAT_AMOUNT, Normalizer::Amount { group: 2, currency: true })
            .pattern(format!(r"\bIVA\b[^\d]*{AMOUNT}[^\d]*{AMOUNT}"))
            .pattern(format!(r"\bIVA\b\s*(\d+(?:[\.,]\d+)?)\s*%\s*{AMOUNT}")),
        FieldRule::new(INVOICE_TOTAL, Normalizer::Amount { group: 1, currency: true })
            .pattern(format!(r"TOTAL IMPORTE FACTURA[^\d]*{AMOUNT}"))
            .pattern(format!(r"TOTAL FACTURA[^\d]*{AMOUNT}")),
        FieldRule::new(CONTRACT_END, Normalizer::Text)
            .pattern(format!(r"Fecha final del contrato[:\s]*{DATE}"))
            .pattern(format!(r"Fecha fin contrato.*?{DATE}")),
        FieldRule::new(PERMANENCE, Normalizer::Text)
            .pattern(r"Permanencia[:\s]*(Sí|Si|No)\b"),
        FieldRule::new(TARIFF_TYPE, Normalizer::Text)
            .pattern(r"\b(2\.0TD|3\.0TD|6\.1TD|6\.0TD|3\.1TD)\b"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_table_compiles() {
        assert_eq!(DEFAULT_RULE_SET.len(), 15);
        assert_eq!(DEFAULT_RULE_SET.names().next(), Some(HOLDER));
        assert_eq!(DEFAULT_RULE_SET.names().last(), Some(TARIFF_TYPE));
    }

    #[test]
    fn test_two_group_fields() {
        assert_eq!(DEFAULT_RULE_SET.get(BILLING_PERIOD).unwrap().group_count(), 2);
        assert_eq!(DEFAULT_RULE_SET.get(VAT_AMOUNT).unwrap().group_count(), 2);
        assert_eq!(DEFAULT_RULE_SET.get(INVOICE_TOTAL).unwrap().group_count(), 1);
    }
}
