//! Invoice field extraction.

mod parser;
pub mod rules;

pub use parser::RuleParser;
pub use rules::{FieldRule, FieldSpec, Normalizer, RuleSet};

use crate::models::record::ExtractionResult;

/// Trait for invoice parsers.
///
/// Parsing is total: a field that cannot be located is reported with the
/// sentinel value, never as an error.
pub trait InvoiceParser {
    /// Extract every declared field from flattened document text.
    fn parse(&self, text: &str) -> ExtractionResult;
}
