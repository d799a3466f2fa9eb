//! Core library for Spanish electricity invoice field extraction.
//!
//! This crate provides:
//! - A rule engine: ordered regex patterns per field, first match wins,
//!   one normalized value per field (or the `-` sentinel)
//! - The built-in rule table for electricity invoices (CUPS, powers, VAT...)
//! - Document text: PDF text layer with OCR fallback for scans and images
//! - A CSV ledger that accumulates one row per processed invoice

pub mod document;
pub mod error;
pub mod extraction;
pub mod ledger;
pub mod models;
pub mod ocr;
pub mod pdf;

pub use document::{Document, DocumentKind, DocumentText, DocumentTextProvider, TextProvider, TextSource};
pub use error::{FacturaError, LedgerError, OcrError, PdfError, Result, RuleError};
pub use extraction::{FieldRule, FieldSpec, InvoiceParser, Normalizer, RuleParser, RuleSet};
pub use ledger::{Ledger, LedgerTable};
pub use models::config::{ExtractionConfig, FacturaConfig, LedgerConfig, OcrConfig, PdfConfig};
pub use models::record::{ExtractedField, ExtractionResult, NOT_FOUND};
pub use ocr::{OcrBackend, OcrResult, TextBox};
#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
pub use pdf::{PdfExtractor, PdfProcessor, PdfType};
