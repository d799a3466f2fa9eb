//! Error types for the factura-core library.
//!
//! Field extraction itself has no error path: a field that cannot be found
//! is reported as data. Everything here belongs to rule compilation and to
//! the collaborators around the engine (documents, OCR, ledger).

use thiserror::Error;

/// Main error type for the factura library.
#[derive(Error, Debug)]
pub enum FacturaError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Rule table could not be compiled.
    #[error("rule error: {0}")]
    Rules(#[from] RuleError),

    /// Ledger persistence error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The document type is not one we can read.
    #[error("unsupported document: {0}")]
    UnsupportedDocument(String),

    /// No text could be obtained from the document.
    #[error("no text could be extracted from {0}")]
    NoText(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// OCR support was not compiled in.
    #[error("OCR support is not available in this build")]
    Unavailable,
}

/// Errors raised while compiling a rule table.
#[derive(Error, Debug)]
pub enum RuleError {
    /// A pattern is not a valid regular expression.
    #[error("invalid pattern for {field}: {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    /// A pattern captures fewer groups than its normalizer reads.
    #[error("pattern {index} for {field} has {found} capture group(s), normalizer needs {required}")]
    MissingGroups {
        field: String,
        index: usize,
        found: usize,
        required: usize,
    },

    /// Two rules share the same field name.
    #[error("duplicate field: {0}")]
    DuplicateField(String),

    /// A field was declared without any pattern.
    #[error("field {0} has no patterns")]
    Empty(String),
}

/// Errors related to the ledger file.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Reading or writing the CSV file failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem error around the ledger file.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Internal lock was poisoned by a panicking writer.
    #[error("ledger lock poisoned")]
    Poisoned,
}

/// Result type for the factura library.
pub type Result<T> = std::result::Result<T, FacturaError>;
