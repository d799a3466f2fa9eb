//! PDF processing module.

mod extractor;

pub use extractor::PdfExtractor;

use crate::error::PdfError;
use image::DynamicImage;

/// Type of PDF content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfType {
    /// Contains extractable text.
    Text,
    /// Contains only images (scanned document).
    Image,
    /// Contains both text and images.
    Hybrid,
    /// Empty or unreadable.
    Empty,
}

impl PdfType {
    /// Classify from the text layer length and the number of page images.
    pub fn classify(text_len: usize, image_count: usize, min_text_length: usize) -> Self {
        match (text_len >= min_text_length && text_len > 0, image_count > 0) {
            (true, false) => PdfType::Text,
            (false, true) => PdfType::Image,
            (true, true) => PdfType::Hybrid,
            (false, false) => PdfType::Empty,
        }
    }

    pub fn has_text(&self) -> bool {
        matches!(self, PdfType::Text | PdfType::Hybrid)
    }

    pub fn has_images(&self) -> bool {
        matches!(self, PdfType::Image | PdfType::Hybrid)
    }
}

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for PDF processing implementations.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Extract the text layer of the entire PDF.
    fn extract_text(&self) -> Result<String>;

    /// Extract embedded images from a page (1-indexed).
    fn extract_images(&self, page: u32) -> Result<Vec<DynamicImage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(PdfType::classify(500, 0, 50), PdfType::Text);
        assert_eq!(PdfType::classify(10, 2, 50), PdfType::Image);
        assert_eq!(PdfType::classify(500, 1, 50), PdfType::Hybrid);
        assert_eq!(PdfType::classify(0, 0, 50), PdfType::Empty);
        assert_eq!(PdfType::classify(0, 0, 0), PdfType::Empty);
        assert!(PdfType::Hybrid.has_text() && PdfType::Hybrid.has_images());
    }
}
