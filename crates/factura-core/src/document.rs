//! Turning invoice documents into flattened text.
//!
//! PDFs are read through their embedded text layer when it carries enough
//! text; scanned PDFs and images go through OCR. Plain `.txt` files are
//! passed through, which is handy for text already extracted elsewhere.

use std::cell::OnceCell;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{FacturaError, Result};
use crate::models::config::{OcrConfig, PdfConfig};
use crate::ocr::{self, OcrBackend};
use crate::pdf::{PdfExtractor, PdfProcessor};

/// Kind of input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
    Text,
}

impl DocumentKind {
    /// Detect the kind from a file extension (case-insensitive).
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "png" | "jpg" | "jpeg" | "tiff" | "tif" | "bmp" => Some(DocumentKind::Image),
            "txt" => Some(DocumentKind::Text),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// An input document held in memory.
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    kind: DocumentKind,
    bytes: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, kind: DocumentKind, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind,
            bytes,
        }
    }

    /// Read a document from disk, detecting its kind from the extension.
    pub fn open(path: &Path) -> Result<Self> {
        let kind = DocumentKind::from_path(path)
            .ok_or_else(|| FacturaError::UnsupportedDocument(path.display().to_string()))?;
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(name, kind, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Where the text of a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    /// Embedded PDF text layer.
    TextLayer,
    /// OCR over page images or an image file.
    Ocr,
    /// Plain text file.
    Plain,
}

/// Text obtained from a document.
#[derive(Debug, Clone)]
pub struct DocumentText {
    pub text: String,
    pub source: TextSource,
}

/// Produces a single flattened text string from a document.
pub trait TextProvider {
    fn extract_text(&self, document: &Document) -> Result<String>;
}

/// Default provider: PDF text layer, OCR fallback, plain text passthrough.
///
/// The OCR backend is loaded on first use and kept for the provider's
/// lifetime.
pub struct DocumentTextProvider {
    pdf: PdfConfig,
    ocr_config: OcrConfig,
    text_only: bool,
    ocr: OnceCell<Box<dyn OcrBackend>>,
}

impl DocumentTextProvider {
    pub fn new(pdf: PdfConfig, ocr_config: OcrConfig) -> Self {
        Self {
            pdf,
            ocr_config,
            text_only: false,
            ocr: OnceCell::new(),
        }
    }

    /// Never run OCR; PDFs must carry a text layer.
    pub fn text_only(mut self, text_only: bool) -> Self {
        self.text_only = text_only;
        self
    }

    /// Use the given OCR backend instead of loading models.
    pub fn with_ocr_backend(self, backend: Box<dyn OcrBackend>) -> Self {
        let _ = self.ocr.set(backend);
        self
    }

    fn ocr_backend(&self) -> Result<&dyn OcrBackend> {
        if let Some(backend) = self.ocr.get() {
            return Ok(backend.as_ref());
        }

        let backend = ocr::load_backend(&self.ocr_config)?;
        Ok(self.ocr.get_or_init(|| backend).as_ref())
    }

    /// Extract text, reporting which route produced it.
    pub fn extract(&self, document: &Document) -> Result<DocumentText> {
        info!("Reading {} ({:?})", document.name(), document.kind());

        let extracted = match document.kind() {
            DocumentKind::Text => DocumentText {
                text: String::from_utf8_lossy(document.bytes()).into_owned(),
                source: TextSource::Plain,
            },
            DocumentKind::Image => {
                if self.text_only {
                    return Err(FacturaError::Config(
                        "image documents need OCR, which text-only mode disables".to_string(),
                    ));
                }
                let image = image::load_from_memory(document.bytes())?;
                let result = self.ocr_backend()?.process(&image)?;
                DocumentText {
                    text: result.text,
                    source: TextSource::Ocr,
                }
            }
            DocumentKind::Pdf => self.extract_pdf(document)?,
        };

        if extracted.text.trim().is_empty() {
            return Err(FacturaError::NoText(document.name().to_string()));
        }

        debug!(
            "Got {} characters from {} via {:?}",
            extracted.text.len(),
            document.name(),
            extracted.source
        );
        Ok(extracted)
    }

    fn extract_pdf(&self, document: &Document) -> Result<DocumentText> {
        let mut pdf = PdfExtractor::new().with_min_text_length(self.pdf.min_text_length);
        pdf.load(document.bytes())?;

        let text_layer = pdf.extract_text().unwrap_or_else(|e| {
            warn!("Could not read text layer of {}: {}", document.name(), e);
            String::new()
        });
        let pdf_type = pdf.analyze_text(&text_layer);
        debug!("PDF type: {:?}", pdf_type);

        if self.text_only || (pdf_type.has_text() && self.pdf.prefer_embedded_text) {
            return Ok(DocumentText {
                text: text_layer,
                source: TextSource::TextLayer,
            });
        }

        if !pdf_type.has_images() {
            debug!("No images in {}, using text layer", document.name());
            return Ok(DocumentText {
                text: text_layer,
                source: TextSource::TextLayer,
            });
        }

        if self.ocr.get().is_none()
            && !self.ocr_config.models_present()
            && !text_layer.trim().is_empty()
        {
            warn!(
                "OCR models not found at {}, using text layer",
                self.ocr_config.model_dir.display()
            );
            return Ok(DocumentText {
                text: text_layer,
                source: TextSource::TextLayer,
            });
        }

        match self.ocr_pdf(&pdf) {
            Ok(text) if !text.trim().is_empty() => Ok(DocumentText {
                text,
                source: TextSource::Ocr,
            }),
            Ok(_) => {
                warn!("OCR found no text in {}, using text layer", document.name());
                Ok(DocumentText {
                    text: text_layer,
                    source: TextSource::TextLayer,
                })
            }
            Err(e) if !text_layer.trim().is_empty() => {
                warn!("OCR failed for {} ({}), using text layer", document.name(), e);
                Ok(DocumentText {
                    text: text_layer,
                    source: TextSource::TextLayer,
                })
            }
            Err(e) => {
                warn!("OCR failed for {}: {}", document.name(), e);
                Err(FacturaError::NoText(document.name().to_string()))
            }
        }
    }

    /// OCR the images of each page and join page texts with blank lines.
    fn ocr_pdf(&self, pdf: &PdfExtractor) -> Result<String> {
        let page_limit = match self.pdf.max_pages {
            0 => pdf.page_count(),
            n => pdf.page_count().min(n as u32),
        };

        let mut images = Vec::new();
        for page in 1..=page_limit {
            match pdf.extract_images(page) {
                Ok(page_images) => images.extend(page_images),
                Err(e) => warn!("Failed to extract images from page {}: {}", page, e),
            }
        }

        if images.is_empty() {
            debug!("No page images referenced, scanning all objects");
            images = pdf.document_images();
        }

        if images.is_empty() {
            return Ok(String::new());
        }

        let backend = self.ocr_backend()?;
        let mut texts = Vec::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            match backend.process(image) {
                Ok(result) if !result.text.trim().is_empty() => texts.push(result.text),
                Ok(_) => debug!("No text detected in image {}", i + 1),
                Err(e) => warn!("OCR failed for image {}: {}", i + 1, e),
            }
        }

        Ok(texts.join("\n\n"))
    }
}

impl TextProvider for DocumentTextProvider {
    fn extract_text(&self, document: &Document) -> Result<String> {
        self.extract(document).map(|t| t.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::ocr::OcrResult;
    use image::{DynamicImage, RgbImage};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    struct FixedOcr(&'static str);

    impl OcrBackend for FixedOcr {
        fn process(&self, image: &DynamicImage) -> std::result::Result<OcrResult, OcrError> {
            Ok(OcrResult {
                boxes: Vec::new(),
                text: self.0.to_string(),
                processing_time_ms: 0,
                image_size: (image.width(), image.height()),
            })
        }
    }

    fn provider() -> DocumentTextProvider {
        DocumentTextProvider::new(PdfConfig::default(), OcrConfig::default())
    }

    fn png_bytes() -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// One-page PDF with a Courier text line and, optionally, a 2x2 gray image.
    fn pdf_bytes(text: &str, with_image: bool) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Dictionary, Object, Stream};

        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![20.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ];
        let mut xobjects = Dictionary::new();
        if with_image {
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => 2,
                    "Height" => 2,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                vec![0, 255, 255, 0],
            ));
            xobjects.set("Im1", image_id);
            operations.extend([
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![100.into(), 0.into(), 0.into(), 100.into(), 20.into(), 500.into()],
                ),
                Operation::new("Do", vec!["Im1".into()]),
                Operation::new("Q", vec![]),
            ]);
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                    "XObject" => xobjects,
                },
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DocumentKind::from_path(Path::new("a/factura.PDF")), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_path(Path::new("scan.jpeg")), Some(DocumentKind::Image));
        assert_eq!(DocumentKind::from_path(Path::new("texto.txt")), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_path(Path::new("hoja.xlsx")), None);
        assert_eq!(DocumentKind::from_path(Path::new("sin_extension")), None);
    }

    #[test]
    fn test_plain_text_passthrough() {
        let doc = Document::new("f.txt", DocumentKind::Text, "Mercado: Libre".as_bytes().to_vec());
        let text = provider().extract(&doc).unwrap();

        assert_eq!(text.text, "Mercado: Libre");
        assert_eq!(text.source, TextSource::Plain);
    }

    #[test]
    fn test_blank_document_is_no_text() {
        let doc = Document::new("f.txt", DocumentKind::Text, b"  \n ".to_vec());
        assert!(matches!(provider().extract_text(&doc), Err(FacturaError::NoText(_))));
    }

    #[test]
    fn test_image_goes_through_ocr() {
        let doc = Document::new("scan.png", DocumentKind::Image, png_bytes());
        let provider = provider().with_ocr_backend(Box::new(FixedOcr("TOTAL FACTURA 10,00")));

        let text = provider.extract(&doc).unwrap();
        assert_eq!(text.text, "TOTAL FACTURA 10,00");
        assert_eq!(text.source, TextSource::Ocr);
    }

    #[test]
    fn test_image_rejected_in_text_only_mode() {
        let doc = Document::new("scan.png", DocumentKind::Image, png_bytes());
        let provider = provider()
            .with_ocr_backend(Box::new(FixedOcr("x")))
            .text_only(true);

        assert!(matches!(provider.extract(&doc), Err(FacturaError::Config(_))));
    }

    #[test]
    fn test_corrupt_pdf_is_an_error() {
        let doc = Document::new("rota.pdf", DocumentKind::Pdf, b"%PDF-garbage".to_vec());
        assert!(matches!(provider().extract(&doc), Err(FacturaError::Pdf(_))));
    }

    #[test]
    fn test_pdf_with_text_layer() {
        let doc = Document::new(
            "factura.pdf",
            DocumentKind::Pdf,
            pdf_bytes("CUPS: ES0021000000000000AB Mercado: Libre Permanencia: No", false),
        );
        let provider = provider().with_ocr_backend(Box::new(FixedOcr("no deberia usarse")));

        let text = provider.extract(&doc).unwrap();
        assert_eq!(text.source, TextSource::TextLayer);
        assert!(text.text.contains("ES0021000000000000AB"));
    }

    #[test]
    fn test_short_text_layer_without_images_skips_ocr() {
        let doc = Document::new("corta.pdf", DocumentKind::Pdf, pdf_bytes("Mercado: Libre", false));
        let provider = provider().with_ocr_backend(Box::new(FixedOcr("TOTAL FACTURA 10,00")));

        let text = provider.extract(&doc).unwrap();
        assert_eq!(text.source, TextSource::TextLayer);
        assert!(text.text.contains("Mercado: Libre"));
    }

    #[test]
    fn test_scanned_pdf_goes_through_ocr() {
        let doc = Document::new("scan.pdf", DocumentKind::Pdf, pdf_bytes("Mercado: Libre", true));
        let provider = provider().with_ocr_backend(Box::new(FixedOcr("TOTAL FACTURA 10,00")));

        let text = provider.extract(&doc).unwrap();
        assert_eq!(text.source, TextSource::Ocr);
        assert_eq!(text.text, "TOTAL FACTURA 10,00");
    }

    #[test]
    fn test_scanned_pdf_without_models_uses_text_layer() {
        let dir = tempfile::tempdir().unwrap();
        let ocr_config = OcrConfig {
            model_dir: dir.path().join("sin_modelos"),
            ..OcrConfig::default()
        };
        let provider = DocumentTextProvider::new(PdfConfig::default(), ocr_config);
        let doc = Document::new("scan.pdf", DocumentKind::Pdf, pdf_bytes("Mercado: Libre", true));

        let text = provider.extract(&doc).unwrap();
        assert_eq!(text.source, TextSource::TextLayer);
        assert!(text.text.contains("Mercado: Libre"));
    }

    #[test]
    fn test_text_only_pdf_never_runs_ocr() {
        let doc = Document::new("scan.pdf", DocumentKind::Pdf, pdf_bytes("Mercado: Libre", true));
        let provider = provider()
            .with_ocr_backend(Box::new(FixedOcr("TOTAL FACTURA 10,00")))
            .text_only(true);

        let text = provider.extract(&doc).unwrap();
        assert_eq!(text.source, TextSource::TextLayer);
        assert!(!text.text.contains("TOTAL FACTURA"));
    }

    #[test]
    fn test_open_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hoja.xlsx");
        std::fs::write(&path, b"x").unwrap();

        assert!(matches!(
            Document::open(&path),
            Err(FacturaError::UnsupportedDocument(_))
        ));
    }

    #[test]
    fn test_open_reads_name_and_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("factura.txt");
        std::fs::write(&path, "CUPS ES0021000000000000AB").unwrap();

        let doc = Document::open(&path).unwrap();
        assert_eq!(doc.name(), "factura.txt");
        assert_eq!(doc.kind(), DocumentKind::Text);
        assert_eq!(doc.bytes(), b"CUPS ES0021000000000000AB");
    }
}
