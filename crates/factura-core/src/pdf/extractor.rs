//! PDF text layer and page image extraction using lopdf and pdf-extract.

use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, trace};

use super::{PdfProcessor, PdfType, Result};
use crate::error::PdfError;

/// PDF content extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
    min_text_length: usize,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
            min_text_length: 50,
        }
    }

    /// Minimum text layer length for the PDF to count as text-based.
    pub fn with_min_text_length(mut self, min_text_length: usize) -> Self {
        self.min_text_length = min_text_length;
        self
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("no document loaded".to_string()))
    }

    /// Classify the document given an already extracted text layer.
    pub fn analyze_text(&self, text: &str) -> PdfType {
        let text_len = text.trim().chars().count();
        let image_count = self.image_objects().len();
        let pdf_type = PdfType::classify(text_len, image_count, self.min_text_length);

        debug!(
            "PDF analysis: {} chars text, {} images -> {:?}",
            text_len, image_count, pdf_type
        );
        pdf_type
    }

    /// Every image XObject in the document, in object order.
    ///
    /// Used when pages do not reference their scans through resources.
    pub fn document_images(&self) -> Vec<DynamicImage> {
        let Ok(doc) = self.document() else {
            return Vec::new();
        };

        let images: Vec<DynamicImage> = self
            .image_objects()
            .into_iter()
            .filter_map(|id| match doc.get_object(id) {
                Ok(Object::Stream(stream)) => decode_image(doc, stream),
                _ => None,
            })
            .collect();

        debug!("Found {} decodable images in document", images.len());
        images
    }

    fn image_objects(&self) -> Vec<ObjectId> {
        let Ok(doc) = self.document() else {
            return Vec::new();
        };

        doc.objects
            .iter()
            .filter(|(_, object)| match object {
                Object::Stream(stream) => is_image(&stream.dict),
                _ => false,
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Resources dictionary of a page, following `Parent` inheritance.
    fn page_resources(&self, doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
        let mut node_id = page_id;

        // Bounded walk; a malformed page tree could otherwise loop.
        for _ in 0..32 {
            let Ok(Object::Dictionary(node)) = doc.get_object(node_id) else {
                return None;
            };

            if let Ok(resources) = node.get(b"Resources") {
                if let Ok((_, Object::Dictionary(dict))) = doc.dereference(resources) {
                    return Some(dict.clone());
                }
            }

            match node.get(b"Parent") {
                Ok(Object::Reference(parent)) => node_id = *parent,
                _ => return None,
            }
        }
        None
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Utility invoices are often "protected" with an empty user password
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted)
                .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_text(&self) -> Result<String> {
        self.document()?;
        pdf_extract::extract_text_from_mem(&self.raw_data)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))
    }

    fn extract_images(&self, page: u32) -> Result<Vec<DynamicImage>> {
        let doc = self.document()?;
        let pages = doc.get_pages();
        let page_id = *pages.get(&page).ok_or(PdfError::InvalidPage(page))?;

        let mut images = Vec::new();

        if let Some(resources) = self.page_resources(doc, page_id) {
            if let Ok(xobjects) = resources.get(b"XObject") {
                if let Ok((_, Object::Dictionary(xobjects))) = doc.dereference(xobjects) {
                    for (_, reference) in xobjects.iter() {
                        if let Ok((_, Object::Stream(stream))) = doc.dereference(reference) {
                            if let Some(image) = decode_image(doc, stream) {
                                images.push(image);
                            }
                        }
                    }
                }
            }
        }

        debug!("Extracted {} images from page {}", images.len(), page);
        Ok(images)
    }
}

fn is_image(dict: &Dictionary) -> bool {
    dict.get(b"Subtype")
        .and_then(|o| o.as_name())
        .map(|name| name == b"Image")
        .unwrap_or(false)
}

fn first_filter(dict: &Dictionary) -> Option<&[u8]> {
    match dict.get(b"Filter").ok()? {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(filters) => filters.first().and_then(|o| o.as_name().ok()),
        _ => None,
    }
}

/// Decode an image XObject. Only JPEG and raw 8-bit RGB/gray are supported.
fn decode_image(doc: &Document, stream: &Stream) -> Option<DynamicImage> {
    let dict = &stream.dict;
    if !is_image(dict) {
        return None;
    }

    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;
    trace!("Image object {}x{}", width, height);

    match first_filter(dict) {
        Some(b"DCTDecode") => {
            return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
                .ok();
        }
        Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
            trace!("Skipping image with unsupported filter");
            return None;
        }
        _ => {}
    }

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        trace!("Unsupported bits per component: {}", bits);
        return None;
    }

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let pixels = width as usize * height as usize;

    match color_space {
        b"DeviceRGB" | b"RGB" if data.len() >= pixels * 3 => {
            RgbImage::from_raw(width, height, data[..pixels * 3].to_vec()).map(DynamicImage::ImageRgb8)
        }
        b"DeviceGray" | b"G" if data.len() >= pixels => {
            GrayImage::from_raw(width, height, data[..pixels].to_vec()).map(DynamicImage::ImageLuma8)
        }
        _ => {
            trace!("Could not decode image: {} bytes for {} pixels", data.len(), pixels);
            None
        }
    }
}
