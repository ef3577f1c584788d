use serde::{Deserialize, Serialize};

use super::ExtractionError;
use crate::models::FileKind;

/// Text pulled out of an upload, with how it was obtained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedText {
    pub file_kind: FileKind,
    pub method: ExtractionMethod,
    pub text: String,
}

impl ExtractedText {
    /// Nothing usable came out of the file.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// How text was extracted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExtractionMethod {
    PdfTextLayer,
    PdfOcrFallback,
    ImageOcr,
    Docx,
    CsvTable,
    JsonPretty,
    PlainText,
    /// A format-specific extractor failed; the text is empty.
    Failed,
}

/// Raw OCR result from the engine
#[derive(Debug)]
pub struct OcrPageResult {
    pub text: String,
    pub confidence: f32,
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError>;
}

/// Text-layer access for PDFs.
pub trait PdfTextSource {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Rasterizes a single PDF page (0-based) to PNG bytes.
pub trait PdfPageRenderer {
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError>;
}
