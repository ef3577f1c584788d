pub mod extractor;
pub mod format;
pub mod ocr;
pub mod office;
pub mod pdfium;
pub mod types;
pub mod vision_ocr;

pub use extractor::*;
pub use format::*;
pub use ocr::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported format for extraction")]
    UnsupportedFormat,

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF page {page} rendering failed: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("DOCX parsing failed: {0}")]
    DocxParsing(String),

    #[error("CSV parsing failed: {0}")]
    CsvParsing(#[from] csv::Error),

    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),
}
