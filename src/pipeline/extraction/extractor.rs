use crate::config::{OCR_RENDER_DPI, SCANNED_TEXT_THRESHOLD};
use crate::models::FileKind;

use super::office::{csv_text, docx_text, json_text, plain_text};
use super::types::{
    ExtractedText, ExtractionMethod, OcrEngine, PdfPageRenderer, PdfTextSource,
};
use super::ExtractionError;

/// Converts uploaded bytes into plain text.
///
/// Only an unsupported format is an error. Every other failure is logged and
/// degrades to empty text so the caller can decide what "nothing" means.
pub struct TextExtractor {
    ocr_engine: Box<dyn OcrEngine + Send + Sync>,
    pdf_text: Box<dyn PdfTextSource + Send + Sync>,
    pdf_renderer: Box<dyn PdfPageRenderer + Send + Sync>,
}

impl TextExtractor {
    pub fn new(
        ocr_engine: Box<dyn OcrEngine + Send + Sync>,
        pdf_text: Box<dyn PdfTextSource + Send + Sync>,
        pdf_renderer: Box<dyn PdfPageRenderer + Send + Sync>,
    ) -> Self {
        Self {
            ocr_engine,
            pdf_text,
            pdf_renderer,
        }
    }

    pub fn extract(&self, bytes: &[u8], kind: FileKind) -> Result<ExtractedText, ExtractionError> {
        tracing::debug!(file_kind = %kind, size = bytes.len(), "Starting text extraction");

        let (method, result) = match kind {
            FileKind::Pdf => return Ok(self.extract_pdf(bytes)),
            FileKind::Image => (
                ExtractionMethod::ImageOcr,
                self.ocr_engine.ocr_image(bytes).map(|page| page.text),
            ),
            FileKind::Docx => (ExtractionMethod::Docx, docx_text(bytes)),
            FileKind::Csv => (ExtractionMethod::CsvTable, csv_text(bytes)),
            FileKind::Json => (ExtractionMethod::JsonPretty, json_text(bytes)),
            FileKind::Text => (ExtractionMethod::PlainText, Ok(plain_text(bytes))),
            FileKind::Unsupported => return Err(ExtractionError::UnsupportedFormat),
        };

        Ok(match result {
            Ok(text) => ExtractedText {
                file_kind: kind,
                method,
                text,
            },
            Err(e) => {
                tracing::warn!(file_kind = %kind, error = %e, "Extraction failed, continuing with empty text");
                failed(kind)
            }
        })
    }

    /// Text layer first; a near-empty layer means a scanned page, so OCR page 1.
    fn extract_pdf(&self, bytes: &[u8]) -> ExtractedText {
        let layer = match self.pdf_text.extract_text(bytes) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "PDF text layer unreadable");
                String::new()
            }
        };

        let layer_chars = layer.trim().chars().count();
        if layer_chars >= SCANNED_TEXT_THRESHOLD {
            return ExtractedText {
                file_kind: FileKind::Pdf,
                method: ExtractionMethod::PdfTextLayer,
                text: layer,
            };
        }

        tracing::info!(
            layer_chars,
            threshold = SCANNED_TEXT_THRESHOLD,
            "PDF text layer too short, falling back to OCR"
        );

        let ocr = self
            .pdf_renderer
            .render_page(bytes, 0, OCR_RENDER_DPI)
            .and_then(|png| self.ocr_engine.ocr_image(&png));

        match ocr {
            Ok(page) if !page.text.trim().is_empty() => {
                tracing::debug!(chars = page.text.len(), confidence = page.confidence, "PDF OCR fallback complete");
                ExtractedText {
                    file_kind: FileKind::Pdf,
                    method: ExtractionMethod::PdfOcrFallback,
                    text: page.text,
                }
            }
            Ok(_) => {
                tracing::warn!(layer_chars, "PDF OCR fallback returned no text");
                short_layer_or_failed(layer, layer_chars)
            }
            Err(e) => {
                tracing::warn!(error = %e, "PDF OCR fallback failed");
                short_layer_or_failed(layer, layer_chars)
            }
        }
    }
}

/// Whatever the text layer held is better than nothing once OCR has nothing.
fn short_layer_or_failed(layer: String, layer_chars: usize) -> ExtractedText {
    if layer_chars > 0 {
        ExtractedText {
            file_kind: FileKind::Pdf,
            method: ExtractionMethod::PdfTextLayer,
            text: layer,
        }
    } else {
        failed(FileKind::Pdf)
    }
}

fn failed(kind: FileKind) -> ExtractedText {
    ExtractedText {
        file_kind: kind,
        method: ExtractionMethod::Failed,
        text: String::new(),
    }
}
