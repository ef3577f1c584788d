use super::types::{OcrEngine, OcrPageResult};
use super::ExtractionError;

/// Local Tesseract OCR through leptess.
/// Only available when compiled with the `tesseract` feature flag.
#[cfg(feature = "tesseract")]
pub struct TesseractOcr {
    language: String,
}

#[cfg(feature = "tesseract")]
impl TesseractOcr {
    /// Verify Tesseract initializes for `language` (e.g. "eng") before accepting work.
    pub fn new(language: &str) -> Result<Self, ExtractionError> {
        leptess::LepTess::new(None, language).map_err(|e| {
            ExtractionError::OcrInit(format!(
                "Failed to initialize Tesseract with language '{language}': {e}"
            ))
        })?;
        Ok(Self {
            language: language.to_string(),
        })
    }
}

#[cfg(feature = "tesseract")]
impl OcrEngine for TesseractOcr {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let mut lt = leptess::LepTess::new(None, &self.language)
            .map_err(|e| ExtractionError::OcrInit(e.to_string()))?;

        // leptonica decodes the encoded image itself
        lt.set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::OcrProcessing(format!("Failed to load image: {e}")))?;

        let text = lt
            .get_utf8_text()
            .map_err(|e| ExtractionError::OcrProcessing(e.to_string()))?;
        let confidence = lt.mean_text_conf().max(0) as f32 / 100.0;

        tracing::debug!(
            chars = text.len(),
            confidence,
            "Tesseract OCR complete"
        );

        Ok(OcrPageResult { text, confidence })
    }
}

/// Stand-in used when no OCR backend is configured. Every call fails, which
/// the extractor turns into empty text for scanned inputs.
pub struct DisabledOcr;

impl OcrEngine for DisabledOcr {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        Err(ExtractionError::OcrInit("no OCR backend configured".into()))
    }
}

/// Mock OCR engine for unit testing without Tesseract.
pub struct MockOcrEngine {
    pub text: String,
    pub confidence: f32,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        Ok(OcrPageResult {
            text: self.text.clone(),
            confidence: self.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_configured_text() {
        let engine = MockOcrEngine::new("Hemoglobin 11.2", 0.9);
        let result = engine.ocr_image(&[]).unwrap();
        assert_eq!(result.text, "Hemoglobin 11.2");
        assert!((result.confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn disabled_engine_fails_with_init_error() {
        assert!(matches!(
            DisabledOcr.ocr_image(&[1, 2, 3]),
            Err(ExtractionError::OcrInit(_))
        ));
    }
}
