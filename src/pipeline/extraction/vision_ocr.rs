//! OCR through a vision-capable Ollama model.
//!
//! The page image is sent base64-encoded to `/api/chat`; the model is asked
//! for a plain transcription with table rows kept on one line.

use std::sync::Arc;

use base64::Engine as _;

use super::types::{OcrEngine, OcrPageResult};
use super::ExtractionError;
use crate::ollama::VisionClient;

const SYSTEM_PROMPT: &str = "\
You are a medical report transcriber. Reproduce ALL visible text from the \
provided image exactly as printed. Do not summarise, interpret or add commentary.";

const USER_PROMPT: &str = "\
Transcribe every line of this lab report. Keep each table row on a single line \
with cells separated by ' | '. Keep test names and numeric values exactly as printed.";

pub struct VisionOcr {
    client: Arc<dyn VisionClient + Send + Sync>,
    model: String,
}

impl VisionOcr {
    pub fn new(client: Arc<dyn VisionClient + Send + Sync>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

impl OcrEngine for VisionOcr {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let _span = tracing::info_span!(
            "vision_ocr",
            model = %self.model,
            image_size = image_bytes.len(),
        )
        .entered();
        let start = std::time::Instant::now();

        let images = vec![base64::engine::general_purpose::STANDARD.encode(image_bytes)];
        let response = self
            .client
            .chat_with_images(&self.model, USER_PROMPT, &images, Some(SYSTEM_PROMPT))
            .map_err(|e| ExtractionError::OcrProcessing(format!("Vision OCR failed: {e}")))?;

        let text = strip_code_fence(&response).to_string();
        let confidence = length_confidence(&text);

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = text.len(),
            confidence,
            "Vision OCR complete"
        );

        Ok(OcrPageResult { text, confidence })
    }
}

/// Models sometimes wrap the transcription in a markdown fence.
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Vision models report no per-word confidence; estimate it from output length.
fn length_confidence(text: &str) -> f32 {
    match text.len() {
        0 => 0.0,
        1..=49 => 0.2,
        50..=199 => 0.4,
        200..=499 => 0.6,
        _ => 0.8,
    }
}
