pub mod api;
pub mod config;
pub mod db;
pub mod export;
pub mod models;
pub mod ollama;
pub mod pipeline;
pub mod workflow;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, OcrBackend};
use crate::ollama::OllamaClient;
use crate::pipeline::extraction::pdfium::PdfiumEngine;
use crate::pipeline::extraction::vision_ocr::VisionOcr;
use crate::pipeline::extraction::{DisabledOcr, OcrEngine, TextExtractor};
use crate::pipeline::suggestion::OllamaSuggestionGenerator;
use crate::pipeline::IntakePipeline;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Wire the production pipeline: PDFium, the configured OCR backend and
/// Ollama-backed suggestions.
///
/// Creates blocking HTTP clients, so call it outside any async runtime.
pub fn build_pipeline(config: &AppConfig) -> Result<IntakePipeline, ollama::LlmError> {
    let client = Arc::new(OllamaClient::new(
        &config.ollama_url,
        config.generation_timeout_secs,
    )?);

    if let Err(e) = PdfiumEngine::new() {
        tracing::warn!(error = %e, "PDFium not loadable, PDF uploads will fail extraction");
    }

    let extractor = TextExtractor::new(
        ocr_engine(config, client.clone()),
        Box::new(PdfiumEngine),
        Box::new(PdfiumEngine),
    );
    let generator = Arc::new(OllamaSuggestionGenerator::new(
        client,
        &config.suggestion_model,
    ));

    Ok(IntakePipeline::new(extractor, generator, config.upload_dir())
        .with_export(config.export_dir().join(export::EXPORT_FILE_NAME)))
}

fn ocr_engine(config: &AppConfig, client: Arc<OllamaClient>) -> Box<dyn OcrEngine + Send + Sync> {
    match config.ocr_backend {
        OcrBackend::Vision => {
            tracing::info!(model = %config.vision_model, "OCR via Ollama vision model");
            Box::new(VisionOcr::new(client, &config.vision_model))
        }
        OcrBackend::Tesseract => tesseract_engine(),
        OcrBackend::Disabled => {
            tracing::info!("OCR disabled, scanned uploads will fail extraction");
            Box::new(DisabledOcr)
        }
    }
}

#[cfg(feature = "tesseract")]
fn tesseract_engine() -> Box<dyn OcrEngine + Send + Sync> {
    match pipeline::extraction::TesseractOcr::new("eng") {
        Ok(engine) => Box::new(engine),
        Err(e) => {
            tracing::warn!(error = %e, "Tesseract unavailable, OCR disabled");
            Box::new(DisabledOcr)
        }
    }
}

#[cfg(not(feature = "tesseract"))]
fn tesseract_engine() -> Box<dyn OcrEngine + Send + Sync> {
    tracing::warn!("Built without the `tesseract` feature, OCR disabled");
    Box::new(DisabledOcr)
}
