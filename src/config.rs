use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "RemedyLab";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_SUGGESTION_MODEL: &str = "llama3.1:8b";
pub const DEFAULT_VISION_MODEL: &str = "llava:7b";
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8470";

/// A PDF text layer with fewer trimmed characters than this is treated as scanned.
pub const SCANNED_TEXT_THRESHOLD: usize = 20;
pub const OCR_RENDER_DPI: u32 = 300;

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "remedylab=debug"
    } else {
        "remedylab=info"
    }
}

/// Which engine reads scanned pages and images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrBackend {
    Vision,
    Tesseract,
    Disabled,
}

impl OcrBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "vision" => Some(Self::Vision),
            "tesseract" => Some(Self::Tesseract),
            "none" | "off" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub ollama_url: String,
    pub suggestion_model: String,
    pub vision_model: String,
    pub generation_timeout_secs: u64,
    pub ocr_backend: OcrBackend,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("REMEDYLAB_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let bind_addr = lookup("REMEDYLAB_BIND")
            .and_then(|v| match v.parse() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!(value = %v, error = %e, "Invalid REMEDYLAB_BIND, using default");
                    None
                }
            })
            .unwrap_or_else(default_bind_addr);

        let generation_timeout_secs = lookup("REMEDYLAB_GENERATION_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_GENERATION_TIMEOUT_SECS);

        let ocr_backend = lookup("REMEDYLAB_OCR")
            .and_then(|v| OcrBackend::parse(&v))
            .unwrap_or(OcrBackend::Vision);

        Self {
            data_dir,
            bind_addr,
            ollama_url: lookup("REMEDYLAB_OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.into()),
            suggestion_model: lookup("REMEDYLAB_MODEL")
                .unwrap_or_else(|| DEFAULT_SUGGESTION_MODEL.into()),
            vision_model: lookup("REMEDYLAB_VISION_MODEL")
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.into()),
            generation_timeout_secs,
            ocr_backend,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("remedylab.db")
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Where the structured JSONL dataset is appended.
    pub fn export_dir(&self) -> PathBuf {
        self.data_dir.join("structured")
    }
}

/// `<local data dir>/remedylab`, or `./remedylab-data` when the platform has none.
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("remedylab"))
        .unwrap_or_else(|| PathBuf::from("remedylab-data"))
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8470))
}
