use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available — build with `tesseract` feature")]
    NotAvailable,
    #[error("OCR service network error: {0}")]
    Network(String),
    #[error("OCR service reported a processing failure: {0}")]
    ApiProcessing(String),
    #[error("Unexpected OCR service response: {0}")]
    Parse(String),
}

impl OcrError {
    /// Stable tag for serialized error indicators.
    pub fn kind(&self) -> &'static str {
        match self {
            OcrError::ImageDecode(_) | OcrError::Engine(_) | OcrError::NotAvailable => "engine",
            OcrError::Network(_) => "network",
            OcrError::ApiProcessing(_) => "api_processing",
            OcrError::Parse(_) => "parse",
        }
    }
}

/// Abstraction over an OCR backend.
/// Implementations accept raw PNG/JPEG image bytes plus a `+`-joined language
/// specification and return the recognized text.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    async fn recognize(&self, image_bytes: &[u8], languages: &str) -> Result<String, OcrError>;
}

#[async_trait]
impl<T: OcrBackend + ?Sized> OcrBackend for Box<T> {
    async fn recognize(&self, image_bytes: &[u8], languages: &str) -> Result<String, OcrError> {
        (**self).recognize(image_bytes, languages).await
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string — useful for unit testing the extraction pipeline
/// without requiring Tesseract or network access.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl OcrBackend for MockRecognizer {
    async fn recognize(&self, _image_bytes: &[u8], _languages: &str) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use async_trait::async_trait;
    use leptess::{LepTess, Variable};

    use super::{OcrBackend, OcrError};
    use crate::config::LocalEngineConfig;

    /// Drives the system Tesseract install through `leptess`.
    pub struct TesseractRecognizer {
        config: LocalEngineConfig,
    }

    impl TesseractRecognizer {
        pub fn new(config: LocalEngineConfig) -> Self {
            Self { config }
        }
    }

    #[async_trait]
    impl OcrBackend for TesseractRecognizer {
        async fn recognize(&self, image_bytes: &[u8], languages: &str) -> Result<String, OcrError> {
            let mut lt = LepTess::new(self.config.data_path.as_deref(), languages)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_variable(Variable::TesseditPagesegMode, &self.config.psm.to_string())
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_variable(Variable::TesseditOcrEngineMode, &self.config.oem.to_string())
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            if let Some(dpi) = self.config.dpi {
                lt.set_variable(Variable::UserDefinedDpi, &dpi.to_string())
                    .map_err(|e| OcrError::Engine(e.to_string()))?;
            }
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}
