pub mod clean;
pub mod config;
pub mod extract;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod refine;
pub mod remote;
pub mod types;

pub use clean::clean_text;
pub use config::{
    ConfigError, LocalEngineConfig, PipelineConfig, PreprocessConfig, RefineConfig,
    RemoteApiConfig, ThresholdPolicy,
};
pub use extract::{Extractor, NumberRule};
pub use pipeline::{CardPipeline, ErrorIndicator, PipelineError, ScanOutcome};
pub use preprocess::{prepare_for_ocr, prepare_for_ocr_from_bytes, PreparedImage, PreprocessError};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError};
pub use refine::{MockRefiner, OllamaRefiner, RefineError, Refiner};
pub use remote::RemoteRecognizer;
pub use types::{FieldMap, ScanRecord};

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;
