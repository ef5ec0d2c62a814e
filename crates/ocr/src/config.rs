use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extract::NumberRule;

/// Default `+`-joined language specification handed to OCR backends.
pub const DEFAULT_LANGUAGES: &str = "fra+ara+eng";

/// Public endpoint of the hosted OCR service the remote backend speaks to.
pub const OCR_SPACE_ENDPOINT: &str = "https://api.ocr.space/parse/image";

pub const DEFAULT_THRESHOLD_VALUE: u8 = 150;
pub const DEFAULT_BLOCK_SIZE: u32 = 11;
pub const DEFAULT_OFFSET: i32 = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("scale_factor must be a positive finite number, got {0}")]
    ScaleFactor(f32),
    #[error("adaptive block_size must be an odd integer >= 3, got {0}")]
    BlockSize(u32),
    #[error("remote backend requires a non-empty api_key")]
    MissingApiKey,
}

/// How the grayscale image is binarized before OCR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Global cutoff: pixels at or above `value` become white, the rest black.
    Fixed {
        #[serde(default = "default_threshold_value")]
        value: u8,
    },
    /// Per-pixel cutoff derived from a Gaussian-weighted neighborhood mean
    /// over a `block_size` window, minus `offset`.
    Adaptive {
        #[serde(default = "default_block_size")]
        block_size: u32,
        #[serde(default = "default_offset")]
        offset: i32,
    },
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        ThresholdPolicy::Fixed {
            value: DEFAULT_THRESHOLD_VALUE,
        }
    }
}

fn default_threshold_value() -> u8 {
    DEFAULT_THRESHOLD_VALUE
}

fn default_block_size() -> u32 {
    DEFAULT_BLOCK_SIZE
}

fn default_offset() -> i32 {
    DEFAULT_OFFSET
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Resize multiplier applied before binarization; 1.0 disables resizing.
    pub scale_factor: f32,
    pub threshold: ThresholdPolicy,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            threshold: ThresholdPolicy::default(),
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(ConfigError::ScaleFactor(self.scale_factor));
        }
        if let ThresholdPolicy::Adaptive { block_size, .. } = self.threshold {
            if block_size < 3 || block_size % 2 == 0 {
                return Err(ConfigError::BlockSize(block_size));
            }
        }
        Ok(())
    }
}

/// Knobs shared by every scan regardless of backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `+`-joined engine language codes passed through to the OCR backend.
    pub languages: String,
    pub preprocess: PreprocessConfig,
    /// Which document-number rule the extractor applies.
    pub number_rule: NumberRule,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            preprocess: PreprocessConfig::default(),
            number_rule: NumberRule::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.preprocess.validate()
    }
}

/// Settings for the hosted-API backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteApiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout_secs: u64,
    /// Ask the service for word-overlay geometry; the pipeline never reads it.
    pub overlay: bool,
}

impl Default for RemoteApiConfig {
    fn default() -> Self {
        Self {
            endpoint: OCR_SPACE_ENDPOINT.to_string(),
            api_key: String::new(),
            timeout_secs: 30,
            overlay: false,
        }
    }
}

impl RemoteApiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }
}

/// Settings for the local Tesseract backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalEngineConfig {
    /// Tesseract data directory; `None` defers to the system default.
    pub data_path: Option<String>,
    /// Page segmentation mode (6 = single uniform block of text).
    pub psm: u8,
    /// Engine mode (3 = default, legacy + LSTM).
    pub oem: u8,
    /// Source DPI hint for scans that carry no resolution metadata.
    pub dpi: Option<u32>,
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            psm: 6,
            oem: 3,
            dpi: Some(300),
        }
    }
}

/// Settings for the optional LLM refinement step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama2".to_string(),
            timeout_secs: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.languages, "fra+ara+eng");
        assert_eq!(config.preprocess.scale_factor, 1.0);
        assert_eq!(
            config.preprocess.threshold,
            ThresholdPolicy::Fixed { value: 150 }
        );
        assert_eq!(config.number_rule, NumberRule::DigitRun);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_document_deserializes_to_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.languages, DEFAULT_LANGUAGES);
    }

    #[test]
    fn threshold_mode_tag_selects_variant() {
        let policy: ThresholdPolicy =
            serde_json::from_str(r#"{"mode": "adaptive"}"#).unwrap();
        assert_eq!(
            policy,
            ThresholdPolicy::Adaptive {
                block_size: 11,
                offset: 2
            }
        );

        let policy: ThresholdPolicy =
            serde_json::from_str(r#"{"mode": "fixed", "value": 99}"#).unwrap();
        assert_eq!(policy, ThresholdPolicy::Fixed { value: 99 });
    }

    #[test]
    fn zero_or_negative_scale_factor_rejected() {
        for bad in [0.0f32, -1.5, f32::NAN, f32::INFINITY] {
            let config = PreprocessConfig {
                scale_factor: bad,
                threshold: ThresholdPolicy::default(),
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::ScaleFactor(_))
            ));
        }
    }

    #[test]
    fn even_or_tiny_block_size_rejected() {
        for bad in [0u32, 1, 2, 4, 10] {
            let config = PreprocessConfig {
                scale_factor: 1.0,
                threshold: ThresholdPolicy::Adaptive {
                    block_size: bad,
                    offset: 2,
                },
            };
            assert!(matches!(config.validate(), Err(ConfigError::BlockSize(_))));
        }
        let config = PreprocessConfig {
            scale_factor: 1.0,
            threshold: ThresholdPolicy::Adaptive {
                block_size: 11,
                offset: 2,
            },
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn remote_config_requires_api_key() {
        let config = RemoteApiConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingApiKey)
        ));

        let config = RemoteApiConfig {
            api_key: "helloworld".to_string(),
            ..RemoteApiConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.endpoint, OCR_SPACE_ENDPOINT);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn local_engine_defaults_hint_dpi() {
        let config = LocalEngineConfig::default();
        assert_eq!(config.psm, 6);
        assert_eq!(config.oem, 3);
        assert_eq!(config.dpi, Some(300));
    }
}
