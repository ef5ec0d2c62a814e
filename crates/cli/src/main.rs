use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde::Deserialize;

use civis_ocr::{
    CardPipeline, LocalEngineConfig, NumberRule, OcrBackend, OcrError, OllamaRefiner,
    PipelineConfig, RefineConfig, Refiner, RemoteApiConfig, RemoteRecognizer, ScanOutcome,
    ThresholdPolicy,
};

const API_KEY_ENV: &str = "CIVIS_OCR_API_KEY";

/// Which OCR engine handles the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Backend {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ThresholdMode {
    Fixed,
    Adaptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum NumberFormat {
    DigitRun,
    PrefixedSerial,
}

#[derive(Parser)]
#[command(name = "civis")]
#[command(version)]
#[command(about = "Scan an ID card photo and print the extracted fields as JSON", long_about = None)]
struct Cli {
    /// Path to the ID card photo
    image: PathBuf,

    /// TOML configuration file; command-line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// OCR backend
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// `+`-joined engine language codes (e.g. fra+ara+eng)
    #[arg(short, long)]
    language: Option<String>,

    /// Binarization policy
    #[arg(long, value_enum)]
    threshold: Option<ThresholdMode>,

    /// Global cutoff for fixed thresholding (0-255)
    #[arg(long)]
    threshold_value: Option<u8>,

    /// Neighborhood size for adaptive thresholding (odd, >= 3)
    #[arg(long)]
    block_size: Option<u32>,

    /// Constant subtracted from the adaptive local mean
    #[arg(long)]
    offset: Option<i32>,

    /// Resize multiplier applied before binarization
    #[arg(long)]
    scale: Option<f32>,

    /// Document-number extraction rule
    #[arg(long, value_enum)]
    number_format: Option<NumberFormat>,

    /// Remote OCR endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Remote OCR API key (falls back to $CIVIS_OCR_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Remote request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Refine extracted fields with a local Ollama model
    #[arg(long)]
    refine: bool,

    /// Ollama server base URL
    #[arg(long)]
    ollama_url: Option<String>,

    /// Ollama model name
    #[arg(long)]
    ollama_model: Option<String>,

    /// Tesseract data directory (local backend)
    #[arg(long)]
    tessdata: Option<String>,
}

/// On-disk configuration; every section is optional and flags win.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    backend: Option<Backend>,
    pipeline: PipelineConfig,
    remote: RemoteApiConfig,
    local: LocalEngineConfig,
    refine: Option<RefineConfig>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(outcome) => {
            // JSON goes to stdout even for per-document failures; the exit
            // status is what shells should branch on.
            match serde_json::to_string_pretty(&outcome) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("civis: failed to serialize result: {e}");
                    return ExitCode::FAILURE;
                }
            }
            if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("civis: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ScanOutcome> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<FileConfig>(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => FileConfig::default(),
    };

    apply_flags(&cli, &mut config);
    config
        .pipeline
        .validate()
        .context("invalid pipeline configuration")?;

    let backend = cli.backend.or(config.backend).unwrap_or(Backend::Local);
    if backend == Backend::Remote {
        config
            .remote
            .validate()
            .context("remote backend configuration")?;
    }

    let refiner = build_refiner(&cli, &config)?;
    let recognizer = match build_recognizer(backend, &config) {
        Ok(recognizer) => recognizer,
        // Backend construction failures are document-level outcomes, not
        // usage errors: report them in the same JSON shape.
        Err(e) => return Ok(ScanOutcome::from(Err(e.into()))),
    };

    let mut pipeline = CardPipeline::new(recognizer, config.pipeline);
    if let Some(refiner) = refiner {
        pipeline = pipeline.with_refiner(refiner);
    }

    tracing::info!("Processing document: {}", cli.image.display());
    Ok(ScanOutcome::from(pipeline.process_file(&cli.image).await))
}

/// Overlay command-line flags onto the file configuration.
fn apply_flags(cli: &Cli, config: &mut FileConfig) {
    if let Some(language) = &cli.language {
        config.pipeline.languages = language.clone();
    }
    if let Some(scale) = cli.scale {
        config.pipeline.preprocess.scale_factor = scale;
    }
    if let Some(mode) = cli.threshold {
        config.pipeline.preprocess.threshold = match mode {
            ThresholdMode::Fixed => ThresholdPolicy::Fixed {
                value: civis_ocr::config::DEFAULT_THRESHOLD_VALUE,
            },
            ThresholdMode::Adaptive => ThresholdPolicy::Adaptive {
                block_size: civis_ocr::config::DEFAULT_BLOCK_SIZE,
                offset: civis_ocr::config::DEFAULT_OFFSET,
            },
        };
    }
    match &mut config.pipeline.preprocess.threshold {
        ThresholdPolicy::Fixed { value } => {
            if let Some(v) = cli.threshold_value {
                *value = v;
            }
        }
        ThresholdPolicy::Adaptive { block_size, offset } => {
            if let Some(b) = cli.block_size {
                *block_size = b;
            }
            if let Some(o) = cli.offset {
                *offset = o;
            }
        }
    }
    if let Some(format) = cli.number_format {
        config.pipeline.number_rule = match format {
            NumberFormat::DigitRun => NumberRule::DigitRun,
            NumberFormat::PrefixedSerial => NumberRule::PrefixedSerial,
        };
    }

    if let Some(endpoint) = &cli.endpoint {
        config.remote.endpoint = endpoint.clone();
    }
    if let Some(key) = &cli.api_key {
        config.remote.api_key = key.clone();
    } else if config.remote.api_key.is_empty() {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            config.remote.api_key = key;
        }
    }
    if let Some(timeout) = cli.timeout {
        config.remote.timeout_secs = timeout;
    }

    if let Some(tessdata) = &cli.tessdata {
        config.local.data_path = Some(tessdata.clone());
    }

    if let Some(url) = &cli.ollama_url {
        config.refine.get_or_insert_with(RefineConfig::default).base_url = url.clone();
    }
    if let Some(model) = &cli.ollama_model {
        config.refine.get_or_insert_with(RefineConfig::default).model = model.clone();
    }
}

fn build_refiner(cli: &Cli, config: &FileConfig) -> anyhow::Result<Option<Box<dyn Refiner>>> {
    if !cli.refine && config.refine.is_none() {
        return Ok(None);
    }
    let refine_config = config.refine.clone().unwrap_or_default();
    let refiner = OllamaRefiner::new(refine_config).context("building refinement client")?;
    Ok(Some(Box::new(refiner)))
}

fn build_recognizer(backend: Backend, config: &FileConfig) -> Result<Box<dyn OcrBackend>, OcrError> {
    match backend {
        Backend::Remote => Ok(Box::new(RemoteRecognizer::new(config.remote.clone())?)),
        Backend::Local => local_recognizer(config.local.clone()),
    }
}

#[cfg(feature = "tesseract")]
fn local_recognizer(config: LocalEngineConfig) -> Result<Box<dyn OcrBackend>, OcrError> {
    Ok(Box::new(civis_ocr::TesseractRecognizer::new(config)))
}

#[cfg(not(feature = "tesseract"))]
fn local_recognizer(_config: LocalEngineConfig) -> Result<Box<dyn OcrBackend>, OcrError> {
    Err(OcrError::NotAvailable)
}
