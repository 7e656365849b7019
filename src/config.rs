use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub tesseract_cmd: String,
    pub pdftoppm_cmd: String,
    pub language: String,
    /// Rasterization resolution for scanned PDF pages.
    pub dpi: u32,
    /// Linear contrast boost in percent (15.0 scales distance from mid-grey by 1.15).
    pub contrast_boost: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_cmd: "tesseract".to_string(),
            pdftoppm_cmd: "pdftoppm".to_string(),
            language: "eng".to_string(),
            dpi: 200,
            contrast_boost: 15.0,
        }
    }
}

impl OcrConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.tesseract_cmd.trim().is_empty(), "ocr.tesseract_cmd must not be empty");
        ensure!(!self.pdftoppm_cmd.trim().is_empty(), "ocr.pdftoppm_cmd must not be empty");
        ensure!(!self.language.trim().is_empty(), "ocr.language must not be empty");
        ensure!(self.dpi > 0, "ocr.dpi must be > 0");
        Ok(())
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub use_openrouter: bool,
    /// Overrides the provider default when set.
    pub base_url: Option<String>,
    /// Overrides the provider default when set.
    pub model: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_input_chars: usize,
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            use_openrouter: true,
            base_url: None,
            model: None,
            api_key: None,
            temperature: 0.2,
            max_input_chars: 120_000,
            timeout_secs: 120,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_input_chars > 0, "analysis.max_input_chars must be > 0");
        ensure!(
            (0.0..=2.0).contains(&self.temperature),
            "analysis.temperature must be within [0,2]"
        );
        ensure!(self.timeout_secs > 0, "analysis.timeout_secs must be > 0");
        Ok(())
    }

    pub fn effective_base_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/'),
            None if self.use_openrouter => OPENROUTER_BASE_URL,
            None => OPENAI_BASE_URL,
        }
    }

    /// OpenRouter model ids carry the vendor prefix.
    pub fn effective_model(&self) -> &str {
        match &self.model {
            Some(model) => model,
            None if self.use_openrouter => "openai/gpt-4o-mini",
            None => "gpt-4o-mini",
        }
    }

    /// Apply `OPENAI_API_KEY`/`OPENROUTER_API_KEY`, `OPENAI_MODEL` and `USE_OPENROUTER`.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(flag) = lookup("USE_OPENROUTER") {
            self.use_openrouter = matches!(flag.to_lowercase().as_str(), "true" | "1" | "yes");
        }
        if let Some(model) = lookup("OPENAI_MODEL").filter(|m| !m.trim().is_empty()) {
            self.model = Some(model);
        }
        let key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .or_else(|| lookup("OPENROUTER_API_KEY").filter(|k| !k.trim().is_empty()));
        if key.is_some() {
            self.api_key = key;
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("use_openrouter", &self.use_openrouter)
            .field("base_url", &self.effective_base_url())
            .field("model", &self.effective_model())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_input_chars", &self.max_input_chars)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub ocr: OcrConfig,
    pub analysis: AnalysisConfig,
}

impl ReviewConfig {
    /// Load from an optional JSON file, then layer environment overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                serde_json::from_str::<ReviewConfig>(&raw)
                    .with_context(|| format!("Failed to parse config JSON: {:?}", path))?
            }
            None => ReviewConfig::default(),
        };
        config.analysis.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.ocr.validate()?;
        self.analysis.validate()?;
        Ok(())
    }
}

impl fmt::Display for ReviewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
