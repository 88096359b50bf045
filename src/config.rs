use crate::error::ConfigError;
use std::{collections::HashMap, fmt, path::Path};

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const API_BASE_VAR: &str = "GEMINI_API_BASE";
pub const MODEL_VAR: &str = "GEMINI_MODEL";

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// API key for the generation endpoint. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Settings for the Gemini client, loaded once at startup.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub credential: Credential,
    pub api_base: String,
    pub model: String,
}

impl GeminiConfig {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn endpoint(&self) -> String {
        let model = self.model.trim();
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    /// Reads the process environment, falling back to `.env` in `dir`.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let dotenv = load_dotenv_map(dir)?;
        Self::from_lookup(|key| {
            non_empty_env(key).or_else(|| {
                dotenv
                    .get(key)
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
        })
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let credential = lookup(API_KEY_VAR)
            .map(Credential::new)
            .ok_or(ConfigError::MissingCredential { var: API_KEY_VAR })?;

        let mut config = Self::new(credential);
        if let Some(api_base) = lookup(API_BASE_VAR) {
            config = config.with_api_base(api_base);
        }
        if let Some(model) = lookup(MODEL_VAR) {
            config.model = model;
        }

        log::debug!(
            "Loaded Gemini config: base={}, model={}",
            config.api_base,
            config.model
        );
        Ok(config)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn load_dotenv_map(dir: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let path = dir.join(".env");
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Dotenv {
        path: path.clone(),
        source,
    })?;
    log::debug!("Read settings from {}", path.display());
    Ok(parse_dotenv(&raw))
}

pub(crate) fn parse_dotenv(raw: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for line in raw.lines() {
        let mut line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("export ") {
            line = rest.trim_start();
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim();
        let quoted = value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')));
        let value = if quoted {
            &value[1..value.len() - 1]
        } else {
            value.split_once(" #").map_or(value, |(before, _)| before.trim_end())
        };
        out.insert(key.to_string(), value.to_string());
    }
    out
}
