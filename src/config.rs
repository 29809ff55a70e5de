//! Environment-driven configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PRIMARY_RANGE: &str = "Sheet1!A1:Z1000";
pub const DEFAULT_SECONDARY_RANGE: &str = "Sheet2!A1:Z1000";
pub const DEFAULT_LOGIC_RANGE: &str = "Logica indicadores!A1:B29";
pub const DEFAULT_SUMMARY_CELL: &str = "Filter!B1";
pub const DEFAULT_PREVIEW_ROWS: usize = 24;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("variável obrigatória ausente: {0}")]
    Missing(&'static str),
    #[error("valor inválido para {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Which generative backend answers fallback questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Groq,
    Anthropic,
}

impl AiProvider {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "groq" => Some(AiProvider::Groq),
            "anthropic" | "claude" => Some(AiProvider::Anthropic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub spreadsheet_id: Option<String>,
    pub sheets_api_key: Option<String>,
    pub sheets_access_token: Option<String>,
    pub primary_range: String,
    pub secondary_range: String,
    pub logic_range: String,
    pub summary_cell: String,
    pub ai_provider: AiProvider,
    pub groq_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub preview_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            sheets_api_key: None,
            sheets_access_token: None,
            primary_range: DEFAULT_PRIMARY_RANGE.to_string(),
            secondary_range: DEFAULT_SECONDARY_RANGE.to_string(),
            logic_range: DEFAULT_LOGIC_RANGE.to_string(),
            summary_cell: DEFAULT_SUMMARY_CELL.to_string(),
            ai_provider: AiProvider::default(),
            groq_api_key: None,
            anthropic_api_key: None,
            log_dir: None,
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Config::default();

        let ai_provider = match get("AI_PROVIDER") {
            Some(value) => AiProvider::parse(&value).ok_or(ConfigError::Invalid {
                name: "AI_PROVIDER",
                value,
            })?,
            None => defaults.ai_provider,
        };

        let preview_rows = match get("SHEETBOT_PREVIEW_ROWS") {
            Some(value) => match value.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "SHEETBOT_PREVIEW_ROWS",
                        value,
                    })
                }
            },
            None => defaults.preview_rows,
        };

        Ok(Self {
            spreadsheet_id: get("GOOGLE_SHEET_ID"),
            sheets_api_key: get("GOOGLE_SHEETS_API_KEY"),
            sheets_access_token: get("GOOGLE_SHEETS_ACCESS_TOKEN"),
            primary_range: get("GOOGLE_SHEET_RANGE").unwrap_or(defaults.primary_range),
            secondary_range: get("GOOGLE_SHEET_RANGE_2").unwrap_or(defaults.secondary_range),
            logic_range: get("GOOGLE_SHEET_LOGIC_RANGE").unwrap_or(defaults.logic_range),
            summary_cell: get("GOOGLE_SHEET_SUMMARY_CELL").unwrap_or(defaults.summary_cell),
            ai_provider,
            groq_api_key: get("GROQ_API_KEY"),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            log_dir: get("SHEETBOT_LOG_DIR").map(PathBuf::from),
            preview_rows,
        })
    }

    /// Check that the spreadsheet can be reached. Generative keys are optional.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spreadsheet_id.is_none() {
            return Err(ConfigError::Missing("GOOGLE_SHEET_ID"));
        }
        if self.sheets_api_key.is_none() && self.sheets_access_token.is_none() {
            return Err(ConfigError::Missing("GOOGLE_SHEETS_API_KEY"));
        }
        Ok(())
    }

    /// API key for the selected generative backend, if set.
    pub fn ai_api_key(&self) -> Option<&str> {
        match self.ai_provider {
            AiProvider::Groq => self.groq_api_key.as_deref(),
            AiProvider::Anthropic => self.anthropic_api_key.as_deref(),
        }
    }
}
