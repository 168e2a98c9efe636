use thiserror::Error;

/// Problems with the search configuration. Fatal for the whole run.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Failures raised while extracting listings from one source.
///
/// Only `Session` and `Browser` end an extractor's task; the others are
/// absorbed inside the extraction patterns and logged.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Browsing session unavailable: {0}")]
    Session(String),

    #[error("Timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },

    #[error("Parsing error: {field} missing in {context}")]
    Parse { field: &'static str, context: String },

    #[error("No API traffic captured after {attempts} attempts")]
    TrafficCaptureEmpty { attempts: u32 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Browser error: {0}")]
    Browser(#[from] anyhow::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScrapeError {
    pub(crate) fn parse(field: &'static str, context: impl Into<String>) -> Self {
        ScrapeError::Parse {
            field,
            context: context.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
