use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("No response for URL: {0}")]
    Unavailable(String),
}

/// The markup (or JSON) no longer has the shape an adapter expects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Missing element: {0}")]
    MissingElement(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {value:?}")]
    InvalidValue { field: String, value: String },

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Expected {expected} content")]
    UnexpectedFormat { expected: &'static str },
}

impl ExtractError {
    pub fn missing(what: impl Into<String>) -> Self {
        ExtractError::MissingElement(what.into())
    }

    pub fn invalid(field: impl Into<String>, value: impl Into<String>) -> Self {
        ExtractError::InvalidValue {
            field: field.into(),
            value: value.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    #[error("Invalid archive file {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Note service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Note service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to render note: {0}")]
    Render(#[from] minijinja::Error),

    #[error("Unexpected note service response: {0}")]
    InvalidResponse(String),

    #[error("Recipe {0} has no cooking name")]
    Untitled(String),

    #[error("Failed to write export: {0}")]
    Export(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown site: {0}")]
    UnknownSite(String),

    #[error("Notes credential unavailable: {0}")]
    MissingCredential(String),

    #[error("Failed to prepare cache directory: {0}")]
    CacheDir(#[from] StoreError),
}
