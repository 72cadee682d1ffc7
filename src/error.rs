use std::path::PathBuf;

use thiserror::Error;

/// Failures of a round trip through the host's command channel.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unable to reach the host while invoking `{command}`: {source}")]
    Transport {
        command: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("host rejected `{command}`: {message}")]
    Rejected {
        command: &'static str,
        message: String,
    },

    #[error("unable to decode the response of `{command}`: {source}")]
    Decode {
        command: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("event stream closed: {0}")]
    EventStream(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to locate a home directory for the app")]
    NoProjectDir,

    #[error("unable to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {path:?} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config file {path:?}: `{field}` {reason}")]
    Invalid {
        path: PathBuf,
        field: &'static str,
        reason: &'static str,
    },

    #[error("invalid gateway url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unable to load {what}: {message}")]
    Load { what: &'static str, message: String },

    #[error("unable to format heatmap: {0}")]
    Format(#[from] std::fmt::Error),
}
