use thiserror::Error;

use crate::literal::LiteralError;

/// Errors that can occur while configuring or running metadata extraction
#[derive(Error, Debug)]
pub enum MetadataError {
    /// Unrecognized extraction mode
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Fragment text could not be parsed as an object literal
    #[error("Failed to parse metadata fragment {fragment:?} on {element}: {source}")]
    Parse {
        element: String,
        fragment: String,
        #[source]
        source: LiteralError,
    },

    /// Invalid CSS selector passed to a document-level extraction
    #[error("Invalid selector: {0}")]
    Selector(String),

    /// Failed to load layered configuration
    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
}
