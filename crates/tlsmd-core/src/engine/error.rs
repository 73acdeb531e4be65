use thiserror::Error;

use super::config::ConfigError;
use crate::core::tls::description::DescriptionError;
use crate::core::tls::fit::FitError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Chain '{0}' not found in structure")]
    ChainNotFound(char),

    #[error("TLS fit failed for group '{group}': {source}")]
    Fit {
        group: String,
        #[source]
        source: FitError,
    },

    #[error(transparent)]
    Description(#[from] DescriptionError),

    #[error("Internal logic error: {0}")]
    Internal(String),
}
