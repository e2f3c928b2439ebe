use assay_domain::ConfigurationError;
use thiserror::Error;

/// Failure to produce a usable configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file or environment variable could not be read or parsed
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// The merged configuration is inconsistent
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigurationError),
}
