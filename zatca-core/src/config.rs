//! Configuration and environment selection.
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Environment variable consulted by [`Config::from_env`].
pub const ENV_VAR: &str = "ZATCA_ENV";

/// Largest base64 QR payload ZATCA accepts.
pub const DEFAULT_QR_MAX_LEN: usize = 700;

/// ZATCA environment selection.
/// This determines the certificate template name embedded in generated CSRs.
/// - NonProduction: what ZATCA refers to as the "Integration Sandbox".
/// - Simulation: the "Simulation Test Environment".
/// - Production: the live production environment.
/// # Examples
/// ```rust
/// use std::str::FromStr;
/// use zatca_core::config::EnvironmentType;
///
/// let env = EnvironmentType::from_str("simulation")?;
/// assert_eq!(env, EnvironmentType::Simulation);
/// # Ok::<(), zatca_core::config::EnvironmentParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentType {
    NonProduction,
    Simulation,
    Production,
}

/// Error returned when parsing an [`EnvironmentType`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentParseError {
    #[error("invalid environment type: {input}")]
    Invalid { input: String },
}

impl FromStr for EnvironmentType {
    type Err = EnvironmentParseError;
    fn from_str(env: &str) -> Result<EnvironmentType, EnvironmentParseError> {
        match env.trim().to_ascii_lowercase().as_str() {
            "non_production" => Ok(EnvironmentType::NonProduction),
            "simulation" => Ok(EnvironmentType::Simulation),
            "production" => Ok(EnvironmentType::Production),
            _ => Err(EnvironmentParseError::Invalid {
                input: env.to_string(),
            }),
        }
    }
}

impl EnvironmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentType::NonProduction => "non_production",
            EnvironmentType::Simulation => "simulation",
            EnvironmentType::Production => "production",
        }
    }

    /// Certificate template name requested in the CSR.
    pub const fn template_name(&self) -> &'static str {
        match self {
            EnvironmentType::NonProduction => "TSTZATCA-Code-Signing",
            EnvironmentType::Simulation => "PREZATCA-Code-Signing",
            EnvironmentType::Production => "ZATCA-Code-Signing",
        }
    }
}

impl std::fmt::Display for EnvironmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings shared by CSR generation and the signing pipeline.
///
/// # Examples
/// ```rust
/// use zatca_core::config::{Config, EnvironmentType};
///
/// let config = Config::new(EnvironmentType::Simulation);
/// assert_eq!(config.qr_max_len(), 700);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    env: EnvironmentType,
    qr_max_len: usize,
}

impl Config {
    pub fn new(env: EnvironmentType) -> Self {
        Self {
            env,
            qr_max_len: DEFAULT_QR_MAX_LEN,
        }
    }

    pub fn with_qr_max_len(mut self, qr_max_len: usize) -> Self {
        self.qr_max_len = qr_max_len;
        self
    }

    /// Reads the environment from `ZATCA_ENV`, falling back to the default when unset.
    pub fn from_env() -> Result<Self, EnvironmentParseError> {
        match std::env::var(ENV_VAR) {
            Ok(value) => Ok(Self::new(value.parse()?)),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn env(&self) -> EnvironmentType {
        self.env
    }

    pub fn qr_max_len(&self) -> usize {
        self.qr_max_len
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(EnvironmentType::NonProduction)
    }
}
