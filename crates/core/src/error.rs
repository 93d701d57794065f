//! deskcal Error Types
//!
//! This module defines a layered error hierarchy:
//! - `DomainError`: Configuration errors
//! - `InfraError`: Infrastructure errors (IO, serialization, network, storage)
//! - `DeskcalError`: Top-level error that wraps both categories

use std::fmt;

/// Domain-level errors representing business logic failures
#[derive(Debug)]
pub enum DomainError {
    /// Configuration file not found at the specified path
    ConfigNotFound { path: String },
    /// Configuration validation failed
    ConfigInvalid { field: String, reason: String },
    /// Configuration parsing failed
    ConfigParse { source: String },
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigNotFound { path } => write!(f, "Config not found: {}", path),
            Self::ConfigInvalid { field, reason } => {
                write!(f, "Config invalid [{}]: {}", field, reason)
            }
            Self::ConfigParse { source } => write!(f, "Config parse error: {}", source),
        }
    }
}

impl std::error::Error for DomainError {}

/// Infrastructure-level errors representing external system failures
#[derive(Debug)]
pub enum InfraError {
    /// IO operation failed
    Io(std::io::Error),
    /// JSON serialization/deserialization failed
    Json(serde_json::Error),
    /// YAML serialization/deserialization failed
    Yaml(serde_yml::Error),
    /// Persistent store failed
    Storage { reason: String },
    /// Network listener or socket failed
    Network { addr: String, reason: String },
}

impl fmt::Display for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Json(err) => write!(f, "JSON error: {}", err),
            Self::Yaml(err) => write!(f, "YAML error: {}", err),
            Self::Storage { reason } => write!(f, "Storage error: {}", reason),
            Self::Network { addr, reason } => write!(f, "Network error [{}]: {}", addr, reason),
        }
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Yaml(e) => Some(e),
            Self::Storage { .. } | Self::Network { .. } => None,
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<serde_yml::Error> for InfraError {
    fn from(err: serde_yml::Error) -> Self {
        Self::Yaml(err)
    }
}

/// Top-level error type for deskcal
///
/// Wraps both domain and infrastructure errors so the binary has a single
/// error type while callers can still match on the category.
#[derive(Debug)]
pub enum DeskcalError {
    /// Business logic error
    Domain(DomainError),
    /// Infrastructure/external system error
    Infra(InfraError),
}

impl fmt::Display for DeskcalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(e) => write!(f, "{}", e),
            Self::Infra(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DeskcalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Domain(e) => Some(e),
            Self::Infra(e) => Some(e),
        }
    }
}

impl From<DomainError> for DeskcalError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<InfraError> for DeskcalError {
    fn from(err: InfraError) -> Self {
        Self::Infra(err)
    }
}

// Convenience conversions from infrastructure error sources
impl From<std::io::Error> for DeskcalError {
    fn from(err: std::io::Error) -> Self {
        Self::Infra(InfraError::Io(err))
    }
}

impl From<serde_json::Error> for DeskcalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Infra(InfraError::Json(err))
    }
}

impl From<serde_yml::Error> for DeskcalError {
    fn from(err: serde_yml::Error) -> Self {
        Self::Infra(InfraError::Yaml(err))
    }
}

impl DeskcalError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigNotFound { path: path.into() })
    }

    pub fn config_parse_error(source: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigParse {
            source: source.into(),
        })
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        })
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Infra(InfraError::Storage {
            reason: reason.into(),
        })
    }

    pub fn network(addr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Infra(InfraError::Network {
            addr: addr.into(),
            reason: reason.into(),
        })
    }
}
