pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{
    Config, ConfigLoader, ConfigValidator, GatewayConfig, LocationSeed, StoreBackend, StoreConfig,
};
pub use error::{DeskcalError, DomainError, InfraError};
