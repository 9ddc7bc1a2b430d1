//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → UserConfig (validated, immutable)
//!     → shared via Arc with the launcher and the RPC server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the daemon never writes it back
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{DaemonConfig, ObservabilityConfig, ProfileConfig, TelemetryConfig, UserConfig};
pub use validation::{validate_config, ValidationError};
