//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EdgeConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the hot-reloaded artifact is the
//!   tenant directory (see `tenancy::directory`), not the config itself
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AccessConfig, AssetConfig, EdgeConfig, Environment, FeatureRule, ListenerConfig,
    RateLimitConfig, SecurityHeadersConfig, SessionConfig, StepUpConfig, TenancyConfig,
    UpstreamConfig,
};
