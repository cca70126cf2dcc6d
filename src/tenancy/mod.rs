//! Tenant routing subsystem.
//!
//! # Data Flow
//! ```text
//! directory file (TOML)
//!     → directory.rs (load, watch, atomic snapshot swap)
//!     → resolver.rs (pure host/path → decision)
//!     → pipeline applies the decision (pass/rewrite/redirect/not-found)
//! ```

pub mod directory;
pub mod resolver;

pub use directory::{DirectoryStore, TenantDirectory};
pub use resolver::{resolve, ResolutionAction, ResolutionDecision};
