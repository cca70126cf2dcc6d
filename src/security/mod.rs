//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (fixed-window per-address/category counters)
//!     → session.rs (credential extraction + JWT validation)
//!     → headers.rs (static security response headers)
//!
//! Protected business operations:
//!     → access.rs (feature gate)
//!         → stepup.rs (short-lived PIN credential, version-fenced)
//!         → SecurityStateStore (read-only KYC/subscription state)
//! ```
//!
//! # Design Decisions
//! - Fail closed: any error during a check resolves to deny
//! - Authorization is recomputed per request; never cached
//! - Credential failures are indistinguishable to callers (no oracle)

pub mod access;
pub mod headers;
pub mod rate_limit;
pub mod session;
pub mod stepup;

pub use access::{AccessGate, FeatureAccessResult, FeaturePolicy, RequiredAction};
pub use rate_limit::{RateCategory, RateLimiter};
pub use session::{Session, SessionAuthenticator, SessionError};
pub use stepup::StepUpManager;
