//! Edge request gate for a multi-tenant commerce platform.
//!
//! Every inbound request passes through the gate before any business
//! handler runs: tenant resolution, security headers, fixed-window rate
//! limiting, and session protection, in that order, short-circuiting on
//! the first rejecting stage. Protected business operations separately
//! consult the feature access gate, which layers step-up (PIN)
//! credentials, KYC status, and subscription status.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod tenancy;

pub use config::schema::EdgeConfig;
pub use http::EdgeServer;
pub use lifecycle::Shutdown;
