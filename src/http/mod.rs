//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer ordering)
//!     → request.rs (request id)
//!     → pipeline.rs (tenant resolution, headers, rate limit, session)
//!     → control.rs (gate-owned endpoints)
//!       or upstream forward (server.rs)
//! ```

pub mod control;
pub mod pipeline;
pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{AppState, EdgeServer};
