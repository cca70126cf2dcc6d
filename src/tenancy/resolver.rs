//! Tenant resolution logic.
//!
//! # Responsibilities
//! - Map an inbound host/path to a routing decision before anything
//!   else runs: pass through, rewrite, redirect, or store-not-found
//! - Never treat reserved platform names as tenant lookups
//!
//! # Design Decisions
//! - Pure function of its inputs: the directory snapshot and config are
//!   injected, never fetched, so the whole truth table is unit-testable
//! - Host matching is case-insensitive, port suffixes are stripped
//! - No regex; prefix and suffix checks keep matching O(n)

use crate::config::schema::{AssetConfig, Environment, TenancyConfig};
use crate::tenancy::directory::TenantDirectory;

/// What the pipeline should do with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionAction {
    /// Forward unchanged.
    Pass,
    /// Rewrite the path and forward.
    Rewrite,
    /// Answer with a redirect.
    Redirect,
    /// Unknown store; rewrite to the store-not-found page.
    NotFound,
}

impl ResolutionAction {
    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionAction::Pass => "pass",
            ResolutionAction::Rewrite => "rewrite",
            ResolutionAction::Redirect => "redirect",
            ResolutionAction::NotFound => "not_found",
        }
    }
}

/// Routing decision for one request. Created fresh per request,
/// consumed once by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionDecision {
    pub action: ResolutionAction,
    pub destination: Option<String>,
}

impl ResolutionDecision {
    pub fn pass() -> Self {
        Self {
            action: ResolutionAction::Pass,
            destination: None,
        }
    }

    pub fn rewrite(destination: impl Into<String>) -> Self {
        Self {
            action: ResolutionAction::Rewrite,
            destination: Some(destination.into()),
        }
    }

    pub fn redirect(destination: impl Into<String>) -> Self {
        Self {
            action: ResolutionAction::Redirect,
            destination: Some(destination.into()),
        }
    }

    pub fn not_found(destination: impl Into<String>) -> Self {
        Self {
            action: ResolutionAction::NotFound,
            destination: Some(destination.into()),
        }
    }
}

/// Normalize a Host header value: lowercase, port stripped.
fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    host.to_lowercase()
}

/// Resolve an inbound request to a routing decision.
///
/// Pure function: the directory snapshot, config, and environment are
/// injected by the caller.
pub fn resolve(
    host: &str,
    path: &str,
    query: Option<&str>,
    directory: &TenantDirectory,
    tenancy: &TenancyConfig,
    assets: &AssetConfig,
    env: Environment,
) -> ResolutionDecision {
    // Static assets skip resolution entirely.
    if assets.is_static(path) {
        return ResolutionDecision::pass();
    }

    let host = normalize_host(host);
    let root = tenancy.root_domain.to_lowercase();

    // Local development hosts behave like the bare platform domain.
    if !env.is_production() && (host == "localhost" || host == "127.0.0.1") {
        return ResolutionDecision::pass();
    }

    if host == root {
        return ResolutionDecision::pass();
    }

    // Canonical host: www redirects to the apex, preserving the target.
    if host == format!("www.{root}") {
        let scheme = if env.is_production() { "https" } else { "http" };
        let suffix = match query {
            Some(q) if !q.is_empty() => format!("{path}?{q}"),
            _ => path.to_string(),
        };
        return ResolutionDecision::redirect(format!("{scheme}://{root}{suffix}"));
    }

    if let Some(subdomain) = host.strip_suffix(&format!(".{root}")) {
        // Reserved platform names are never tenant lookups.
        if tenancy.reserved_subdomains.iter().any(|r| r == subdomain) {
            return ResolutionDecision::pass();
        }
        if directory.lookup(subdomain).is_some() {
            // Store subdomains are addressable at their natural host.
            return ResolutionDecision::pass();
        }
        return ResolutionDecision::not_found(tenancy.store_not_found_path.clone());
    }

    // Custom domain: known hosts dispatch to the tenant-scoped path,
    // everything else falls through to the platform.
    if let Some(tenant) = directory.lookup(&host) {
        return ResolutionDecision::rewrite(format!("/store/{tenant}{path}"));
    }

    ResolutionDecision::pass()
}
