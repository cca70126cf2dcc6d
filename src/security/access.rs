//! Feature access gate.
//!
//! Composes caller step-up state, KYC status, and subscription status
//! into a single allow/deny decision per named feature. The sensitivity
//! table is the single source of truth: each feature belongs to zero or
//! more of the three sets (PIN, KYC, subscription), and every
//! applicable check must pass. Decisions are computed fresh on every
//! call; authorization is never cached across requests.
//!
//! # Design Decisions
//! - Deny by default when the tenant's security state cannot be loaded
//! - Within the PIN section, the first failure decides the remediation
//!   (set → verify → verify); across sections evaluation continues in
//!   PIN → KYC → subscription order

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::schema::AccessConfig;
use crate::observability::metrics;
use crate::security::stepup::StepUpManager;

/// Tenant KYC status as tracked by the compliance process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    Verified,
    Pending,
    Review,
    Blocked,
}

/// Tenant subscription status as reported by the billing provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Incomplete,
}

impl SubscriptionStatus {
    /// Active and trialing tenants are in good standing.
    pub fn in_good_standing(self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }
}

/// Read-only security aggregate for one tenant, owned by the
/// persistence layer. The gate only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSecurityState {
    pub kyc_status: KycStatus,
    pub subscription_status: SubscriptionStatus,
    pub credential_is_set: bool,
    pub credential_version: u32,
}

/// What a denied caller has to do before retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequiredAction {
    CompleteKyc,
    Subscribe,
    SetCredential,
    VerifyCredential,
}

impl RequiredAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RequiredAction::CompleteKyc => "COMPLETE_KYC",
            RequiredAction::Subscribe => "SUBSCRIBE",
            RequiredAction::SetCredential => "SET_CREDENTIAL",
            RequiredAction::VerifyCredential => "VERIFY_CREDENTIAL",
        }
    }
}

/// Outcome of one access check. Computed fresh per call, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureAccessResult {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "requiredAction", skip_serializing_if = "Option::is_none")]
    pub required_action: Option<RequiredAction>,
}

impl FeatureAccessResult {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            required_action: None,
        }
    }

    pub fn deny(reason: impl Into<String>, required_action: Option<RequiredAction>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            required_action,
        }
    }
}

/// Which sensitivity sets a feature belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureRequirements {
    pub pin: bool,
    pub kyc: bool,
    pub subscription: bool,
}

/// The sensitivity table, keyed by feature name.
pub struct FeaturePolicy {
    table: HashMap<String, FeatureRequirements>,
}

impl FeaturePolicy {
    pub fn from_config(config: &AccessConfig) -> Self {
        let table = config
            .features
            .iter()
            .map(|rule| {
                (
                    rule.name.clone(),
                    FeatureRequirements {
                        pin: rule.pin,
                        kyc: rule.kyc,
                        subscription: rule.subscription,
                    },
                )
            })
            .collect();
        Self { table }
    }

    /// Requirements for a feature. Features not in the table are in no
    /// sensitivity set.
    pub fn requirements(&self, feature: &str) -> FeatureRequirements {
        self.table.get(feature).copied().unwrap_or_default()
    }
}

/// Error type for security-state lookups.
#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("security state request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("security state request returned status {0}")]
    Status(u16),
}

/// Read-only source of tenant security state.
#[async_trait::async_trait]
pub trait SecurityStateStore: Send + Sync {
    /// Fetch the state for a tenant; `Ok(None)` means the tenant does
    /// not exist.
    async fn security_state(
        &self,
        tenant_id: &str,
    ) -> Result<Option<TenantSecurityState>, StateStoreError>;
}

/// Security state served by the platform's internal API.
pub struct HttpSecurityStateStore {
    client: reqwest::Client,
    base: String,
}

impl HttpSecurityStateStore {
    pub fn new(client: reqwest::Client, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into(),
        }
    }
}

#[async_trait::async_trait]
impl SecurityStateStore for HttpSecurityStateStore {
    async fn security_state(
        &self,
        tenant_id: &str,
    ) -> Result<Option<TenantSecurityState>, StateStoreError> {
        let url = format!("{}/internal/tenants/{}/security-state", self.base, tenant_id);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StateStoreError::Status(response.status().as_u16()));
        }

        Ok(Some(response.json::<TenantSecurityState>().await?))
    }
}

/// The gate itself: sensitivity table + state store + step-up
/// validator.
pub struct AccessGate {
    policy: FeaturePolicy,
    store: Arc<dyn SecurityStateStore>,
    stepup: Arc<StepUpManager>,
}

impl AccessGate {
    pub fn new(
        policy: FeaturePolicy,
        store: Arc<dyn SecurityStateStore>,
        stepup: Arc<StepUpManager>,
    ) -> Self {
        Self {
            policy,
            store,
            stepup,
        }
    }

    /// Decide whether `tenant_id` may use `feature` right now.
    ///
    /// `stepup_token` is the raw step-up cookie value from the request,
    /// if present.
    pub async fn check(
        &self,
        tenant_id: &str,
        feature: &str,
        stepup_token: Option<&str>,
    ) -> FeatureAccessResult {
        let state = match self.store.security_state(tenant_id).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                tracing::warn!(tenant = %tenant_id, feature = %feature, "Access check for unknown tenant");
                return self.denied(feature, FeatureAccessResult::deny("Store not found", None));
            }
            Err(e) => {
                // Fail closed: an unavailable store never allows.
                tracing::error!(tenant = %tenant_id, feature = %feature, error = %e, "Security state unavailable");
                return self.denied(feature, FeatureAccessResult::deny("Store not found", None));
            }
        };

        let requirements = self.policy.requirements(feature);

        if requirements.pin {
            if !state.credential_is_set {
                return self.denied(
                    feature,
                    FeatureAccessResult::deny(
                        "Transaction PIN has not been set",
                        Some(RequiredAction::SetCredential),
                    ),
                );
            }
            let valid = stepup_token
                .map(|token| self.stepup.validate(token, tenant_id, state.credential_version))
                .unwrap_or(false);
            if !valid {
                return self.denied(
                    feature,
                    FeatureAccessResult::deny(
                        "PIN verification required",
                        Some(RequiredAction::VerifyCredential),
                    ),
                );
            }
        }

        if requirements.kyc && state.kyc_status != KycStatus::Verified {
            return self.denied(
                feature,
                FeatureAccessResult::deny(
                    "Identity verification is not complete",
                    Some(RequiredAction::CompleteKyc),
                ),
            );
        }

        if requirements.subscription && !state.subscription_status.in_good_standing() {
            return self.denied(
                feature,
                FeatureAccessResult::deny(
                    "An active subscription is required",
                    Some(RequiredAction::Subscribe),
                ),
            );
        }

        FeatureAccessResult::allow()
    }

    fn denied(&self, feature: &str, result: FeatureAccessResult) -> FeatureAccessResult {
        let action = result
            .required_action
            .map(RequiredAction::as_str)
            .unwrap_or("NONE");
        metrics::record_gate_denial(feature, action);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::StepUpConfig;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct InMemoryStore {
        states: Mutex<HashMap<String, TenantSecurityState>>,
        fail: bool,
    }

    impl InMemoryStore {
        fn with(tenant: &str, state: TenantSecurityState) -> Arc<Self> {
            let mut states = HashMap::new();
            states.insert(tenant.to_string(), state);
            Arc::new(Self {
                states: Mutex::new(states),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                states: Mutex::new(HashMap::new()),
                fail: true,
            })
        }
    }

    #[async_trait::async_trait]
    impl SecurityStateStore for InMemoryStore {
        async fn security_state(
            &self,
            tenant_id: &str,
        ) -> Result<Option<TenantSecurityState>, StateStoreError> {
            if self.fail {
                return Err(StateStoreError::Status(500));
            }
            Ok(self
                .states
                .lock()
                .expect("state store mutex poisoned")
                .get(tenant_id)
                .cloned())
        }
    }

    fn good_state() -> TenantSecurityState {
        TenantSecurityState {
            kyc_status: KycStatus::Verified,
            subscription_status: SubscriptionStatus::Active,
            credential_is_set: true,
            credential_version: 3,
        }
    }

    fn stepup() -> Arc<StepUpManager> {
        Arc::new(StepUpManager::new(
            &StepUpConfig {
                secret: "gate-test-secret".to_string(),
                ..StepUpConfig::default()
            },
            false,
        ))
    }

    fn gate(store: Arc<dyn SecurityStateStore>, stepup: Arc<StepUpManager>) -> AccessGate {
        AccessGate::new(
            FeaturePolicy::from_config(&AccessConfig::default()),
            store,
            stepup,
        )
    }

    #[tokio::test]
    async fn ungated_feature_is_allowed() {
        let gate = gate(InMemoryStore::with("tn_1", good_state()), stepup());
        let result = gate.check("tn_1", "catalog.browse", None).await;
        assert!(result.allowed);
    }

    #[tokio::test]
    async fn fully_satisfied_tenant_passes_all_three_gates() {
        let manager = stepup();
        let token = manager.issue("tn_1", 3).unwrap();
        let gate = gate(InMemoryStore::with("tn_1", good_state()), manager);

        let result = gate.check("tn_1", "wallet.withdraw", Some(&token)).await;
        assert!(result.allowed, "reason: {:?}", result.reason);
    }

    #[tokio::test]
    async fn unset_credential_wins_even_when_everything_else_is_satisfied() {
        let state = TenantSecurityState {
            credential_is_set: false,
            ..good_state()
        };
        let gate = gate(InMemoryStore::with("tn_1", state), stepup());

        let result = gate.check("tn_1", "wallet.withdraw", None).await;
        assert!(!result.allowed);
        assert_eq!(result.required_action, Some(RequiredAction::SetCredential));
    }

    #[tokio::test]
    async fn missing_stepup_cookie_requires_verification_before_kyc() {
        // KYC is also unsatisfied; the PIN section is evaluated first,
        // so the remediation is VERIFY_CREDENTIAL, not COMPLETE_KYC.
        let state = TenantSecurityState {
            kyc_status: KycStatus::Pending,
            ..good_state()
        };
        let gate = gate(InMemoryStore::with("tn_1", state), stepup());

        let result = gate.check("tn_1", "wallet.withdraw", None).await;
        assert!(!result.allowed);
        assert_eq!(result.required_action, Some(RequiredAction::VerifyCredential));
    }

    #[tokio::test]
    async fn rotated_credential_version_invalidates_the_token() {
        let manager = stepup();
        let stale = manager.issue("tn_1", 2).unwrap();
        let gate = gate(InMemoryStore::with("tn_1", good_state()), manager);

        let result = gate.check("tn_1", "wallet.withdraw", Some(&stale)).await;
        assert!(!result.allowed);
        assert_eq!(result.required_action, Some(RequiredAction::VerifyCredential));
    }

    #[tokio::test]
    async fn kyc_is_checked_after_a_valid_stepup() {
        let manager = stepup();
        let token = manager.issue("tn_1", 3).unwrap();
        let state = TenantSecurityState {
            kyc_status: KycStatus::Review,
            ..good_state()
        };
        let gate = gate(InMemoryStore::with("tn_1", state), manager);

        let result = gate.check("tn_1", "wallet.withdraw", Some(&token)).await;
        assert!(!result.allowed);
        assert_eq!(result.required_action, Some(RequiredAction::CompleteKyc));
    }

    #[tokio::test]
    async fn lapsed_subscription_requires_subscribe() {
        let manager = stepup();
        let token = manager.issue("tn_1", 3).unwrap();
        let state = TenantSecurityState {
            subscription_status: SubscriptionStatus::Canceled,
            ..good_state()
        };
        let gate = gate(InMemoryStore::with("tn_1", state), manager);

        let result = gate.check("tn_1", "wallet.withdraw", Some(&token)).await;
        assert!(!result.allowed);
        assert_eq!(result.required_action, Some(RequiredAction::Subscribe));
    }

    #[tokio::test]
    async fn trialing_counts_as_good_standing() {
        let state = TenantSecurityState {
            subscription_status: SubscriptionStatus::Trialing,
            ..good_state()
        };
        let gate = gate(InMemoryStore::with("tn_1", state), stepup());

        let result = gate.check("tn_1", "billing.manage", None).await;
        assert!(result.allowed);
    }

    #[tokio::test]
    async fn unknown_tenant_denies_with_store_not_found() {
        let gate = gate(InMemoryStore::with("tn_1", good_state()), stepup());

        let result = gate.check("tn_ghost", "wallet.withdraw", None).await;
        assert!(!result.allowed);
        assert_eq!(result.reason.as_deref(), Some("Store not found"));
        assert_eq!(result.required_action, None);
    }

    #[tokio::test]
    async fn store_failure_fails_closed() {
        let gate = gate(InMemoryStore::failing(), stepup());

        let result = gate.check("tn_1", "catalog.browse", None).await;
        assert!(!result.allowed);
    }

    #[test]
    fn result_serialization_shape() {
        let denied = FeatureAccessResult::deny(
            "PIN verification required",
            Some(RequiredAction::VerifyCredential),
        );
        let json = serde_json::to_value(&denied).unwrap();
        assert_eq!(json["allowed"], false);
        assert_eq!(json["requiredAction"], "VERIFY_CREDENTIAL");

        let allowed = serde_json::to_value(FeatureAccessResult::allow()).unwrap();
        assert_eq!(allowed["allowed"], true);
        assert!(allowed.get("reason").is_none());
    }
}
