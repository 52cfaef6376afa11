//! Quota gate - governance hook consulted before each model invocation
//!
//! The billing/governance layer lives outside this crate; the runtime only
//! sees this trait. A deny short-circuits the run before any provider call.

use serde::{Deserialize, Serialize};

/// Decision returned by the quota gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaDecision {
    /// The run may invoke a provider
    Allow,
    /// The tenant is over quota; the run terminates without a provider call
    Deny {
        /// Reason surfaced to the caller
        reason: String,
    },
}

/// Per-tenant quota check
#[async_trait::async_trait]
pub trait QuotaGate: Send + Sync {
    /// Check whether the tenant may spend another model invocation
    async fn check(&self, tenant_id: &str) -> QuotaDecision;
}

/// Gate that always allows; the default when no governance layer is wired in
pub struct UnlimitedQuota;

#[async_trait::async_trait]
impl QuotaGate for UnlimitedQuota {
    async fn check(&self, _tenant_id: &str) -> QuotaDecision {
        QuotaDecision::Allow
    }
}
