//! Call context - tenant-scoped per-run input bundle
//!
//! A `CallContext` is constructed once per agent invocation from
//! caller-validated input and stays immutable for the whole run. Its tenant
//! id is the sole scoping key threaded into every tool executor; no tool
//! input may override it.

use serde::{Deserialize, Serialize};

/// Vertical (industry) configuration for a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerticalContext {
    /// Vertical name (e.g. "real estate", "recruiting")
    pub name: String,
    /// Short description of the vertical's workflow and terminology
    pub description: String,
}

/// Aggregate pipeline metrics rendered into the live-metrics block
///
/// Every field is optional; an absent field simply omits its line from the
/// composed context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineMetrics {
    /// Number of open deals
    pub open_deal_count: Option<u64>,
    /// Total pipeline value in cents
    pub pipeline_value_cents: Option<i64>,
    /// Deals with no activity past the stagnation threshold
    pub stagnant_deal_count: Option<u64>,
    /// Overdue tasks across the board
    pub overdue_task_count: Option<u64>,
}

/// Tenant-scoped, per-run immutable input bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallContext {
    tenant_id: String,
    /// Board in focus, if the caller navigated to one
    pub board_id: Option<String>,
    /// Deal in focus
    pub deal_id: Option<String>,
    /// Contact in focus
    pub contact_id: Option<String>,
    /// Display name of the focused board
    pub board_name: Option<String>,
    /// Ordered stage names of the focused board
    #[serde(default)]
    pub stage_names: Vec<String>,
    /// Vertical configuration, when the tenant has one
    pub vertical: Option<VerticalContext>,
    /// Live aggregate metrics
    #[serde(default)]
    pub metrics: PipelineMetrics,
}

impl CallContext {
    /// Create a context scoped to a tenant
    #[must_use]
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            board_id: None,
            deal_id: None,
            contact_id: None,
            board_name: None,
            stage_names: Vec::new(),
            vertical: None,
            metrics: PipelineMetrics::default(),
        }
    }

    /// The tenant this run is scoped to
    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Whether the context carries a usable tenant id
    #[must_use]
    pub fn has_tenant(&self) -> bool {
        !self.tenant_id.trim().is_empty()
    }

    /// Set the focused board
    #[must_use]
    pub fn with_board(mut self, board_id: impl Into<String>, board_name: impl Into<String>) -> Self {
        self.board_id = Some(board_id.into());
        self.board_name = Some(board_name.into());
        self
    }

    /// Set the focused deal
    #[must_use]
    pub fn with_deal(mut self, deal_id: impl Into<String>) -> Self {
        self.deal_id = Some(deal_id.into());
        self
    }

    /// Set the focused contact
    #[must_use]
    pub fn with_contact(mut self, contact_id: impl Into<String>) -> Self {
        self.contact_id = Some(contact_id.into());
        self
    }

    /// Set the board's stage names
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stage_names = stages;
        self
    }

    /// Set the vertical configuration
    #[must_use]
    pub fn with_vertical(mut self, vertical: VerticalContext) -> Self {
        self.vertical = Some(vertical);
        self
    }

    /// Set the aggregate metrics
    #[must_use]
    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = metrics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_id_is_read_only() {
        let ctx = CallContext::new("tenant-1").with_deal("deal-9");
        assert_eq!(ctx.tenant_id(), "tenant-1");
        assert!(ctx.has_tenant());
        assert_eq!(ctx.deal_id.as_deref(), Some("deal-9"));
    }

    #[test]
    fn blank_tenant_is_detected() {
        assert!(!CallContext::new("").has_tenant());
        assert!(!CallContext::new("   ").has_tenant());
    }
}
