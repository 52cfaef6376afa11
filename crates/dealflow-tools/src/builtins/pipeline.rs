//! Pipeline summary tool

use std::sync::Arc;

use serde_json::{json, Value};

use crate::builtins::store::CrmStore;
use crate::context::CallContext;
use crate::error::ToolError;
use crate::registry::{Tool, ToolDescriptor};

/// Per-stage deal counts and totals for the whole pipeline
pub struct PipelineSummaryTool {
    store: Arc<dyn CrmStore>,
    descriptor: ToolDescriptor,
}

impl PipelineSummaryTool {
    /// Create the tool over a store
    #[must_use]
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self {
            store,
            descriptor: ToolDescriptor::new(
                "pipeline_summary",
                "Summarize the pipeline: deal count and total value per stage",
            ),
        }
    }
}

#[async_trait::async_trait]
impl Tool for PipelineSummaryTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _input: &Value, ctx: &CallContext) -> Result<Value, ToolError> {
        let stages = self.store.pipeline_summary(ctx.tenant_id()).await?;
        let total_cents: i64 = stages.iter().map(|s| s.value_cents).sum();
        Ok(json!({ "stages": stages, "total_value_cents": total_cents }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::store::MemoryCrmStore;

    #[tokio::test]
    async fn summary_totals_all_stages() {
        let store = Arc::new(MemoryCrmStore::new());
        store.seed_deal("t", "A", "Lead", 100);
        store.seed_deal("t", "B", "Won", 250);

        let tool = PipelineSummaryTool::new(store);
        let out = tool
            .execute(&json!({}), &CallContext::new("t"))
            .await
            .unwrap();
        assert_eq!(out["total_value_cents"], 350);
    }
}
