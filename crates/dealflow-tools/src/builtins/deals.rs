//! Deal tools - list, fetch, create, move and delete deals
//!
//! Read tools declare entity-reference specs so the composer can remind the
//! model of ids it already fetched. Mutating tools register with approval
//! required.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::builtins::store::{CrmStore, NewDeal};
use crate::context::CallContext;
use crate::error::ToolError;
use crate::registry::{EntityRefSpec, Tool, ToolDescriptor};
use crate::schema::{FieldType, InputSchema};

/// List deals, optionally filtered by stage
pub struct ListDealsTool {
    store: Arc<dyn CrmStore>,
    descriptor: ToolDescriptor,
}

impl ListDealsTool {
    /// Create the tool over a store
    #[must_use]
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self {
            store,
            descriptor: ToolDescriptor::new(
                "list_deals",
                "List the tenant's deals, optionally filtered by stage name",
            )
            .with_schema(InputSchema::new().field(
                "stage",
                FieldType::String,
                "Only return deals in this stage",
            ))
            .with_entity_ref(EntityRefSpec::list("deal", "deals", "id").with_label("title")),
        }
    }
}

#[async_trait::async_trait]
impl Tool for ListDealsTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: &Value, ctx: &CallContext) -> Result<Value, ToolError> {
        let stage = input.get("stage").and_then(Value::as_str);
        let deals = self.store.list_deals(ctx.tenant_id(), stage).await?;
        let count = deals.len();
        Ok(json!({ "deals": deals, "count": count }))
    }
}

/// Fetch one deal by id
pub struct GetDealTool {
    store: Arc<dyn CrmStore>,
    descriptor: ToolDescriptor,
}

impl GetDealTool {
    /// Create the tool over a store
    #[must_use]
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self {
            store,
            descriptor: ToolDescriptor::new("get_deal", "Fetch a single deal by its identifier")
                .with_schema(InputSchema::new().required(
                    "deal_id",
                    FieldType::String,
                    "Deal identifier",
                ))
                .with_entity_ref(EntityRefSpec::single("deal", "id").with_label("title")),
        }
    }
}

#[async_trait::async_trait]
impl Tool for GetDealTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: &Value, ctx: &CallContext) -> Result<Value, ToolError> {
        let deal_id = require_str(input, "deal_id")?;
        let deal = self.store.get_deal(ctx.tenant_id(), deal_id).await?;
        serde_json::to_value(deal).map_err(|e| ToolError::Backend(e.to_string()))
    }
}

/// Create a deal (side-effecting, approval required)
pub struct CreateDealTool {
    store: Arc<dyn CrmStore>,
    descriptor: ToolDescriptor,
}

impl CreateDealTool {
    /// Create the tool over a store
    #[must_use]
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self {
            store,
            descriptor: ToolDescriptor::new("create_deal", "Create a new deal in a stage")
                .with_schema(
                    InputSchema::new()
                        .required("title", FieldType::String, "Deal title")
                        .required("stage", FieldType::String, "Initial stage name")
                        .field("value_cents", FieldType::Integer, "Deal value in cents"),
                )
                .with_approval(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for CreateDealTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: &Value, ctx: &CallContext) -> Result<Value, ToolError> {
        let new_deal = NewDeal {
            title: require_str(input, "title")?.to_string(),
            stage: require_str(input, "stage")?.to_string(),
            value_cents: input.get("value_cents").and_then(Value::as_i64),
        };
        let deal = self.store.create_deal(ctx.tenant_id(), new_deal).await?;
        serde_json::to_value(deal).map_err(|e| ToolError::Backend(e.to_string()))
    }
}

/// Move a deal to another stage (side-effecting, approval required)
pub struct MoveDealTool {
    store: Arc<dyn CrmStore>,
    descriptor: ToolDescriptor,
}

impl MoveDealTool {
    /// Create the tool over a store
    #[must_use]
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self {
            store,
            descriptor: ToolDescriptor::new("move_deal", "Move a deal to a different stage")
                .with_schema(
                    InputSchema::new()
                        .required("deal_id", FieldType::String, "Deal identifier")
                        .required("stage", FieldType::String, "Target stage name"),
                )
                .with_approval(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for MoveDealTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: &Value, ctx: &CallContext) -> Result<Value, ToolError> {
        let deal_id = require_str(input, "deal_id")?;
        let stage = require_str(input, "stage")?;
        let deal = self.store.move_deal(ctx.tenant_id(), deal_id, stage).await?;
        serde_json::to_value(deal).map_err(|e| ToolError::Backend(e.to_string()))
    }
}

/// Delete a deal (side-effecting, approval required)
pub struct DeleteDealTool {
    store: Arc<dyn CrmStore>,
    descriptor: ToolDescriptor,
}

impl DeleteDealTool {
    /// Create the tool over a store
    #[must_use]
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self {
            store,
            descriptor: ToolDescriptor::new("delete_deal", "Permanently delete a deal")
                .with_schema(InputSchema::new().required(
                    "deal_id",
                    FieldType::String,
                    "Deal identifier",
                ))
                .with_approval(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for DeleteDealTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: &Value, ctx: &CallContext) -> Result<Value, ToolError> {
        let deal_id = require_str(input, "deal_id")?;
        self.store.delete_deal(ctx.tenant_id(), deal_id).await?;
        Ok(json!({ "deleted": deal_id }))
    }
}

// Schema validation runs before execution, so absence here means the gate
// was bypassed; treat it as a backend contract breach rather than panic.
pub(crate) fn require_str<'a>(input: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    input
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::Backend(format!("missing validated field '{field}'")))
}
