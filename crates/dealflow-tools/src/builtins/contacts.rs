//! Contact tools - search and update contacts

use std::sync::Arc;

use serde_json::{json, Value};

use crate::builtins::deals::require_str;
use crate::builtins::store::{ContactUpdate, CrmStore};
use crate::context::CallContext;
use crate::error::ToolError;
use crate::registry::{EntityRefSpec, Tool, ToolDescriptor};
use crate::schema::{FieldType, InputSchema};

/// Search contacts by name or email substring
pub struct SearchContactsTool {
    store: Arc<dyn CrmStore>,
    descriptor: ToolDescriptor,
}

impl SearchContactsTool {
    /// Create the tool over a store
    #[must_use]
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self {
            store,
            descriptor: ToolDescriptor::new(
                "search_contacts",
                "Search the tenant's contacts by name or email",
            )
            .with_schema(InputSchema::new().required(
                "query",
                FieldType::String,
                "Substring to match against name or email",
            ))
            .with_entity_ref(EntityRefSpec::list("contact", "contacts", "id").with_label("name")),
        }
    }
}

#[async_trait::async_trait]
impl Tool for SearchContactsTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: &Value, ctx: &CallContext) -> Result<Value, ToolError> {
        let query = require_str(input, "query")?;
        let contacts = self.store.search_contacts(ctx.tenant_id(), query).await?;
        let count = contacts.len();
        Ok(json!({ "contacts": contacts, "count": count }))
    }
}

/// Update a contact's fields (side-effecting, approval required)
pub struct UpdateContactTool {
    store: Arc<dyn CrmStore>,
    descriptor: ToolDescriptor,
}

impl UpdateContactTool {
    /// Create the tool over a store
    #[must_use]
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self {
            store,
            descriptor: ToolDescriptor::new(
                "update_contact",
                "Update a contact's name, email or phone",
            )
            .with_schema(
                InputSchema::new()
                    .required("contact_id", FieldType::String, "Contact identifier")
                    .field("name", FieldType::String, "New full name")
                    .field("email", FieldType::String, "New email address")
                    .field("phone", FieldType::String, "New phone number"),
            )
            .with_approval(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for UpdateContactTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: &Value, ctx: &CallContext) -> Result<Value, ToolError> {
        let contact_id = require_str(input, "contact_id")?;
        let update = ContactUpdate {
            name: input.get("name").and_then(Value::as_str).map(String::from),
            email: input.get("email").and_then(Value::as_str).map(String::from),
            phone: input.get("phone").and_then(Value::as_str).map(String::from),
        };
        let contact = self
            .store
            .update_contact(ctx.tenant_id(), contact_id, update)
            .await?;
        serde_json::to_value(contact).map_err(|e| ToolError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::store::MemoryCrmStore;

    #[tokio::test]
    async fn search_matches_name_and_email() {
        let store = Arc::new(MemoryCrmStore::new());
        store.seed_contact("t", "Maria Silva", Some("maria@acme.com".to_string()));
        store.seed_contact("t", "John Doe", Some("john@other.com".to_string()));

        let tool = SearchContactsTool::new(store);
        let ctx = CallContext::new("t");

        let by_name = tool.execute(&json!({ "query": "maria" }), &ctx).await.unwrap();
        assert_eq!(by_name["count"], 1);

        let by_email = tool.execute(&json!({ "query": "acme" }), &ctx).await.unwrap();
        assert_eq!(by_email["contacts"][0]["name"], "Maria Silva");
    }

    #[tokio::test]
    async fn update_applies_only_provided_fields() {
        let store = Arc::new(MemoryCrmStore::new());
        let id = store.seed_contact("t", "Maria Silva", Some("maria@acme.com".to_string()));

        let tool = UpdateContactTool::new(store);
        let ctx = CallContext::new("t");
        let out = tool
            .execute(&json!({ "contact_id": id, "phone": "+55 11 91234" }), &ctx)
            .await
            .unwrap();

        assert_eq!(out["phone"], "+55 11 91234");
        assert_eq!(out["email"], "maria@acme.com");
        assert!(tool.descriptor().requires_approval);
    }
}
