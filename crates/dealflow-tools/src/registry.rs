//! Registry - tool registration and discovery
//!
//! Tools are registered once at agent construction and the registry is
//! immutable for the rest of the run. Name uniqueness and reserved-field
//! checks happen here, at construction, not at call time.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::CallContext;
use crate::error::{Error, Result, ToolError};
use crate::schema::{InputSchema, RESERVED_TENANT_FIELD};

/// Declaration of which result fields denote entity references
///
/// Tool authors state explicitly where identifiers live in their output so
/// the context composer can mine results without sniffing shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRefSpec {
    /// Entity kind (e.g. "deal", "contact")
    pub kind: String,
    /// Path to a result array of entities; `None` means the result itself is
    /// a single entity
    pub list_path: Option<String>,
    /// Field holding the entity identifier
    pub id_field: String,
    /// Field holding a human-readable label, if the result carries one
    pub label_field: Option<String>,
}

impl EntityRefSpec {
    /// A single-entity result
    #[must_use]
    pub fn single(kind: impl Into<String>, id_field: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            list_path: None,
            id_field: id_field.into(),
            label_field: None,
        }
    }

    /// A result carrying an array of entities under `list_path`
    #[must_use]
    pub fn list(
        kind: impl Into<String>,
        list_path: impl Into<String>,
        id_field: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            list_path: Some(list_path.into()),
            id_field: id_field.into(),
            label_field: None,
        }
    }

    /// Set the label field
    #[must_use]
    pub fn with_label(mut self, label_field: impl Into<String>) -> Self {
        self.label_field = Some(label_field.into());
        self
    }
}

/// Tool metadata: name, schema, approval flag and entity-reference contract
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    /// Unique tool name
    pub name: String,
    /// Human-readable description shown to the model
    pub description: String,
    /// Structural input schema
    pub schema: InputSchema,
    /// Whether execution must wait for an external approval
    pub requires_approval: bool,
    /// Where entity references live in this tool's output
    pub entity_ref: Option<EntityRefSpec>,
}

impl ToolDescriptor {
    /// Create a descriptor with an empty schema
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: InputSchema::new(),
            requires_approval: false,
            entity_ref: None,
        }
    }

    /// Set the input schema
    #[must_use]
    pub fn with_schema(mut self, schema: InputSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Mark the tool as side-effecting, requiring approval before execution
    #[must_use]
    pub fn with_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    /// Declare the entity-reference contract of the tool's output
    #[must_use]
    pub fn with_entity_ref(mut self, spec: EntityRefSpec) -> Self {
        self.entity_ref = Some(spec);
        self
    }
}

/// Trait for tool implementations
///
/// Executors return `Result`, never panic into the step loop; the approval
/// gate converts errors to structured failure payloads.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool descriptor
    fn descriptor(&self) -> &ToolDescriptor;

    /// Execute with validated input, scoped to the context's tenant
    async fn execute(
        &self,
        input: &serde_json::Value,
        ctx: &CallContext,
    ) -> std::result::Result<serde_json::Value, ToolError>;
}

/// Registry mapping tool names to implementations
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool
    ///
    /// # Errors
    /// Fails with `DuplicateTool` on a repeated name and `ReservedField` when
    /// the schema declares `tenant_id` (tenant scoping comes from the call
    /// context only).
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let descriptor = tool.descriptor();
        let name = descriptor.name.clone();

        if descriptor.schema.declares(RESERVED_TENANT_FIELD) {
            return Err(Error::ReservedField {
                tool: name,
                field: RESERVED_TENANT_FIELD.to_string(),
            });
        }
        if self.tools.contains_key(&name) {
            return Err(Error::DuplicateTool(name));
        }

        debug!(tool = %name, requires_approval = descriptor.requires_approval, "Registering tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get a tool descriptor by name
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name).map(|t| t.descriptor())
    }

    /// Tool count
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Export descriptors as the protocol-level tool list (schemas only)
    #[must_use]
    pub fn to_model_tools(&self) -> Vec<dealflow_llm::ToolDefinition> {
        let mut tools: Vec<_> = self
            .tools
            .values()
            .map(|tool| {
                let d = tool.descriptor();
                dealflow_llm::ToolDefinition {
                    name: d.name.clone(),
                    description: d.description.clone(),
                    parameters: d.schema.to_json_schema(),
                }
            })
            .collect();
        // stable order for deterministic requests
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }
}
