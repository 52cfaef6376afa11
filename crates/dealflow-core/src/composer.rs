//! Composer - builds the system instructions for each step
//!
//! The initial context is layered: persona text, a vertical block when the
//! tenant has one, and a live-metrics block rendering only the fields the
//! call context actually carries. After each step a short-term-memory
//! reminder is recomputed from the accumulated step records so the model
//! reuses identifiers it already fetched instead of re-querying.

use serde_json::Value;

use dealflow_tools::{CallContext, InvocationState, ToolRegistry};

use crate::runtime::StepRecord;

/// Compose the initial instruction text for a run
///
/// Absent context fields omit their line; nothing here can fail. The output
/// is deterministic for identical input.
#[must_use]
pub fn compose_initial(base_instructions: &str, ctx: &CallContext) -> String {
    let mut out = base_instructions.trim().to_string();

    if let Some(vertical) = &ctx.vertical {
        out.push_str("\n\n## Vertical context\n");
        out.push_str(&format!(
            "This tenant operates in {}. {}",
            vertical.name, vertical.description
        ));
    }

    let mut lines = Vec::new();
    if let Some(board) = &ctx.board_name {
        lines.push(format!("Current board: {board}"));
    }
    if !ctx.stage_names.is_empty() {
        lines.push(format!("Stages: {}", ctx.stage_names.join(", ")));
    }
    if let Some(count) = ctx.metrics.open_deal_count {
        lines.push(format!("Open deals: {count}"));
    }
    if let Some(cents) = ctx.metrics.pipeline_value_cents {
        // integer division alone drops the sign for totals under one unit
        let sign = if cents < 0 { "-" } else { "" };
        let cents = cents.abs();
        lines.push(format!("Pipeline value: {sign}{}.{:02}", cents / 100, cents % 100));
    }
    if let Some(count) = ctx.metrics.stagnant_deal_count {
        lines.push(format!("Stagnant deals: {count}"));
    }
    if let Some(count) = ctx.metrics.overdue_task_count {
        lines.push(format!("Overdue tasks: {count}"));
    }

    if !lines.is_empty() {
        out.push_str("\n\n## Live pipeline context\n");
        out.push_str(&lines.join("\n"));
    }

    out
}

/// An entity reference discovered in a prior tool result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownEntity {
    /// Entity kind as declared by the tool
    pub kind: String,
    /// Identifier
    pub id: String,
    /// Human-readable label, when the tool declared one
    pub label: Option<String>,
}

/// Accumulator of entity references across step records
///
/// A pure reducer: extraction follows each tool's declared entity-reference
/// spec, so no result shape is ever sniffed.
#[derive(Debug, Clone, Default)]
pub struct KnownEntities {
    entities: Vec<KnownEntity>,
}

impl KnownEntities {
    /// Reduce a step history into the entities it surfaced, in discovery order
    #[must_use]
    pub fn from_steps(steps: &[StepRecord], registry: &ToolRegistry) -> Self {
        let mut entities = Vec::new();

        for step in steps {
            for invocation in &step.invocations {
                if invocation.state != InvocationState::Succeeded {
                    continue;
                }
                let Some(output) = &invocation.output else {
                    continue;
                };
                let Some(spec) = registry
                    .descriptor(&invocation.tool_name)
                    .and_then(|d| d.entity_ref.as_ref())
                else {
                    continue;
                };

                let items: Vec<&Value> = match &spec.list_path {
                    Some(path) => output
                        .get(path)
                        .and_then(Value::as_array)
                        .map(|a| a.iter().collect())
                        .unwrap_or_default(),
                    None => vec![output],
                };

                for item in items {
                    let Some(id) = field_as_string(item, &spec.id_field) else {
                        continue;
                    };
                    let label = spec
                        .label_field
                        .as_deref()
                        .and_then(|f| field_as_string(item, f));
                    entities.push(KnownEntity {
                        kind: spec.kind.clone(),
                        id,
                        label,
                    });
                }
            }
        }

        Self { entities }
    }

    /// The most recently discovered entity
    #[must_use]
    pub fn last(&self) -> Option<&KnownEntity> {
        self.entities.last()
    }

    /// All discovered entities in order
    #[must_use]
    pub fn all(&self) -> &[KnownEntity] {
        &self.entities
    }

    /// Whether nothing was discovered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

fn field_as_string(item: &Value, field: &str) -> Option<String> {
    match item.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Synthesize the short-term-memory reminder for the next step
///
/// Pure function of the step history; recomputing it never changes the
/// records it scans. Returns `None` when no entity has surfaced yet.
#[must_use]
pub fn compose_step_reminder(steps: &[StepRecord], registry: &ToolRegistry) -> Option<String> {
    let entities = KnownEntities::from_steps(steps, registry);
    let entity = entities.last()?;

    Some(match &entity.label {
        Some(label) => format!(
            "Reminder: an earlier tool call already returned the {} \"{}\" with id {}. \
             Reuse that id directly instead of querying for it again.",
            entity.kind, label, entity.id
        ),
        None => format!(
            "Reminder: an earlier tool call already returned the {} with id {}. \
             Reuse that id directly instead of querying for it again.",
            entity.kind, entity.id
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealflow_tools::{
        CallContext, EntityRefSpec, PipelineMetrics, Tool, ToolDescriptor, ToolError,
        ToolInvocation, VerticalContext,
    };
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    struct DeclaredTool {
        descriptor: ToolDescriptor,
    }

    #[async_trait::async_trait]
    impl Tool for DeclaredTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.descriptor
        }

        async fn execute(
            &self,
            _input: &Value,
            _ctx: &CallContext,
        ) -> Result<Value, ToolError> {
            Ok(Value::Null)
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(DeclaredTool {
                descriptor: ToolDescriptor::new("list_deals", "List deals").with_entity_ref(
                    EntityRefSpec::list("deal", "deals", "id").with_label("title"),
                ),
            }))
            .unwrap();
        registry
            .register(Arc::new(DeclaredTool {
                descriptor: ToolDescriptor::new("pipeline_summary", "Summarize"),
            }))
            .unwrap();
        registry
    }

    fn step_with_output(step_number: u32, tool_name: &str, output: Value) -> StepRecord {
        StepRecord {
            step_number,
            model_text: String::new(),
            invocations: vec![ToolInvocation {
                id: Uuid::new_v4(),
                call_id: "call_1".to_string(),
                tool_name: tool_name.to_string(),
                input: json!({}),
                state: InvocationState::Succeeded,
                output: Some(output),
                error: None,
                duration_ms: 1,
            }],
        }
    }

    #[test]
    fn initial_context_omits_absent_fields() {
        let sparse = CallContext::new("t");
        let text = compose_initial("You are a CRM assistant.", &sparse);
        assert_eq!(text, "You are a CRM assistant.");
        assert!(!text.contains("Vertical"));
        assert!(!text.contains("pipeline"));
    }

    #[test]
    fn initial_context_renders_present_fields() {
        let ctx = CallContext::new("t")
            .with_board("b-1", "Sales Q3")
            .with_stages(vec!["Lead".to_string(), "Proposta".to_string()])
            .with_vertical(VerticalContext {
                name: "real estate".to_string(),
                description: "Deals are property listings.".to_string(),
            })
            .with_metrics(PipelineMetrics {
                open_deal_count: Some(12),
                pipeline_value_cents: Some(450_075),
                stagnant_deal_count: None,
                overdue_task_count: None,
            });

        let text = compose_initial("Persona.", &ctx);
        assert!(text.contains("real estate"));
        assert!(text.contains("Current board: Sales Q3"));
        assert!(text.contains("Stages: Lead, Proposta"));
        assert!(text.contains("Open deals: 12"));
        assert!(text.contains("Pipeline value: 4500.75"));
        assert!(!text.contains("Stagnant"));
        // deterministic
        assert_eq!(text, compose_initial("Persona.", &ctx));
    }

    #[test]
    fn negative_pipeline_value_keeps_its_sign() {
        let under_one_unit = CallContext::new("t").with_metrics(PipelineMetrics {
            pipeline_value_cents: Some(-50),
            ..PipelineMetrics::default()
        });
        let text = compose_initial("Persona.", &under_one_unit);
        assert!(text.contains("Pipeline value: -0.50"));

        let whole_units = CallContext::new("t").with_metrics(PipelineMetrics {
            pipeline_value_cents: Some(-450_075),
            ..PipelineMetrics::default()
        });
        let text = compose_initial("Persona.", &whole_units);
        assert!(text.contains("Pipeline value: -4500.75"));
    }

    #[test]
    fn reducer_follows_declared_specs_only() {
        let registry = registry();
        let steps = vec![
            step_with_output(
                1,
                "list_deals",
                json!({ "deals": [
                    { "id": "d-1", "title": "Acme" },
                    { "id": "d-2", "title": "Beta" },
                ], "count": 2 }),
            ),
            // no entity_ref declared, so nothing is extracted however deal-shaped
            step_with_output(2, "pipeline_summary", json!({ "id": "d-9", "title": "Ghost" })),
        ];

        let entities = KnownEntities::from_steps(&steps, &registry);
        assert_eq!(entities.all().len(), 2);
        let last = entities.last().unwrap();
        assert_eq!(last.id, "d-2");
        assert_eq!(last.label.as_deref(), Some("Beta"));
    }

    #[test]
    fn reminder_names_last_entity_and_is_idempotent() {
        let registry = registry();
        let steps = vec![step_with_output(
            1,
            "list_deals",
            json!({ "deals": [{ "id": "d-7", "title": "Acme rollout" }] }),
        )];

        let first = compose_step_reminder(&steps, &registry).unwrap();
        assert!(first.contains("d-7"));
        assert!(first.contains("Acme rollout"));

        let second = compose_step_reminder(&steps, &registry).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn reminder_is_absent_without_entities() {
        let registry = registry();
        assert!(compose_step_reminder(&[], &registry).is_none());

        let steps = vec![step_with_output(1, "pipeline_summary", json!({ "stages": [] }))];
        assert!(compose_step_reminder(&steps, &registry).is_none());
    }
}
