//! Error types for dealflow-tools

use thiserror::Error;

use crate::schema::Violation;

/// Registry and gate error type
#[derive(Debug, Error)]
pub enum Error {
    /// A tool name was registered twice
    #[error("duplicate tool registration: {0}")]
    DuplicateTool(String),

    /// A tool schema declared a field the runtime reserves for itself
    #[error("tool '{tool}' declares reserved field '{field}'")]
    ReservedField {
        /// Offending tool name
        tool: String,
        /// Reserved field name
        field: String,
    },

    /// Input failed structural validation
    #[error("invalid input for tool '{tool}': {}", render_violations(violations))]
    InvalidInput {
        /// Tool name
        tool: String,
        /// Field-level violations
        violations: Vec<Violation>,
    },
}

fn render_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.problem))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by tool executors
///
/// Executors return these instead of panicking into the step loop; the gate
/// converts them to structured failure payloads the model can read.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The referenced entity does not exist for this tenant
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation conflicts with current store state
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store failed
    #[error("backend error: {0}")]
    Backend(String),
}
