//! Dealflow Tools - Tool Registry and Approval Gate
//!
//! This crate provides the tool system for the Dealflow agent runtime:
//! - Context: tenant-scoped call context handed to every executor
//! - Schema: structural input validation with field-level violations
//! - Registry: tool registration and discovery
//! - Gate: approval-gated dispatch with per-tool timeouts
//! - Builtins: built-in CRM tools over a narrow store trait

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builtins;
pub mod context;
pub mod error;
pub mod gate;
pub mod registry;
pub mod schema;

pub use builtins::{register_builtins, Contact, CrmStore, Deal, MemoryCrmStore, NewDeal};
pub use context::{CallContext, PipelineMetrics, VerticalContext};
pub use error::{Error, Result, ToolError};
pub use gate::{ApprovalDecision, ApprovalGate, GateConfig, InvocationState, ToolInvocation};
pub use registry::{EntityRefSpec, Tool, ToolDescriptor, ToolRegistry};
pub use schema::{FieldType, InputSchema, Violation};
