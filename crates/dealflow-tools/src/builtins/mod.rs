//! Builtins - built-in CRM tools
//!
//! The tools every agent configuration starts from:
//! - Deal tools: list_deals, get_deal, create_deal, move_deal, delete_deal
//! - Contact tools: search_contacts, update_contact
//! - Pipeline tool: pipeline_summary
//!
//! Mutating tools register with approval required; read tools declare where
//! entity references live in their output.

mod contacts;
mod deals;
mod pipeline;
mod store;

pub use contacts::{SearchContactsTool, UpdateContactTool};
pub use deals::{CreateDealTool, DeleteDealTool, GetDealTool, ListDealsTool, MoveDealTool};
pub use pipeline::PipelineSummaryTool;
pub use store::{
    Contact, ContactUpdate, CrmStore, Deal, MemoryCrmStore, NewDeal, StageSummary,
};

use std::sync::Arc;

use crate::error::Result;
use crate::registry::ToolRegistry;

/// Register all built-in tools against a store
///
/// # Errors
/// Fails if a tool name collides with one already registered.
pub fn register_builtins(registry: &mut ToolRegistry, store: Arc<dyn CrmStore>) -> Result<()> {
    registry.register(Arc::new(ListDealsTool::new(store.clone())))?;
    registry.register(Arc::new(GetDealTool::new(store.clone())))?;
    registry.register(Arc::new(CreateDealTool::new(store.clone())))?;
    registry.register(Arc::new(MoveDealTool::new(store.clone())))?;
    registry.register(Arc::new(DeleteDealTool::new(store.clone())))?;
    registry.register(Arc::new(SearchContactsTool::new(store.clone())))?;
    registry.register(Arc::new(UpdateContactTool::new(store.clone())))?;
    registry.register(Arc::new(PipelineSummaryTool::new(store)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_builtins_register_once() {
        let mut registry = ToolRegistry::new();
        let store: Arc<dyn CrmStore> = Arc::new(MemoryCrmStore::new());
        register_builtins(&mut registry, store.clone()).unwrap();
        assert_eq!(registry.len(), 8);

        // registering again collides on the first name
        assert!(register_builtins(&mut registry, store).is_err());
    }
}
