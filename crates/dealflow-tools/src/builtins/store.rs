//! Store trait - the narrow boundary to the tenant's CRM data
//!
//! The relational store itself lives outside this crate; tools only see this
//! trait. Every method takes the tenant id as its first argument, supplied
//! by the call context, never by tool input.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ToolError;

/// A deal row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    /// Deal identifier
    pub id: String,
    /// Deal title
    pub title: String,
    /// Current stage name
    pub stage: String,
    /// Deal value in cents
    pub value_cents: i64,
}

/// Fields for creating a deal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeal {
    /// Deal title
    pub title: String,
    /// Initial stage name
    pub stage: String,
    /// Deal value in cents
    pub value_cents: Option<i64>,
}

/// A contact row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// Contact identifier
    pub id: String,
    /// Full name
    pub name: String,
    /// Email address
    pub email: Option<String>,
    /// Phone number
    pub phone: Option<String>,
}

/// Partial update of a contact; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactUpdate {
    /// New name
    pub name: Option<String>,
    /// New email
    pub email: Option<String>,
    /// New phone
    pub phone: Option<String>,
}

/// Per-stage aggregate for the pipeline summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSummary {
    /// Stage name
    pub stage: String,
    /// Deals currently in the stage
    pub deal_count: u64,
    /// Summed value in cents
    pub value_cents: i64,
}

/// Tenant-scoped CRM data access
#[async_trait::async_trait]
pub trait CrmStore: Send + Sync {
    /// List deals, optionally filtered by stage
    async fn list_deals(
        &self,
        tenant_id: &str,
        stage: Option<&str>,
    ) -> Result<Vec<Deal>, ToolError>;

    /// Fetch one deal
    async fn get_deal(&self, tenant_id: &str, deal_id: &str) -> Result<Deal, ToolError>;

    /// Create a deal
    async fn create_deal(&self, tenant_id: &str, new_deal: NewDeal) -> Result<Deal, ToolError>;

    /// Move a deal to another stage
    async fn move_deal(
        &self,
        tenant_id: &str,
        deal_id: &str,
        stage: &str,
    ) -> Result<Deal, ToolError>;

    /// Delete a deal
    async fn delete_deal(&self, tenant_id: &str, deal_id: &str) -> Result<(), ToolError>;

    /// Search contacts by name or email substring
    async fn search_contacts(
        &self,
        tenant_id: &str,
        query: &str,
    ) -> Result<Vec<Contact>, ToolError>;

    /// Apply a partial update to a contact
    async fn update_contact(
        &self,
        tenant_id: &str,
        contact_id: &str,
        update: ContactUpdate,
    ) -> Result<Contact, ToolError>;

    /// Per-stage aggregates for the tenant's pipeline
    async fn pipeline_summary(&self, tenant_id: &str) -> Result<Vec<StageSummary>, ToolError>;
}

#[derive(Default)]
struct TenantData {
    deals: Vec<Deal>,
    contacts: Vec<Contact>,
}

/// In-memory store for tests and demos
#[derive(Default)]
pub struct MemoryCrmStore {
    tenants: DashMap<String, TenantData>,
    next_id: AtomicU64,
    mutations: AtomicU64,
}

impl MemoryCrmStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a deal for a tenant, returning its id
    pub fn seed_deal(
        &self,
        tenant_id: &str,
        title: impl Into<String>,
        stage: impl Into<String>,
        value_cents: i64,
    ) -> String {
        let id = format!("deal-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.tenants
            .entry(tenant_id.to_string())
            .or_default()
            .deals
            .push(Deal {
                id: id.clone(),
                title: title.into(),
                stage: stage.into(),
                value_cents,
            });
        id
    }

    /// Seed a contact for a tenant, returning its id
    pub fn seed_contact(
        &self,
        tenant_id: &str,
        name: impl Into<String>,
        email: Option<String>,
    ) -> String {
        let id = format!("contact-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.tenants
            .entry(tenant_id.to_string())
            .or_default()
            .contacts
            .push(Contact {
                id: id.clone(),
                name: name.into(),
                email,
                phone: None,
            });
        id
    }

    /// Number of mutating operations performed since construction
    #[must_use]
    pub fn mutations(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CrmStore for MemoryCrmStore {
    async fn list_deals(
        &self,
        tenant_id: &str,
        stage: Option<&str>,
    ) -> Result<Vec<Deal>, ToolError> {
        let deals = self
            .tenants
            .get(tenant_id)
            .map(|t| t.deals.clone())
            .unwrap_or_default();
        Ok(match stage {
            Some(stage) => deals.into_iter().filter(|d| d.stage == stage).collect(),
            None => deals,
        })
    }

    async fn get_deal(&self, tenant_id: &str, deal_id: &str) -> Result<Deal, ToolError> {
        self.tenants
            .get(tenant_id)
            .and_then(|t| t.deals.iter().find(|d| d.id == deal_id).cloned())
            .ok_or_else(|| ToolError::NotFound(format!("deal {deal_id}")))
    }

    async fn create_deal(&self, tenant_id: &str, new_deal: NewDeal) -> Result<Deal, ToolError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let id = format!("deal-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let deal = Deal {
            id,
            title: new_deal.title,
            stage: new_deal.stage,
            value_cents: new_deal.value_cents.unwrap_or(0),
        };
        self.tenants
            .entry(tenant_id.to_string())
            .or_default()
            .deals
            .push(deal.clone());
        Ok(deal)
    }

    async fn move_deal(
        &self,
        tenant_id: &str,
        deal_id: &str,
        stage: &str,
    ) -> Result<Deal, ToolError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut tenant = self
            .tenants
            .get_mut(tenant_id)
            .ok_or_else(|| ToolError::NotFound(format!("deal {deal_id}")))?;
        let deal = tenant
            .deals
            .iter_mut()
            .find(|d| d.id == deal_id)
            .ok_or_else(|| ToolError::NotFound(format!("deal {deal_id}")))?;
        deal.stage = stage.to_string();
        Ok(deal.clone())
    }

    async fn delete_deal(&self, tenant_id: &str, deal_id: &str) -> Result<(), ToolError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut tenant = self
            .tenants
            .get_mut(tenant_id)
            .ok_or_else(|| ToolError::NotFound(format!("deal {deal_id}")))?;
        let before = tenant.deals.len();
        tenant.deals.retain(|d| d.id != deal_id);
        if tenant.deals.len() == before {
            return Err(ToolError::NotFound(format!("deal {deal_id}")));
        }
        Ok(())
    }

    async fn search_contacts(
        &self,
        tenant_id: &str,
        query: &str,
    ) -> Result<Vec<Contact>, ToolError> {
        let query = query.to_lowercase();
        Ok(self
            .tenants
            .get(tenant_id)
            .map(|t| {
                t.contacts
                    .iter()
                    .filter(|c| {
                        c.name.to_lowercase().contains(&query)
                            || c.email
                                .as_deref()
                                .is_some_and(|e| e.to_lowercase().contains(&query))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_contact(
        &self,
        tenant_id: &str,
        contact_id: &str,
        update: ContactUpdate,
    ) -> Result<Contact, ToolError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut tenant = self
            .tenants
            .get_mut(tenant_id)
            .ok_or_else(|| ToolError::NotFound(format!("contact {contact_id}")))?;
        let contact = tenant
            .contacts
            .iter_mut()
            .find(|c| c.id == contact_id)
            .ok_or_else(|| ToolError::NotFound(format!("contact {contact_id}")))?;
        if let Some(name) = update.name {
            contact.name = name;
        }
        if let Some(email) = update.email {
            contact.email = Some(email);
        }
        if let Some(phone) = update.phone {
            contact.phone = Some(phone);
        }
        Ok(contact.clone())
    }

    async fn pipeline_summary(&self, tenant_id: &str) -> Result<Vec<StageSummary>, ToolError> {
        let deals = self
            .tenants
            .get(tenant_id)
            .map(|t| t.deals.clone())
            .unwrap_or_default();

        let mut stages: Vec<StageSummary> = Vec::new();
        for deal in deals {
            match stages.iter_mut().find(|s| s.stage == deal.stage) {
                Some(summary) => {
                    summary.deal_count += 1;
                    summary.value_cents += deal.value_cents;
                }
                None => stages.push(StageSummary {
                    stage: deal.stage,
                    deal_count: 1,
                    value_cents: deal.value_cents,
                }),
            }
        }
        Ok(stages)
    }
}
