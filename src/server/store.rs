//! Persistence interface for the call lifecycle
//!
//! - `CallStore` trait: everything the webhook handlers read or write
//! - `PgCallStore`: PostgreSQL implementation over the `db` query modules
//! - an in-memory store for tests that enforces the same unique keys

use std::collections::HashMap;

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AgentAssignment, CallAnalyzedUpdate, CallEndedUpdate, CallRecord, Customer, CustomerUpdate,
    NewCallRecord, NewCustomer, NewTicket, Ticket, TicketUpdate,
};
use super::db;

/// Store-related errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return StoreError::UniqueViolation(constraint);
            }
        }
        StoreError::Database(err)
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait defining the persistence interface for call lifecycle webhooks
#[async_trait::async_trait]
pub trait CallStore: Send + Sync {
    /// Company and direction for an active voice agent
    async fn find_agent(&self, agent_id: &str) -> StoreResult<Option<AgentAssignment>>;

    async fn find_customer_by_phone(&self, phone: &str, company_id: Uuid) -> StoreResult<Option<Customer>>;

    async fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>>;

    /// Insert a customer; `UniqueViolation` if (phone, company) exists
    async fn insert_customer(&self, new: &NewCustomer) -> StoreResult<Customer>;

    async fn update_customer(&self, id: Uuid, update: &CustomerUpdate) -> StoreResult<()>;

    async fn insert_ticket(&self, new: &NewTicket) -> StoreResult<Ticket>;

    async fn get_ticket(&self, id: Uuid) -> StoreResult<Option<Ticket>>;

    async fn update_ticket(&self, id: Uuid, update: &TicketUpdate) -> StoreResult<()>;

    /// Set the ticket's back-reference to its call record
    async fn link_ticket(&self, ticket_id: Uuid, call_record_id: Uuid) -> StoreResult<()>;

    async fn get_call_record(&self, call_id: &str) -> StoreResult<Option<CallRecord>>;

    async fn insert_call_record(&self, new: &NewCallRecord) -> StoreResult<CallRecord>;

    /// `None` if no record exists for `call_id`
    async fn update_call_ended(&self, call_id: &str, update: &CallEndedUpdate) -> StoreResult<Option<CallRecord>>;

    /// `None` if no record exists for `call_id`
    async fn update_call_analyzed(&self, call_id: &str, update: &CallAnalyzedUpdate) -> StoreResult<Option<CallRecord>>;

    /// Values for the requested setting keys that are present
    async fn company_settings(&self, company_id: Uuid, keys: &[&str]) -> StoreResult<HashMap<String, String>>;

    async fn company_name(&self, company_id: Uuid) -> StoreResult<Option<String>>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgCallStore {
    pool: PgPool,
}

impl PgCallStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CallStore for PgCallStore {
    async fn find_agent(&self, agent_id: &str) -> StoreResult<Option<AgentAssignment>> {
        if let Some(assignment) = db::companies::get_agent_assignment(&self.pool, agent_id).await? {
            return Ok(Some(assignment));
        }
        Ok(db::companies::get_agent_assignment_from_settings(&self.pool, agent_id).await?)
    }

    async fn find_customer_by_phone(&self, phone: &str, company_id: Uuid) -> StoreResult<Option<Customer>> {
        Ok(db::customers::get_by_phone(&self.pool, phone, company_id).await?)
    }

    async fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        Ok(db::customers::get_by_id(&self.pool, id).await?)
    }

    async fn insert_customer(&self, new: &NewCustomer) -> StoreResult<Customer> {
        Ok(db::customers::create(&self.pool, new).await?)
    }

    async fn update_customer(&self, id: Uuid, update: &CustomerUpdate) -> StoreResult<()> {
        Ok(db::customers::update(&self.pool, id, update).await?)
    }

    async fn insert_ticket(&self, new: &NewTicket) -> StoreResult<Ticket> {
        Ok(db::tickets::create(&self.pool, new).await?)
    }

    async fn get_ticket(&self, id: Uuid) -> StoreResult<Option<Ticket>> {
        Ok(db::tickets::get_by_id(&self.pool, id).await?)
    }

    async fn update_ticket(&self, id: Uuid, update: &TicketUpdate) -> StoreResult<()> {
        Ok(db::tickets::update(&self.pool, id, update).await?)
    }

    async fn link_ticket(&self, ticket_id: Uuid, call_record_id: Uuid) -> StoreResult<()> {
        Ok(db::tickets::set_call_record(&self.pool, ticket_id, call_record_id).await?)
    }

    async fn get_call_record(&self, call_id: &str) -> StoreResult<Option<CallRecord>> {
        Ok(db::call_records::get_by_call_id(&self.pool, call_id).await?)
    }

    async fn insert_call_record(&self, new: &NewCallRecord) -> StoreResult<CallRecord> {
        Ok(db::call_records::create(&self.pool, new).await?)
    }

    async fn update_call_ended(&self, call_id: &str, update: &CallEndedUpdate) -> StoreResult<Option<CallRecord>> {
        Ok(db::call_records::update_ended(&self.pool, call_id, update).await?)
    }

    async fn update_call_analyzed(&self, call_id: &str, update: &CallAnalyzedUpdate) -> StoreResult<Option<CallRecord>> {
        Ok(db::call_records::update_analyzed(&self.pool, call_id, update).await?)
    }

    async fn company_settings(&self, company_id: Uuid, keys: &[&str]) -> StoreResult<HashMap<String, String>> {
        Ok(db::companies::get_settings(&self.pool, company_id, keys).await?)
    }

    async fn company_name(&self, company_id: Uuid) -> StoreResult<Option<String>> {
        Ok(db::companies::get_name(&self.pool, company_id).await?)
    }
}
