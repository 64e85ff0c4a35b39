//! Customer resolution for incoming calls
//!
//! Customers are unique per (phone, company). Two webhooks for the same new
//! caller can race on the insert; the loser re-reads the winner's row.

use serde_json::Value;
use uuid::Uuid;

use crate::models::{AgentDirection, Customer, CustomerUpdate, NewCustomer};
use super::error::WebhookError;
use super::retell::CallAnalysis;
use super::store::{CallStore, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCustomer {
    pub id: Uuid,
    /// Known address, used to seed the call record before analysis arrives.
    pub address: Option<String>,
}

impl From<&Customer> for ResolvedCustomer {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id,
            address: customer.display_address(),
        }
    }
}

/// Find the customer for `phone` in `company_id`, creating a placeholder if new.
///
/// `phone` must already be normalized.
pub async fn find_or_create(
    store: &dyn CallStore,
    phone: &str,
    company_id: Uuid,
    direction: AgentDirection,
) -> Result<ResolvedCustomer, WebhookError> {
    let existing = store
        .find_customer_by_phone(phone, company_id)
        .await
        .map_err(|e| WebhookError::Internal(format!("Customer lookup failed: {}", e)))?;

    if let Some(customer) = existing {
        return Ok(ResolvedCustomer::from(&customer));
    }

    let new = NewCustomer::placeholder(company_id, phone, direction);
    match store.insert_customer(&new).await {
        Ok(customer) => {
            tracing::info!("Created customer {} for company {}", customer.id, company_id);
            Ok(ResolvedCustomer::from(&customer))
        }
        Err(StoreError::UniqueViolation(constraint)) => {
            tracing::info!("Customer insert lost race on {}, re-reading", constraint);
            match store.find_customer_by_phone(phone, company_id).await {
                Ok(Some(customer)) => Ok(ResolvedCustomer::from(&customer)),
                Ok(None) => {
                    tracing::error!("Customer missing after unique violation for company {}", company_id);
                    Err(WebhookError::Persistence("Customer constraint violation and retry failed"))
                }
                Err(e) => {
                    tracing::error!("Customer re-read failed: {}", e);
                    Err(WebhookError::Persistence("Customer constraint violation and retry failed"))
                }
            }
        }
        Err(e) => {
            tracing::error!("Failed to create customer: {}", e);
            Err(WebhookError::Persistence("Failed to create customer"))
        }
    }
}

/// Customer fields the post-call analysis may fill in.
///
/// Names are only written over placeholders; address fields only when the
/// customer has no address data at all.
pub fn fill_once_update(customer: &Customer, analysis: &CallAnalysis) -> CustomerUpdate {
    let field = |key: &str| trimmed(analysis.custom_field(key));
    let mut update = CustomerUpdate::default();

    if customer.has_placeholder_name() {
        update.first_name = field("customer_first_name");
        update.last_name = field("customer_last_name");
    }

    if !customer.has_address() {
        let street = field("customer_street_address");
        update.city = field("customer_city");
        update.state = field("customer_state");
        update.zip_code = field("customer_zip");

        let parts: Vec<&str> = [&street, &update.city, &update.state, &update.zip_code]
            .iter()
            .filter_map(|part| part.as_deref())
            .collect();
        if !parts.is_empty() {
            update.address = Some(parts.join(", "));
        }
    }

    update
}

fn trimmed(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
