use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::AgentDirection;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Customer {
    pub id: Uuid,
    #[serde(rename = "companyId")]
    pub company_id: Uuid,
    pub phone: String,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "zipCode")]
    pub zip_code: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        format!("{} {}", first, last).trim().to_string()
    }

    /// True while the name is still one of the call-direction placeholders.
    pub fn has_placeholder_name(&self) -> bool {
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        [AgentDirection::Inbound, AgentDirection::Outbound]
            .iter()
            .any(|d| d.placeholder_name() == (first, last))
    }

    /// True if any address component holds a non-blank value.
    pub fn has_address(&self) -> bool {
        [&self.address, &self.city, &self.state, &self.zip_code]
            .iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }

    /// The free-text address, or the city/state/zip components joined.
    pub fn display_address(&self) -> Option<String> {
        if let Some(address) = self.address.as_deref().filter(|a| !a.trim().is_empty()) {
            return Some(address.to_string());
        }

        let parts: Vec<&str> = [&self.city, &self.state, &self.zip_code]
            .iter()
            .filter_map(|field| field.as_deref())
            .filter(|v| !v.trim().is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub company_id: Uuid,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
}

impl NewCustomer {
    pub fn placeholder(company_id: Uuid, phone: &str, direction: AgentDirection) -> Self {
        let (first_name, last_name) = direction.placeholder_name();
        Self {
            company_id,
            phone: phone.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        }
    }
}

/// Partial customer update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

impl CustomerUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
