use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const TICKET_SOURCE_COLD_CALL: &str = "cold_call";
pub const TICKET_TYPE_PHONE_CALL: &str = "phone_call";
pub const TICKET_PRIORITY_MEDIUM: &str = "medium";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Ticket {
    pub id: Uuid,
    #[serde(rename = "companyId")]
    pub company_id: Uuid,
    #[serde(rename = "customerId")]
    pub customer_id: Uuid,
    pub source: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub ticket_type: String,
    pub status: TicketStatus,
    pub priority: String,
    pub description: Option<String>,
    #[serde(rename = "serviceType")]
    pub service_type: Option<String>,
    #[serde(rename = "callRecordId")]
    pub call_record_id: Option<Uuid>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Description with `line` appended as a new paragraph.
    pub fn description_with(&self, line: &str) -> String {
        append_line(self.description.as_deref(), line)
    }
}

/// Appends a paragraph to an append-only log, trimming the joined result.
pub fn append_line(existing: Option<&str>, line: &str) -> String {
    format!("{}\n\n{}", existing.unwrap_or(""), line)
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
pub enum TicketStatus {
    /// Call still in progress.
    Live,
    /// Awaiting human follow-up.
    New,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Live => "live",
            TicketStatus::New => "new",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub company_id: Uuid,
    pub customer_id: Uuid,
    pub description: String,
}

/// Partial ticket update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketUpdate {
    pub description: Option<String>,
    pub status: Option<TicketStatus>,
    pub service_type: Option<String>,
}
