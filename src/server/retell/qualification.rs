//! Qualification classifier
//!
//! Maps the AI's `is_qualified` signal to a ticket category. Every branch
//! leaves the ticket in `new` for follow-up; only the category differs.

use serde_json::Value;

use crate::models::TicketStatus;

pub const SERVICE_TYPE_SALES: &str = "Sales";
pub const SERVICE_TYPE_CUSTOMER_SERVICE: &str = "Customer Service";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualificationSignal {
    Qualified,
    NotQualified,
    Undecided,
}

impl QualificationSignal {
    /// Accepts a JSON boolean or the strings `"true"` / `"false"`.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Bool(true)) => QualificationSignal::Qualified,
            Some(Value::Bool(false)) => QualificationSignal::NotQualified,
            Some(Value::String(s)) if s == "true" => QualificationSignal::Qualified,
            Some(Value::String(s)) if s == "false" => QualificationSignal::NotQualified,
            _ => QualificationSignal::Undecided,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: TicketStatus,
    /// `None` leaves the ticket's category unchanged.
    pub service_type: Option<&'static str>,
    pub audit_line: &'static str,
}

pub fn classify(signal: QualificationSignal) -> Classification {
    match signal {
        QualificationSignal::Qualified => Classification {
            status: TicketStatus::New,
            service_type: Some(SERVICE_TYPE_SALES),
            audit_line: "✅ AI Qualification: QUALIFIED - Category set to Sales",
        },
        QualificationSignal::NotQualified => Classification {
            status: TicketStatus::New,
            service_type: Some(SERVICE_TYPE_CUSTOMER_SERVICE),
            audit_line: "❌ AI Qualification: UNQUALIFIED - Category set to Customer Service",
        },
        QualificationSignal::Undecided => Classification {
            status: TicketStatus::New,
            service_type: None,
            audit_line: "🤷 AI Qualification: no decision - category unchanged",
        },
    }
}
