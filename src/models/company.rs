use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SETTING_SUMMARY_EMAILS_ENABLED: &str = "call_summary_emails_enabled";
pub const SETTING_SUMMARY_EMAIL_RECIPIENTS: &str = "call_summary_email_recipients";
pub const SETTING_INBOUND_AGENT_ID: &str = "retell_inbound_agent_id";
pub const SETTING_OUTBOUND_AGENT_ID: &str = "retell_outbound_agent_id";

/// Which way a voice agent dials; decides the customer phone and placeholder name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "agent_direction", rename_all = "lowercase")]
pub enum AgentDirection {
    #[default]
    Inbound,
    Outbound,
}

impl AgentDirection {
    pub fn placeholder_name(&self) -> (&'static str, &'static str) {
        match self {
            AgentDirection::Inbound => ("Inbound", "Caller"),
            AgentDirection::Outbound => ("Outbound", "Call"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgentDirection::Inbound => "Inbound",
            AgentDirection::Outbound => "Outbound",
        }
    }
}

/// Company owning a voice agent, as resolved from the agent id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct AgentAssignment {
    pub company_id: Uuid,
    #[sqlx(rename = "agent_direction")]
    pub direction: AgentDirection,
}
