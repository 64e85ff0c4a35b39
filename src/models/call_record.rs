use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::AgentDirection;

/// Shortest billable unit, in seconds.
pub const BILLING_INCREMENT_SECONDS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct CallRecord {
    pub id: Uuid,
    #[serde(rename = "callId")]
    pub call_id: String,
    #[serde(rename = "ticketId")]
    pub ticket_id: Option<Uuid>,
    #[serde(rename = "customerId")]
    pub customer_id: Option<Uuid>,
    pub direction: AgentDirection,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    #[serde(rename = "fromNumber")]
    pub from_number: Option<String>,
    #[serde(rename = "toNumber")]
    pub to_number: Option<String>,
    #[serde(rename = "callStatus")]
    pub call_status: CallRecordStatus,
    #[serde(rename = "startTimestamp")]
    pub start_timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "endTimestamp")]
    pub end_timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "durationSeconds")]
    pub duration_seconds: Option<i64>,
    #[serde(rename = "billableDurationSeconds")]
    pub billable_duration_seconds: Option<i64>,
    #[serde(rename = "disconnectReason")]
    pub disconnect_reason: Option<String>,
    #[serde(rename = "retellVariables")]
    pub retell_variables: Option<serde_json::Value>,
    #[serde(rename = "homeSize")]
    pub home_size: Option<String>,
    #[serde(rename = "yardSize")]
    pub yard_size: Option<String>,
    #[serde(rename = "pestIssue")]
    pub pest_issue: Option<String>,
    #[serde(rename = "streetAddress")]
    pub street_address: Option<String>,
    #[serde(rename = "preferredServiceTime")]
    pub preferred_service_time: Option<String>,
    pub sentiment: Option<String>,
    pub transcript: Option<String>,
    #[serde(rename = "recordingUrl")]
    pub recording_url: Option<String>,
    #[serde(rename = "callAnalysis")]
    pub call_analysis: Option<serde_json::Value>,
    #[serde(rename = "optOutSensitiveDataStorage")]
    pub opt_out_sensitive_data_storage: bool,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Call record progression: in-progress -> processing -> completed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "call_record_status", rename_all = "kebab-case")]
pub enum CallRecordStatus {
    InProgress,
    /// Call ended, analysis not yet received.
    Processing,
    Completed,
}

impl CallRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallRecordStatus::InProgress => "in-progress",
            CallRecordStatus::Processing => "processing",
            CallRecordStatus::Completed => "completed",
        }
    }

    /// Whether the record has already reached (or passed) `other`.
    pub fn has_reached(&self, other: CallRecordStatus) -> bool {
        self.rank() >= other.rank()
    }

    fn rank(&self) -> u8 {
        match self {
            CallRecordStatus::InProgress => 0,
            CallRecordStatus::Processing => 1,
            CallRecordStatus::Completed => 2,
        }
    }
}

/// Business fields captured during or after the call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallDetails {
    pub home_size: Option<String>,
    pub yard_size: Option<String>,
    pub pest_issue: Option<String>,
    pub street_address: Option<String>,
    pub preferred_service_time: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCallRecord {
    pub call_id: String,
    pub ticket_id: Uuid,
    pub customer_id: Uuid,
    pub direction: AgentDirection,
    pub phone_number: String,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub start_timestamp: DateTime<Utc>,
    pub retell_variables: Option<serde_json::Value>,
    pub opt_out_sensitive_data_storage: bool,
    pub details: CallDetails,
}

#[derive(Debug, Clone)]
pub struct CallEndedUpdate {
    pub end_timestamp: DateTime<Utc>,
    pub duration_seconds: Option<i64>,
    pub billable_duration_seconds: i64,
    pub disconnect_reason: Option<String>,
    pub retell_variables: Option<serde_json::Value>,
    pub opt_out_sensitive_data_storage: bool,
    pub details: CallDetails,
}

#[derive(Debug, Clone)]
pub struct CallAnalyzedUpdate {
    pub recording_url: Option<String>,
    pub transcript: Option<String>,
    pub call_analysis: Option<serde_json::Value>,
    pub sentiment: String,
    pub retell_variables: Option<serde_json::Value>,
    pub opt_out_sensitive_data_storage: bool,
    pub details: CallDetails,
}

/// Rounds a call up to the next 30-second increment, with a 30-second floor.
pub fn billable_duration_seconds(duration_seconds: Option<i64>) -> i64 {
    match duration_seconds {
        Some(secs) if secs > 0 => {
            (secs + BILLING_INCREMENT_SECONDS - 1) / BILLING_INCREMENT_SECONDS * BILLING_INCREMENT_SECONDS
        }
        _ => BILLING_INCREMENT_SECONDS,
    }
}

/// Milliseconds to whole seconds, rounding half up.
pub fn duration_seconds_from_ms(duration_ms: Option<i64>) -> Option<i64> {
    duration_ms
        .filter(|ms| *ms != 0)
        .map(|ms| (ms as f64 / 1000.0).round() as i64)
}
