//! Post-call summary emails
//!
//! Sent after analysis when the caller or agent hung up normally, the company
//! has summaries switched on, and at least one recipient is configured.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    CallRecord, Customer, SETTING_SUMMARY_EMAILS_ENABLED, SETTING_SUMMARY_EMAIL_RECIPIENTS,
};
use super::email::EmailError;
use super::retell::{CallAnalyzed, ExtractedFields};
use super::store::{CallStore, StoreError};

pub const SUBJECT_TEMPLATE: &str = "Call Summary: {customerPhone} - {callStatus} ({companyName})";
pub const UNKNOWN_COMPANY: &str = "Unknown Company";

/// Disconnect reasons that count as a completed conversation.
const NOTIFY_ON_DISCONNECT: [&str; 2] = ["user_hangup", "agent_hangup"];

/// Sends one rendered call summary to one recipient.
#[async_trait::async_trait]
pub trait SummaryMailer: Send + Sync {
    async fn send_call_summary(&self, to: &str, subject: &str, summary: &CallSummary) -> Result<(), EmailError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSummary {
    pub call_id: String,
    pub ticket_id: Option<Uuid>,
    pub company_name: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: String,
    pub from_number: Option<String>,
    pub call_status: String,
    pub duration_seconds: Option<i64>,
    pub call_date: DateTime<Utc>,
    pub disconnect_reason: Option<String>,
    pub sentiment: String,
    pub transcript: Option<String>,
    pub call_summary: Option<String>,
    pub home_size: Option<String>,
    pub yard_size: Option<String>,
    pub pest_issue: Option<String>,
    pub street_address: Option<String>,
    pub preferred_service_time: Option<String>,
    pub decision_maker: Option<String>,
    pub lead_id: Option<String>,
    pub recording_url: Option<String>,
}

impl CallSummary {
    pub fn subject(&self) -> String {
        SUBJECT_TEMPLATE
            .replace("{customerPhone}", &self.customer_phone)
            .replace("{callStatus}", &self.call_status)
            .replace("{companyName}", &self.company_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disconnect,
    NoCompany,
    Disabled,
    NoRecipients,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Skipped(SkipReason),
    Sent { delivered: usize, attempted: usize },
}

/// Inputs gathered by the `call_analyzed` handler.
pub struct SummaryRequest<'a> {
    pub call: &'a CallAnalyzed,
    pub record: &'a CallRecord,
    pub extracted: &'a ExtractedFields,
    pub company_id: Option<Uuid>,
}

/// Whether a call with this disconnect reason should be summarized.
pub fn should_notify(disconnect_reason: Option<&str>) -> bool {
    disconnect_reason.is_some_and(|r| NOTIFY_ON_DISCONNECT.contains(&r))
}

/// Comma-separated recipient setting to a clean address list.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

/// Send the summary to every configured recipient.
///
/// Individual send failures are logged and counted; only store failures
/// are returned.
pub async fn maybe_send_summary(
    store: &dyn CallStore,
    mailer: &dyn SummaryMailer,
    request: SummaryRequest<'_>,
) -> Result<DispatchOutcome, StoreError> {
    let call = request.call;
    let record = request.record;

    let disconnect_reason = call
        .disconnection_reason
        .as_deref()
        .filter(|r| !r.is_empty())
        .or(record.disconnect_reason.as_deref());

    if !should_notify(disconnect_reason) {
        return Ok(DispatchOutcome::Skipped(SkipReason::Disconnect));
    }

    let Some(company_id) = request.company_id else {
        tracing::warn!("No company found for call {}, skipping summary email", call.call_id);
        return Ok(DispatchOutcome::Skipped(SkipReason::NoCompany));
    };

    let settings = store
        .company_settings(
            company_id,
            &[SETTING_SUMMARY_EMAILS_ENABLED, SETTING_SUMMARY_EMAIL_RECIPIENTS],
        )
        .await?;

    if settings.get(SETTING_SUMMARY_EMAILS_ENABLED).map(String::as_str) != Some("true") {
        return Ok(DispatchOutcome::Skipped(SkipReason::Disabled));
    }

    let recipients = settings
        .get(SETTING_SUMMARY_EMAIL_RECIPIENTS)
        .map(|raw| parse_recipients(raw))
        .unwrap_or_default();
    if recipients.is_empty() {
        tracing::warn!("No summary email recipients for company {}", company_id);
        return Ok(DispatchOutcome::Skipped(SkipReason::NoRecipients));
    }

    let company_name = match store.company_name(company_id).await {
        Ok(name) => name.unwrap_or_else(|| UNKNOWN_COMPANY.to_string()),
        Err(e) => {
            tracing::warn!("Failed to load company {} for summary email: {}", company_id, e);
            UNKNOWN_COMPANY.to_string()
        }
    };

    let customer = match record.customer_id {
        Some(id) => store.get_customer(id).await.unwrap_or_else(|e| {
            tracing::warn!("Failed to load customer {} for summary email: {}", id, e);
            None
        }),
        None => None,
    };

    let summary = build_summary(&request, customer.as_ref(), company_name, disconnect_reason);
    let subject = summary.subject();

    let mut delivered = 0;
    for recipient in &recipients {
        match mailer.send_call_summary(recipient, &subject, &summary).await {
            Ok(()) => delivered += 1,
            Err(e) => tracing::error!("Failed to send call summary to {}: {}", recipient, e),
        }
    }

    tracing::info!(
        "Sent call summary to {}/{} recipients for call {}",
        delivered,
        recipients.len(),
        call.call_id
    );

    Ok(DispatchOutcome::Sent {
        delivered,
        attempted: recipients.len(),
    })
}

fn build_summary(
    request: &SummaryRequest<'_>,
    customer: Option<&Customer>,
    company_name: String,
    disconnect_reason: Option<&str>,
) -> CallSummary {
    let call = request.call;
    let record = request.record;
    let extracted = request.extracted;

    let customer_name = customer
        .filter(|c| !c.has_placeholder_name())
        .map(Customer::full_name)
        .filter(|name| !name.is_empty())
        .or_else(|| extracted.decision_maker.clone());

    let lead_id = call
        .retell_llm_dynamic_variables
        .as_ref()
        .and_then(|vars| vars.get("lead_id"))
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    CallSummary {
        call_id: call.call_id.clone(),
        ticket_id: record.ticket_id,
        company_name,
        customer_name,
        customer_email: customer.and_then(|c| c.email.clone()),
        customer_phone: record.phone_number.clone(),
        from_number: record.from_number.clone(),
        call_status: record.call_status.as_str().to_string(),
        duration_seconds: record
            .duration_seconds
            .or_else(|| crate::models::duration_seconds_from_ms(call.duration_ms)),
        call_date: record
            .end_timestamp
            .or(record.start_timestamp)
            .unwrap_or_else(Utc::now),
        disconnect_reason: disconnect_reason.map(str::to_string),
        sentiment: extracted.sentiment.clone(),
        transcript: call.transcript.clone(),
        call_summary: Some(extracted.summary.clone()).filter(|s| !s.is_empty()),
        home_size: extracted.home_size.clone(),
        yard_size: extracted.yard_size.clone(),
        pest_issue: extracted.pest_issue.clone(),
        street_address: extracted.street_address.clone().or_else(|| record.street_address.clone()),
        preferred_service_time: extracted.preferred_service_time.clone(),
        decision_maker: extracted.decision_maker.clone(),
        lead_id,
        recording_url: call.recording_url.clone(),
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every send; addresses listed in `failing` return an error.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<(String, String)>>,
        pub failing: Vec<String>,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl SummaryMailer for RecordingMailer {
        async fn send_call_summary(&self, to: &str, subject: &str, _summary: &CallSummary) -> Result<(), EmailError> {
            if self.failing.iter().any(|f| f == to) {
                return Err(EmailError::SendFailed(format!("mailbox {} unavailable", to)));
            }
            self.sent.lock().unwrap().push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }
}
