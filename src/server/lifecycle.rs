//! Ticket and call record lifecycle for voice-agent calls
//!
//! `call_started` opens a live ticket and an in-progress call record,
//! `call_ended` closes the record out, and `call_analyzed` stores the
//! post-call analysis, classifies the ticket and notifies the company.
//! Only the call record write can fail a request. Everything after it is
//! enrichment: failures are logged and the webhook still succeeds.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    append_line, billable_duration_seconds, duration_seconds_from_ms, CallAnalyzedUpdate, CallEndedUpdate,
    CallRecord, CallRecordStatus, NewCallRecord, NewTicket, Ticket, TicketUpdate,
};
use super::customers::{fill_once_update, find_or_create};
use super::error::WebhookError;
use super::notifications::{maybe_send_summary, SummaryMailer, SummaryRequest};
use super::phone::normalize_phone_number;
use super::retell::{classify, extract, CallAnalysis, CallAnalyzed, CallEnded, CallStarted, QualificationSignal};
use super::store::{CallStore, StoreError};

pub const ACTION_TICKET_CREATED: &str = "inbound_ticket_created";
pub const ACTION_CALL_ENDED: &str = "inbound_call_ended";
pub const ACTION_CALL_ANALYZED: &str = "inbound_call_analyzed";

/// Success body returned to the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleOutcome {
    pub success: bool,
    pub call_record_id: Uuid,
    pub ticket_id: Option<Uuid>,
    pub action: &'static str,
}

impl LifecycleOutcome {
    fn new(record: &CallRecord, action: &'static str) -> Self {
        Self {
            success: true,
            call_record_id: record.id,
            ticket_id: record.ticket_id,
            action,
        }
    }
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Clone)]
pub struct CallLifecycle {
    store: Arc<dyn CallStore>,
    mailer: Option<Arc<dyn SummaryMailer>>,
}

impl CallLifecycle {
    pub fn new(store: Arc<dyn CallStore>, mailer: Option<Arc<dyn SummaryMailer>>) -> Self {
        Self { store, mailer }
    }

    pub async fn on_call_started(&self, call: CallStarted) -> Result<LifecycleOutcome, WebhookError> {
        let store = self.store.as_ref();

        let Some(agent_id) = call.agent.id() else {
            tracing::warn!("call_started {} has no agent id", call.call_id);
            return Err(WebhookError::NotFound("Company not found for agent ID"));
        };

        let agent = store
            .find_agent(agent_id)
            .await
            .map_err(|e| WebhookError::Internal(format!("Agent lookup failed: {}", e)))?
            .ok_or(WebhookError::NotFound("Company not found for agent ID"))?;

        let raw_phone = call.customer_number(agent.direction);
        let phone = raw_phone
            .and_then(normalize_phone_number)
            .ok_or_else(|| WebhookError::BadRequest("Invalid phone number format".to_string()))?;

        let existing = store
            .get_call_record(&call.call_id)
            .await
            .map_err(|e| WebhookError::Internal(format!("Call record lookup failed: {}", e)))?;
        if let Some(record) = existing {
            tracing::info!("call_started {} already recorded, returning existing ticket", call.call_id);
            return Ok(LifecycleOutcome::new(&record, ACTION_TICKET_CREATED));
        }

        let customer = find_or_create(store, &phone, agent.company_id, agent.direction).await?;

        let started_at = call.started_at();
        let ticket = store
            .insert_ticket(&NewTicket {
                company_id: agent.company_id,
                customer_id: customer.id,
                description: format!("📞 {} call started at {}", agent.direction.label(), iso(started_at)),
            })
            .await
            .map_err(|e| {
                tracing::error!("Ticket creation failed for call {}: {}", call.call_id, e);
                WebhookError::Persistence("Failed to create ticket")
            })?;

        let extracted = extract(None, None, call.retell_llm_dynamic_variables.as_ref());
        let mut details = extracted.details();
        details.street_address = customer.address.clone().or(details.street_address);

        let inserted = store
            .insert_call_record(&NewCallRecord {
                call_id: call.call_id.clone(),
                ticket_id: ticket.id,
                customer_id: customer.id,
                direction: agent.direction,
                phone_number: phone,
                from_number: call.from_number.clone(),
                to_number: call.to_number.clone(),
                start_timestamp: started_at,
                retell_variables: call.retell_llm_dynamic_variables.clone().map(serde_json::Value::Object),
                opt_out_sensitive_data_storage: call.opt_out_sensitive_data_storage,
                details,
            })
            .await;

        let record = match inserted {
            Ok(record) => record,
            Err(StoreError::UniqueViolation(_)) => {
                // A concurrent delivery of the same call won the insert.
                let winner = store.get_call_record(&call.call_id).await.ok().flatten();
                let Some(winner) = winner else {
                    tracing::error!("Call record for {} conflicted but could not be re-read", call.call_id);
                    return Err(WebhookError::Persistence("Failed to create call record"));
                };
                tracing::warn!(
                    "call_started {} raced another delivery, ticket {} left unlinked",
                    call.call_id,
                    ticket.id
                );
                return Ok(LifecycleOutcome::new(&winner, ACTION_TICKET_CREATED));
            }
            Err(e) => {
                tracing::error!("Call record creation failed for call {}: {}", call.call_id, e);
                return Err(WebhookError::Persistence("Failed to create call record"));
            }
        };

        if let Err(e) = store.link_ticket(ticket.id, record.id).await {
            tracing::warn!("Failed to link ticket {} to call record {}: {}", ticket.id, record.id, e);
        }

        tracing::info!(
            "Created ticket {} and call record {} for call {}",
            ticket.id,
            record.id,
            call.call_id
        );
        Ok(LifecycleOutcome::new(&record, ACTION_TICKET_CREATED))
    }

    pub async fn on_call_ended(&self, call: CallEnded) -> Result<LifecycleOutcome, WebhookError> {
        let store = self.store.as_ref();
        let previous = self.require_record(&call.call_id).await?;

        let extracted = extract(None, None, call.retell_llm_dynamic_variables.as_ref());
        let duration_seconds = duration_seconds_from_ms(call.duration_ms);
        let ended_at = call.ended_at();

        let update = CallEndedUpdate {
            end_timestamp: ended_at,
            duration_seconds,
            billable_duration_seconds: billable_duration_seconds(duration_seconds),
            disconnect_reason: call.disconnection_reason.clone(),
            retell_variables: call.retell_llm_dynamic_variables.clone().map(serde_json::Value::Object),
            opt_out_sensitive_data_storage: call.opt_out_sensitive_data_storage,
            details: extracted.details(),
        };

        let record = store
            .update_call_ended(&call.call_id, &update)
            .await
            .map_err(|e| {
                tracing::error!("Call record update failed for call {}: {}", call.call_id, e);
                WebhookError::Persistence("Failed to update call record")
            })?
            .ok_or(WebhookError::Persistence("Failed to update call record"))?;

        if previous.call_status.has_reached(CallRecordStatus::Processing) {
            tracing::info!("call_ended {} re-delivered, ticket log unchanged", call.call_id);
        } else if let Some(ticket) = self.linked_ticket(&record).await {
            let reason = call
                .disconnection_reason
                .as_deref()
                .filter(|r| !r.is_empty())
                .map(|r| format!(" ({})", r))
                .unwrap_or_default();
            let line = format!(
                "📞 {} call on {} - Status: {}{}",
                record.direction.label(),
                iso(ended_at),
                call.outcome(),
                reason
            );

            let ticket_update = TicketUpdate {
                description: Some(ticket.description_with(&line)),
                status: None,
                service_type: extracted.pest_issue.clone(),
            };
            if let Err(e) = store.update_ticket(ticket.id, &ticket_update).await {
                tracing::warn!("Failed to update ticket {} after call end: {}", ticket.id, e);
            }
        }

        Ok(LifecycleOutcome::new(&record, ACTION_CALL_ENDED))
    }

    pub async fn on_call_analyzed(&self, call: CallAnalyzed) -> Result<LifecycleOutcome, WebhookError> {
        let store = self.store.as_ref();
        let previous = self.require_record(&call.call_id).await?;
        let redelivered = previous.call_status.has_reached(CallRecordStatus::Completed);

        let analysis = call.call_analysis.as_ref();
        let extracted = extract(
            analysis,
            call.transcript.as_deref(),
            call.retell_llm_dynamic_variables.as_ref(),
        );

        let call_analysis = analysis
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| WebhookError::Internal(format!("Call analysis not serializable: {}", e)))?;

        let update = CallAnalyzedUpdate {
            recording_url: call.recording_url.clone(),
            transcript: call.transcript.clone(),
            call_analysis,
            sentiment: extracted.sentiment.clone(),
            retell_variables: call.retell_llm_dynamic_variables.clone().map(serde_json::Value::Object),
            opt_out_sensitive_data_storage: call.opt_out_sensitive_data_storage,
            details: extracted.details(),
        };

        let record = store
            .update_call_analyzed(&call.call_id, &update)
            .await
            .map_err(|e| {
                tracing::error!("Call record update failed for call {}: {}", call.call_id, e);
                WebhookError::Persistence("Failed to update call record")
            })?
            .ok_or(WebhookError::Persistence("Failed to update call record"))?;

        let ticket = self.linked_ticket(&record).await;

        if redelivered {
            tracing::info!("call_analyzed {} re-delivered, ticket and notifications unchanged", call.call_id);
            return Ok(LifecycleOutcome::new(&record, ACTION_CALL_ANALYZED));
        }

        if let Some(ticket) = &ticket {
            let mut description = ticket.description.clone();
            if !extracted.summary.is_empty() {
                description = Some(ticket.description_with(&format!("📊 Call Analysis: {}", extracted.summary)));
            }

            let classification = classify(QualificationSignal::from_value(
                analysis.and_then(|a| a.custom_field("is_qualified")),
            ));
            let description = append_line(description.as_deref(), classification.audit_line);

            let ticket_update = TicketUpdate {
                description: Some(description),
                status: Some(classification.status),
                service_type: classification.service_type.map(str::to_string),
            };
            match store.update_ticket(ticket.id, &ticket_update).await {
                Ok(_) => tracing::info!(
                    "Ticket {} classified as {} ({})",
                    ticket.id,
                    classification.status.as_str(),
                    classification.service_type.unwrap_or("unchanged")
                ),
                Err(e) => tracing::warn!("Failed to update ticket {} after analysis: {}", ticket.id, e),
            }
        }

        if let (Some(analysis), Some(customer_id)) = (analysis, record.customer_id) {
            if analysis.custom_analysis_data.is_some() {
                self.enrich_customer(customer_id, analysis).await;
            }
        }

        if let Some(mailer) = &self.mailer {
            let company_id = match &ticket {
                Some(t) => Some(t.company_id),
                None => self.company_for_agent(call.agent.id()).await,
            };

            let request = SummaryRequest {
                call: &call,
                record: &record,
                extracted: &extracted,
                company_id,
            };
            match maybe_send_summary(store, mailer.as_ref(), request).await {
                Ok(outcome) => tracing::debug!("Summary dispatch for call {}: {:?}", call.call_id, outcome),
                Err(e) => tracing::error!("Summary dispatch failed for call {}: {}", call.call_id, e),
            }
        }

        Ok(LifecycleOutcome::new(&record, ACTION_CALL_ANALYZED))
    }

    async fn require_record(&self, call_id: &str) -> Result<CallRecord, WebhookError> {
        match self.store.get_call_record(call_id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => {
                tracing::error!("No call record for call {}", call_id);
                Err(WebhookError::Persistence("Failed to update call record"))
            }
            Err(e) => {
                tracing::error!("Call record lookup failed for call {}: {}", call_id, e);
                Err(WebhookError::Persistence("Failed to update call record"))
            }
        }
    }

    async fn linked_ticket(&self, record: &CallRecord) -> Option<Ticket> {
        let ticket_id = record.ticket_id?;
        match self.store.get_ticket(ticket_id).await {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::warn!("Failed to load ticket {}: {}", ticket_id, e);
                None
            }
        }
    }

    async fn company_for_agent(&self, agent_id: Option<&str>) -> Option<Uuid> {
        match self.store.find_agent(agent_id?).await {
            Ok(agent) => agent.map(|a| a.company_id),
            Err(e) => {
                tracing::warn!("Agent lookup failed: {}", e);
                None
            }
        }
    }

    async fn enrich_customer(&self, customer_id: Uuid, analysis: &CallAnalysis) {
        let customer = match self.store.get_customer(customer_id).await {
            Ok(Some(customer)) => customer,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Failed to load customer {}: {}", customer_id, e);
                return;
            }
        };

        let update = fill_once_update(&customer, analysis);
        if update.is_empty() {
            return;
        }

        match self.store.update_customer(customer_id, &update).await {
            Ok(()) => tracing::info!("Updated customer {} from call analysis", customer_id),
            Err(e) => tracing::warn!("Customer update failed for {}: {}", customer_id, e),
        }
    }
}
