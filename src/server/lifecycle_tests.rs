//! Call lifecycle tests
//!
//! Drive `CallLifecycle` end to end against the in-memory store:
//! 1. A new caller: customer, ticket and call record creation
//! 2. Call end: durations, billing and the ticket log
//! 3. Analysis: qualification, customer enrichment and summary emails
//! 4. Concurrent first calls from the same number
//! 5. Re-delivered events and best-effort failures

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use serde_json::{json, Value};
    use uuid::Uuid;

    use crate::models::*;
    use crate::server::error::WebhookError;
    use crate::server::lifecycle::{CallLifecycle, LifecycleOutcome};
    use crate::server::notifications::testing::RecordingMailer;
    use crate::server::notifications::SummaryMailer;
    use crate::server::retell::{CallAnalyzed, CallEnded, CallStarted};
    use crate::server::store::memory::{customer, MemoryStore};

    const AGENT: &str = "agent_inbound";
    const CALLER: &str = "+15551234567";

    struct Harness {
        store: Arc<MemoryStore>,
        mailer: Arc<RecordingMailer>,
        lifecycle: CallLifecycle,
        company_id: Uuid,
    }

    async fn harness_with(store: MemoryStore, direction: AgentDirection) -> Harness {
        let store = Arc::new(store);
        let mailer = Arc::new(RecordingMailer::default());
        let company_id = store.add_company("Acme Pest", AGENT, direction).await;
        let lifecycle = CallLifecycle::new(store.clone(), Some(mailer.clone() as Arc<dyn SummaryMailer>));
        Harness { store, mailer, lifecycle, company_id }
    }

    async fn harness() -> Harness {
        harness_with(MemoryStore::new(), AgentDirection::Inbound).await
    }

    fn started(call_id: &str, from: &str) -> CallStarted {
        serde_json::from_value(json!({
            "call_id": call_id,
            "agent_id": AGENT,
            "from_number": from,
            "to_number": "+15550001111",
            "start_timestamp": 1_741_100_000_000_i64,
            "retell_llm_dynamic_variables": { "home_size": "2000 sqft" }
        }))
        .unwrap()
    }

    fn ended(call_id: &str) -> CallEnded {
        serde_json::from_value(json!({
            "call_id": call_id,
            "call_status": "ended",
            "end_timestamp": 1_741_100_045_000_i64,
            "duration_ms": 45_000,
            "disconnection_reason": "user_hangup",
            "retell_llm_dynamic_variables": { "pest_issue": "ants", "home_size": "2000 sqft" }
        }))
        .unwrap()
    }

    fn analyzed(call_id: &str, custom: Value) -> CallAnalyzed {
        serde_json::from_value(json!({
            "call_id": call_id,
            "agent_id": AGENT,
            "disconnection_reason": "user_hangup",
            "recording_url": "https://cdn.example.com/rec.wav",
            "transcript": "User: there are ants in my kitchen",
            "call_analysis": {
                "call_summary": "Caller has ants in the kitchen.",
                "user_sentiment": "Positive",
                "custom_analysis_data": custom
            }
        }))
        .unwrap()
    }

    async fn only_ticket(store: &MemoryStore) -> Ticket {
        let tickets = store.tickets().await;
        assert_eq!(tickets.len(), 1);
        tickets[0].clone()
    }

    async fn only_record(store: &MemoryStore) -> CallRecord {
        let records = store.call_records().await;
        assert_eq!(records.len(), 1);
        records[0].clone()
    }

    // ============================================================================
    // call_started
    // ============================================================================

    #[tokio::test]
    async fn test_new_caller_creates_linked_ticket_and_record() {
        let h = harness().await;

        let outcome = h.lifecycle.on_call_started(started("call_a", "555-123-4567")).await.unwrap();

        let customers = h.store.customers().await;
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].full_name(), "Inbound Caller");
        assert_eq!(customers[0].phone, CALLER);
        assert_eq!(customers[0].company_id, h.company_id);

        let ticket = only_ticket(&h.store).await;
        assert_eq!(ticket.status, TicketStatus::Live);
        assert_eq!(ticket.source, "cold_call");
        assert_eq!(ticket.ticket_type, "phone_call");
        assert_eq!(ticket.priority, "medium");
        assert_eq!(
            ticket.description.as_deref(),
            Some("📞 Inbound call started at 2025-03-04T14:53:20.000Z")
        );

        let record = only_record(&h.store).await;
        assert_eq!(record.call_status, CallRecordStatus::InProgress);
        assert_eq!(record.phone_number, CALLER);
        assert_eq!(record.from_number.as_deref(), Some("555-123-4567"));
        assert_eq!(record.home_size.as_deref(), Some("2000 sqft"));

        assert_eq!(record.ticket_id, Some(ticket.id));
        assert_eq!(ticket.call_record_id, Some(record.id));
        assert_eq!(
            outcome,
            LifecycleOutcome {
                success: true,
                call_record_id: record.id,
                ticket_id: Some(ticket.id),
                action: "inbound_ticket_created",
            }
        );
    }

    #[tokio::test]
    async fn test_outbound_agent_uses_dialed_number() {
        let h = harness_with(MemoryStore::new(), AgentDirection::Outbound).await;

        h.lifecycle.on_call_started(started("call_a", "+15550001111")).await.unwrap();

        let customers = h.store.customers().await;
        assert_eq!(customers[0].phone, "+15550001111");
        assert_eq!(customers[0].full_name(), "Outbound Call");
        assert!(only_ticket(&h.store)
            .await
            .description
            .unwrap()
            .starts_with("📞 Outbound call started at"));
    }

    #[tokio::test]
    async fn test_existing_customer_address_seeds_record() {
        let h = harness().await;
        let mut known = customer(h.company_id, CALLER, "Jane", "Doe");
        known.city = Some("Austin".to_string());
        known.state = Some("TX".to_string());
        h.store.add_customer(known.clone()).await;

        h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();

        assert_eq!(h.store.customers().await.len(), 1);
        let record = only_record(&h.store).await;
        assert_eq!(record.customer_id, Some(known.id));
        assert_eq!(record.street_address.as_deref(), Some("Austin, TX"));
    }

    #[tokio::test]
    async fn test_invalid_phone_is_rejected_without_writes() {
        let h = harness().await;

        let err = h.lifecycle.on_call_started(started("call_a", "12345")).await.unwrap_err();

        assert!(matches!(err, WebhookError::BadRequest(ref msg) if msg == "Invalid phone number format"));
        assert!(h.store.customers().await.is_empty());
        assert!(h.store.tickets().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_agent() {
        let h = harness().await;
        let mut call = started("call_a", CALLER);
        call.agent.agent_id = Some("agent_other".to_string());

        let err = h.lifecycle.on_call_started(call).await.unwrap_err();
        assert_eq!(err.to_string(), "Company not found for agent ID");
    }

    #[tokio::test]
    async fn test_llm_id_identifies_agent() {
        let h = harness().await;
        let mut call = started("call_a", CALLER);
        call.agent.agent_id = None;
        call.agent.retell_llm_id = Some(AGENT.to_string());

        assert!(h.lifecycle.on_call_started(call).await.is_ok());
    }

    #[tokio::test]
    async fn test_customer_lookup_failure_is_internal_error() {
        let h = harness_with(
            MemoryStore { fail_customer_reads: true, ..Default::default() },
            AgentDirection::Inbound,
        )
        .await;

        let err = h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap_err();
        assert!(matches!(err, WebhookError::Internal(_)));
    }

    #[tokio::test]
    async fn test_link_failure_does_not_fail_request() {
        let h = harness_with(
            MemoryStore { fail_link: true, ..Default::default() },
            AgentDirection::Inbound,
        )
        .await;

        let outcome = h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();

        let record = only_record(&h.store).await;
        assert_eq!(outcome.call_record_id, record.id);
        assert_eq!(record.ticket_id, outcome.ticket_id);
        assert_eq!(only_ticket(&h.store).await.call_record_id, None);
    }

    #[tokio::test]
    async fn test_redelivered_call_started_creates_nothing() {
        let h = harness().await;

        let first = h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();
        let second = h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.store.customers().await.len(), 1);
        assert_eq!(h.store.tickets().await.len(), 1);
        assert_eq!(h.store.call_records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_share_one_customer() {
        let h = harness().await;
        // Both requests miss on lookup, so one of them hits the unique key.
        h.store.stale_phone_lookups.store(2, Ordering::SeqCst);

        let (a, b) = tokio::join!(
            h.lifecycle.on_call_started(started("call_a", CALLER)),
            h.lifecycle.on_call_started(started("call_b", CALLER)),
        );
        a.unwrap();
        b.unwrap();

        let customers = h.store.customers().await;
        assert_eq!(customers.len(), 1);

        let records = h.store.call_records().await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.customer_id == Some(customers[0].id)));
        assert_eq!(h.store.tickets().await.len(), 2);
    }

    #[tokio::test]
    async fn test_racing_duplicate_call_started_returns_winner() {
        let h = harness().await;
        let first = h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();

        // The duplicate misses the existing record and collides on insert.
        h.store.stale_call_record_lookups.store(1, Ordering::SeqCst);
        let second = h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();

        assert_eq!(second, first);
        assert_eq!(h.store.call_records().await.len(), 1);
        assert_eq!(h.store.customers().await.len(), 1);
    }

    // ============================================================================
    // call_ended
    // ============================================================================

    #[tokio::test]
    async fn test_call_ended_updates_record_and_ticket() {
        let h = harness().await;
        h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();

        let outcome = h.lifecycle.on_call_ended(ended("call_a")).await.unwrap();
        assert_eq!(outcome.action, "inbound_call_ended");

        let record = only_record(&h.store).await;
        assert_eq!(record.call_status, CallRecordStatus::Processing);
        assert_eq!(record.duration_seconds, Some(45));
        assert_eq!(record.billable_duration_seconds, Some(60));
        assert_eq!(record.disconnect_reason.as_deref(), Some("user_hangup"));
        assert_eq!(record.pest_issue.as_deref(), Some("ants"));

        let ticket = only_ticket(&h.store).await;
        let description = ticket.description.unwrap();
        let lines: Vec<&str> = description.split("\n\n").collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "📞 Inbound call on 2025-03-04T14:54:05.000Z - Status: ended (user_hangup)"
        );
        assert_eq!(ticket.service_type.as_deref(), Some("ants"));
    }

    #[tokio::test]
    async fn test_call_ended_without_record_fails() {
        let h = harness().await;

        let err = h.lifecycle.on_call_ended(ended("call_missing")).await.unwrap_err();
        assert!(matches!(err, WebhookError::Persistence("Failed to update call record")));
    }

    #[tokio::test]
    async fn test_redelivered_call_ended_appends_once() {
        let h = harness().await;
        h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();

        h.lifecycle.on_call_ended(ended("call_a")).await.unwrap();
        h.lifecycle.on_call_ended(ended("call_a")).await.unwrap();

        let description = only_ticket(&h.store).await.description.unwrap();
        assert_eq!(description.matches("Inbound call on").count(), 1);
    }

    // ============================================================================
    // call_analyzed
    // ============================================================================

    async fn enable_summaries(h: &Harness, recipients: &str) {
        h.store.set_setting(h.company_id, SETTING_SUMMARY_EMAILS_ENABLED, "true").await;
        h.store.set_setting(h.company_id, SETTING_SUMMARY_EMAIL_RECIPIENTS, recipients).await;
    }

    #[tokio::test]
    async fn test_qualified_call_completes_lifecycle() {
        let h = harness().await;
        enable_summaries(&h, "a@x.com,b@x.com").await;
        h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();
        h.lifecycle.on_call_ended(ended("call_a")).await.unwrap();

        let outcome = h
            .lifecycle
            .on_call_analyzed(analyzed("call_a", json!({ "is_qualified": "true" })))
            .await
            .unwrap();
        assert_eq!(outcome.action, "inbound_call_analyzed");

        let record = only_record(&h.store).await;
        assert_eq!(record.call_status, CallRecordStatus::Completed);
        assert_eq!(record.sentiment.as_deref(), Some("positive"));
        assert_eq!(record.recording_url.as_deref(), Some("https://cdn.example.com/rec.wav"));
        assert_eq!(record.transcript.as_deref(), Some("User: there are ants in my kitchen"));
        assert!(record.call_analysis.is_some());

        let ticket = only_ticket(&h.store).await;
        assert_eq!(ticket.status, TicketStatus::New);
        assert_eq!(ticket.service_type.as_deref(), Some("Sales"));
        let description = ticket.description.unwrap();
        assert!(description.contains("📊 Call Analysis: Caller has ants in the kitchen."));
        assert!(description.ends_with("✅ AI Qualification: QUALIFIED - Category set to Sales"));

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "a@x.com");
        assert_eq!(sent[1].0, "b@x.com");
        assert_eq!(sent[0].1, "Call Summary: +15551234567 - completed (Acme Pest)");
    }

    #[tokio::test]
    async fn test_unqualified_call_is_customer_service() {
        let h = harness().await;
        h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();

        h.lifecycle
            .on_call_analyzed(analyzed("call_a", json!({ "is_qualified": false })))
            .await
            .unwrap();

        let ticket = only_ticket(&h.store).await;
        assert_eq!(ticket.status, TicketStatus::New);
        assert_eq!(ticket.service_type.as_deref(), Some("Customer Service"));
    }

    #[tokio::test]
    async fn test_undecided_call_keeps_category() {
        let h = harness().await;
        h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();
        h.lifecycle.on_call_ended(ended("call_a")).await.unwrap();

        h.lifecycle.on_call_analyzed(analyzed("call_a", json!({}))).await.unwrap();

        let ticket = only_ticket(&h.store).await;
        assert_eq!(ticket.status, TicketStatus::New);
        assert_eq!(ticket.service_type.as_deref(), Some("ants"));
        assert!(ticket.description.unwrap().ends_with("🤷 AI Qualification: no decision - category unchanged"));
    }

    #[tokio::test]
    async fn test_analysis_fills_placeholder_customer() {
        let h = harness().await;
        h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();

        h.lifecycle
            .on_call_analyzed(analyzed(
                "call_a",
                json!({
                    "customer_first_name": "Jane",
                    "customer_last_name": "Doe",
                    "customer_street_address": "12 Oak St",
                    "customer_city": "Austin"
                }),
            ))
            .await
            .unwrap();

        let customers = h.store.customers().await;
        assert_eq!(customers[0].full_name(), "Jane Doe");
        assert_eq!(customers[0].address.as_deref(), Some("12 Oak St, Austin"));
        assert_eq!(customers[0].city.as_deref(), Some("Austin"));
    }

    #[tokio::test]
    async fn test_analysis_never_overwrites_known_customer() {
        let h = harness().await;
        let mut known = customer(h.company_id, CALLER, "Maria", "Lopez");
        known.address = Some("1 Main St".to_string());
        h.store.add_customer(known.clone()).await;
        h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();

        h.lifecycle
            .on_call_analyzed(analyzed(
                "call_a",
                json!({ "customer_first_name": "Jane", "customer_city": "Austin" }),
            ))
            .await
            .unwrap();

        let customers = h.store.customers().await;
        assert_eq!(customers[0].full_name(), "Maria Lopez");
        assert_eq!(customers[0].address.as_deref(), Some("1 Main St"));
        assert_eq!(customers[0].city, None);
    }

    #[tokio::test]
    async fn test_voicemail_never_notifies() {
        let h = harness().await;
        enable_summaries(&h, "a@x.com").await;
        h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();

        let mut call = analyzed("call_a", json!({ "is_qualified": "true" }));
        call.disconnection_reason = Some("voicemail".to_string());
        h.lifecycle.on_call_analyzed(call).await.unwrap();

        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failed_email_does_not_fail_request() {
        let store = Arc::new(MemoryStore::new());
        let company_id = store.add_company("Acme Pest", AGENT, AgentDirection::Inbound).await;
        store.set_setting(company_id, SETTING_SUMMARY_EMAILS_ENABLED, "true").await;
        store.set_setting(company_id, SETTING_SUMMARY_EMAIL_RECIPIENTS, "down@x.com").await;
        let mailer = Arc::new(RecordingMailer {
            failing: vec!["down@x.com".to_string()],
            ..Default::default()
        });
        let lifecycle = CallLifecycle::new(store.clone(), Some(mailer.clone() as Arc<dyn SummaryMailer>));
        lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();

        let outcome = lifecycle.on_call_analyzed(analyzed("call_a", json!({}))).await;

        assert!(outcome.is_ok());
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_redelivered_call_analyzed_is_quiet() {
        let h = harness().await;
        enable_summaries(&h, "a@x.com").await;
        h.lifecycle.on_call_started(started("call_a", CALLER)).await.unwrap();

        h.lifecycle.on_call_analyzed(analyzed("call_a", json!({ "is_qualified": "true" }))).await.unwrap();
        h.lifecycle.on_call_analyzed(analyzed("call_a", json!({ "is_qualified": "true" }))).await.unwrap();

        let description = only_ticket(&h.store).await.description.unwrap();
        assert_eq!(description.matches("AI Qualification").count(), 1);
        assert_eq!(h.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_call_analyzed_without_record_fails() {
        let h = harness().await;

        let err = h
            .lifecycle
            .on_call_analyzed(analyzed("call_missing", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to update call record");
    }
}
