//! Retell webhook payloads
//!
//! The provider posts either `{event, call: {...}}` or a flat object with the
//! call fields next to `event`. Both shapes are parsed here into one typed
//! variant per lifecycle event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::AgentDirection;
use crate::server::error::WebhookError;

pub type DynamicVariables = Map<String, Value>;

/// A webhook event, parsed and validated at the boundary.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    CallStarted(CallStarted),
    CallEnded(CallEnded),
    CallAnalyzed(CallAnalyzed),
    /// Any event type this endpoint does not act on.
    Unhandled { event_type: Option<String> },
}

impl WebhookEvent {
    pub fn parse(payload: Value) -> Result<Self, WebhookError> {
        let event_type = payload
            .get("event")
            .and_then(Value::as_str)
            .map(str::to_string);

        let call = match payload.get("call") {
            Some(call @ Value::Object(_)) => call.clone(),
            _ => payload,
        };

        let has_call_id = call
            .get("call_id")
            .and_then(Value::as_str)
            .is_some_and(|id| !id.trim().is_empty());
        if !has_call_id {
            return Err(WebhookError::BadRequest("call_id is required".to_string()));
        }

        let event = match event_type.as_deref() {
            Some("call_started") => WebhookEvent::CallStarted(from_call(call)?),
            Some("call_ended") => WebhookEvent::CallEnded(from_call(call)?),
            Some("call_analyzed") => WebhookEvent::CallAnalyzed(from_call(call)?),
            _ => WebhookEvent::Unhandled { event_type },
        };

        Ok(event)
    }

    pub fn name(&self) -> &str {
        match self {
            WebhookEvent::CallStarted(_) => "call_started",
            WebhookEvent::CallEnded(_) => "call_ended",
            WebhookEvent::CallAnalyzed(_) => "call_analyzed",
            WebhookEvent::Unhandled { event_type } => event_type.as_deref().unwrap_or("unknown"),
        }
    }
}

fn from_call<T: for<'de> Deserialize<'de>>(call: Value) -> Result<T, WebhookError> {
    serde_json::from_value(call)
        .map_err(|e| WebhookError::BadRequest(format!("Invalid call payload: {}", e)))
}

/// Identity of the voice agent that handled the call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentRef {
    pub agent_id: Option<String>,
    pub retell_llm_id: Option<String>,
    pub llm_id: Option<String>,
}

impl AgentRef {
    pub fn id(&self) -> Option<&str> {
        [&self.agent_id, &self.retell_llm_id, &self.llm_id]
            .into_iter()
            .filter_map(|id| id.as_deref())
            .find(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallStarted {
    pub call_id: String,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    #[serde(flatten)]
    pub agent: AgentRef,
    pub start_timestamp: Option<i64>,
    pub retell_llm_dynamic_variables: Option<DynamicVariables>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub opt_out_sensitive_data_storage: bool,
}

impl CallStarted {
    /// The customer's side of the call: the caller for inbound agents, the
    /// dialed number for outbound ones.
    pub fn customer_number(&self, direction: AgentDirection) -> Option<&str> {
        match direction {
            AgentDirection::Inbound => self.from_number.as_deref(),
            AgentDirection::Outbound => self.to_number.as_deref(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        timestamp_or_now(self.start_timestamp)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallEnded {
    pub call_id: String,
    pub call_status: Option<String>,
    pub end_timestamp: Option<i64>,
    pub duration_ms: Option<i64>,
    pub disconnection_reason: Option<String>,
    pub retell_llm_dynamic_variables: Option<DynamicVariables>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub opt_out_sensitive_data_storage: bool,
}

impl CallEnded {
    pub fn ended_at(&self) -> DateTime<Utc> {
        timestamp_or_now(self.end_timestamp)
    }

    /// Provider-reported outcome used in the ticket log.
    pub fn outcome(&self) -> &str {
        match self.call_status.as_deref() {
            Some(status) if !status.is_empty() => status,
            _ => "ended",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallAnalyzed {
    pub call_id: String,
    #[serde(flatten)]
    pub agent: AgentRef,
    pub call_status: Option<String>,
    pub duration_ms: Option<i64>,
    pub disconnection_reason: Option<String>,
    pub recording_url: Option<String>,
    pub transcript: Option<String>,
    pub call_analysis: Option<CallAnalysis>,
    pub retell_llm_dynamic_variables: Option<DynamicVariables>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub opt_out_sensitive_data_storage: bool,
}

/// Post-call analysis produced by the provider's model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CallAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_sentiment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_analysis_data: Option<Map<String, Value>>,
    /// Fields this service does not read, kept for storage.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl CallAnalysis {
    pub fn custom_field(&self, key: &str) -> Option<&Value> {
        self.custom_analysis_data.as_ref().and_then(|data| data.get(key))
    }
}

/// Only an explicit `true` opts out; `null` reads as unset.
fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

fn timestamp_or_now(millis: Option<i64>) -> DateTime<Utc> {
    millis
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_call_object_is_canonical() {
        let payload = json!({
            "event": "call_started",
            "call_id": "outer",
            "call": {
                "call_id": "inner",
                "from_number": "+15551234567",
                "agent_id": "agent_1",
                "start_timestamp": 1_700_000_000_000i64
            }
        });

        match WebhookEvent::parse(payload).unwrap() {
            WebhookEvent::CallStarted(call) => {
                assert_eq!(call.call_id, "inner");
                assert_eq!(call.agent.id(), Some("agent_1"));
                assert_eq!(call.started_at().timestamp_millis(), 1_700_000_000_000);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_flat_payload_supported() {
        let payload = json!({
            "event": "call_ended",
            "call_id": "abc",
            "duration_ms": 45000,
            "disconnection_reason": "user_hangup"
        });

        match WebhookEvent::parse(payload).unwrap() {
            WebhookEvent::CallEnded(call) => {
                assert_eq!(call.call_id, "abc");
                assert_eq!(call.duration_ms, Some(45000));
                assert_eq!(call.outcome(), "ended");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_missing_call_id_rejected() {
        let err = WebhookEvent::parse(json!({"event": "call_started", "call": {}})).unwrap_err();
        assert!(matches!(err, WebhookError::BadRequest(ref m) if m == "call_id is required"));

        let err = WebhookEvent::parse(json!({"event": "call_started", "call_id": ""})).unwrap_err();
        assert!(matches!(err, WebhookError::BadRequest(_)));
    }

    #[test]
    fn test_unknown_event_is_unhandled() {
        let event = WebhookEvent::parse(json!({"event": "transcript_updated", "call_id": "abc"})).unwrap();
        assert!(matches!(event, WebhookEvent::Unhandled { event_type: Some(ref t) } if t == "transcript_updated"));
    }

    #[test]
    fn test_agent_id_fallbacks() {
        let agent = AgentRef {
            agent_id: Some(String::new()),
            retell_llm_id: None,
            llm_id: Some("llm_9".to_string()),
        };
        assert_eq!(agent.id(), Some("llm_9"));
    }

    #[test]
    fn test_customer_number_follows_direction() {
        let call: CallStarted = serde_json::from_value(json!({
            "call_id": "abc",
            "from_number": "+15550000001",
            "to_number": "+15550000002"
        }))
        .unwrap();

        assert_eq!(call.customer_number(AgentDirection::Inbound), Some("+15550000001"));
        assert_eq!(call.customer_number(AgentDirection::Outbound), Some("+15550000002"));
    }

    #[test]
    fn test_null_opt_out_flag_reads_as_false() {
        let payload = json!({
            "event": "call_started",
            "call": {
                "call_id": "abc",
                "agent_id": "agent_1",
                "opt_out_sensitive_data_storage": null
            }
        });
        match WebhookEvent::parse(payload).unwrap() {
            WebhookEvent::CallStarted(call) => assert!(!call.opt_out_sensitive_data_storage),
            other => panic!("unexpected event: {:?}", other),
        }

        let ended: CallEnded = serde_json::from_value(json!({
            "call_id": "abc",
            "opt_out_sensitive_data_storage": true
        }))
        .unwrap();
        assert!(ended.opt_out_sensitive_data_storage);
    }

    #[test]
    fn test_call_analysis_preserves_unknown_fields() {
        let raw = json!({
            "call_summary": "Caller has ants",
            "in_voicemail": false,
            "custom_analysis_data": {"is_qualified": "true"}
        });
        let analysis: CallAnalysis = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(analysis.custom_field("is_qualified"), Some(&json!("true")));
        assert_eq!(serde_json::to_value(&analysis).unwrap(), raw);
    }
}
