//! Structured field extraction from call data
//!
//! Each field is taken from the most trusted source that has it:
//! post-call analysis, then dynamic variables collected during the call,
//! then (pest issue only) a keyword scan of the transcript.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::payload::{CallAnalysis, DynamicVariables};
use crate::models::CallDetails;

pub const DEFAULT_SENTIMENT: &str = "neutral";
pub const PREFERRED_SERVICE_TIMES: [&str; 3] = ["AM", "PM", "anytime"];

const PEST_ISSUE_MAX_CHARS: usize = 255;

fn pest_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)(ant|roach|cockroach|spider|termite|rodent|rat|mouse|wasp|bee|fly|mosquito|tick|flea|bed bug|pest|insect|bug).{0,50}",
        )
        .expect("pest keyword pattern is valid")
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub sentiment: String,
    pub summary: String,
    pub home_size: Option<String>,
    pub yard_size: Option<String>,
    pub pest_issue: Option<String>,
    pub street_address: Option<String>,
    pub preferred_service_time: Option<String>,
    pub decision_maker: Option<String>,
}

impl ExtractedFields {
    pub fn details(&self) -> CallDetails {
        CallDetails {
            home_size: self.home_size.clone(),
            yard_size: self.yard_size.clone(),
            pest_issue: self.pest_issue.clone(),
            street_address: self.street_address.clone(),
            preferred_service_time: self.preferred_service_time.clone(),
        }
    }
}

/// Extract call fields. Pure: the same inputs always give the same output.
pub fn extract(
    call_analysis: Option<&CallAnalysis>,
    transcript: Option<&str>,
    dynamic_variables: Option<&DynamicVariables>,
) -> ExtractedFields {
    let pick = |analysis_keys: &[&str], variable_keys: &[&str]| -> Option<String> {
        let from_analysis = call_analysis.and_then(|a| {
            analysis_keys.iter().find_map(|k| text_value(a.custom_field(k)))
        });
        from_analysis.or_else(|| {
            dynamic_variables.and_then(|vars| {
                variable_keys.iter().find_map(|k| text_value(vars.get(*k)))
            })
        })
    };

    let pest_issue = pick(&["pest_issue"], &["pest_issue"])
        .or_else(|| transcript.and_then(scan_pest_issue));

    let preferred_service_time = pick(&["preferred_service_time"], &["preferred_service_time"])
        .filter(|t| PREFERRED_SERVICE_TIMES.contains(&t.as_str()));

    let sentiment = call_analysis
        .and_then(|a| a.user_sentiment.as_deref())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_else(|| DEFAULT_SENTIMENT.to_string());

    let summary = call_analysis
        .and_then(|a| a.call_summary.clone())
        .unwrap_or_default();

    ExtractedFields {
        sentiment,
        summary,
        home_size: pick(&["home_size"], &["home_size"]),
        yard_size: pick(&["yard_size"], &["yard_size"]),
        pest_issue,
        street_address: pick(
            &["customer_street_address", "street_address"],
            &["street_address", "customer_street_address"],
        ),
        preferred_service_time,
        decision_maker: pick(&["decision_maker"], &["decision_maker"]),
    }
}

/// Keyword scan of a transcript: every match with trailing context,
/// joined and capped at 255 characters.
pub fn scan_pest_issue(transcript: &str) -> Option<String> {
    let matches: Vec<&str> = pest_pattern()
        .find_iter(transcript)
        .map(|m| m.as_str())
        .collect();

    if matches.is_empty() {
        return None;
    }

    Some(matches.join(", ").chars().take(PEST_ISSUE_MAX_CHARS).collect())
}

/// Non-empty text from a JSON scalar; numbers are rendered as text.
fn text_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
