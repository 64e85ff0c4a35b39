//! Retell voice-agent webhook support
//!
//! - Payload parsing into typed lifecycle events
//! - Signature verification
//! - Field extraction from analysis, dynamic variables and transcript
//! - Qualification classification

pub mod payload;
pub mod signature;
pub mod extract;
pub mod qualification;

pub use payload::{CallAnalysis, CallAnalyzed, CallEnded, CallStarted, DynamicVariables, WebhookEvent};
pub use extract::{extract, ExtractedFields};
pub use qualification::{classify, Classification, QualificationSignal};
