//! Email service for call summary notifications
//!
//! Sends multipart (plain text + HTML) messages over SMTP via the lettre crate.

use lettre::{
    message::{Mailbox, Message, MultiPart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use thiserror::Error;

use super::notifications::{CallSummary, SummaryMailer};

/// Email service for sending call summaries
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_email: Mailbox,
    app_url: String,
}

/// Errors that can occur when sending emails
#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Failed to build email message: {0}")]
    MessageBuild(String),

    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("SMTP configuration error: {0}")]
    ConfigError(String),
}

impl EmailService {
    /// Create a new email service from environment variables
    ///
    /// Required environment variables:
    /// - SMTP_HOST: SMTP server hostname
    /// - SMTP_PORT: SMTP server port
    /// - SMTP_USERNAME: SMTP authentication username
    /// - SMTP_PASSWORD: SMTP authentication password
    /// - SMTP_FROM_EMAIL: From email address
    /// - SMTP_FROM_NAME: From name (optional, defaults to "Pest Desk")
    /// - APP_URL: Base URL for the dashboard (for ticket links)
    pub fn from_env() -> Result<Self, EmailError> {
        let smtp_host = std::env::var("SMTP_HOST")
            .map_err(|_| EmailError::ConfigError("SMTP_HOST not set".to_string()))?;

        let smtp_port = std::env::var("SMTP_PORT")
            .map_err(|_| EmailError::ConfigError("SMTP_PORT not set".to_string()))?
            .parse::<u16>()
            .map_err(|_| EmailError::ConfigError("SMTP_PORT must be a valid port number".to_string()))?;

        let smtp_username = std::env::var("SMTP_USERNAME")
            .map_err(|_| EmailError::ConfigError("SMTP_USERNAME not set".to_string()))?;

        let smtp_password = std::env::var("SMTP_PASSWORD")
            .map_err(|_| EmailError::ConfigError("SMTP_PASSWORD not set".to_string()))?;

        let smtp_from_email = std::env::var("SMTP_FROM_EMAIL")
            .map_err(|_| EmailError::ConfigError("SMTP_FROM_EMAIL not set".to_string()))?;

        let smtp_from_name = std::env::var("SMTP_FROM_NAME")
            .unwrap_or_else(|_| "Pest Desk".to_string());

        let app_url = std::env::var("APP_URL")
            .map_err(|_| EmailError::ConfigError("APP_URL not set".to_string()))?;

        Self::new(
            &smtp_host,
            smtp_port,
            &smtp_username,
            &smtp_password,
            &smtp_from_email,
            &smtp_from_name,
            &app_url,
        )
    }

    /// Create a new email service with explicit configuration
    ///
    /// Sends through `smtp_host` as a relay with STARTTLS required. Servers
    /// without TLS fail at send time. No connection is made here.
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        smtp_username: &str,
        smtp_password: &str,
        from_email: &str,
        from_name: &str,
        app_url: &str,
    ) -> Result<Self, EmailError> {
        let from_mailbox: Mailbox = format!("{} <{}>", from_name, from_email)
            .parse()
            .map_err(|e| EmailError::InvalidAddress(format!("Invalid from address: {}", e)))?;

        let tls_parameters = TlsParameters::builder(smtp_host.to_string())
            .build()
            .map_err(|e| EmailError::ConfigError(format!("Failed to build TLS parameters: {}", e)))?;

        let credentials = Credentials::new(smtp_username.to_string(), smtp_password.to_string());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .map_err(|e| EmailError::ConfigError(format!("Failed to create SMTP transport: {}", e)))?
            .port(smtp_port)
            .credentials(credentials)
            .tls(Tls::Required(tls_parameters))
            .build();

        Ok(Self {
            mailer,
            from_email: from_mailbox,
            app_url: app_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: String,
        text_body: String,
    ) -> Result<(), EmailError> {
        let to_mailbox: Mailbox = to_email
            .parse()
            .map_err(|e| EmailError::InvalidAddress(format!("Invalid recipient address: {}", e)))?;

        let email = Message::builder()
            .from(self.from_email.clone())
            .to(to_mailbox)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(text_body, html_body))
            .map_err(|e| EmailError::MessageBuild(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        tracing::info!("Email sent successfully to {}", to_email);
        Ok(())
    }
}

#[async_trait::async_trait]
impl SummaryMailer for EmailService {
    async fn send_call_summary(&self, to: &str, subject: &str, summary: &CallSummary) -> Result<(), EmailError> {
        let html = build_summary_html(summary, &self.app_url);
        let text = build_summary_text(summary, &self.app_url);
        self.send_email(to, subject, html, text).await
    }
}

/// Minutes:seconds, or "N/A" when the duration is unknown.
fn format_duration(seconds: Option<i64>) -> String {
    match seconds {
        Some(s) if s > 0 => format!("{}:{:02}", s / 60, s % 60),
        _ => "N/A".to_string(),
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn sentiment_color(sentiment: &str) -> &'static str {
    match sentiment {
        "positive" => "#10b981",
        "neutral" => "#f59e0b",
        "negative" => "#ef4444",
        _ => "#6b7280",
    }
}

fn ticket_url(summary: &CallSummary, app_url: &str) -> Option<String> {
    summary.ticket_id.map(|id| format!("{}/tickets/{}", app_url, id))
}

/// Label/value rows shown in both renderings, skipping empty values.
fn detail_rows(summary: &CallSummary) -> Vec<(&'static str, String)> {
    let optional = [
        ("Customer", summary.customer_name.clone()),
        ("Email", summary.customer_email.clone()),
        ("Phone", Some(summary.customer_phone.clone())),
        ("From", summary.from_number.clone()),
        ("Status", Some(summary.call_status.clone())),
        ("Duration", Some(format_duration(summary.duration_seconds))),
        ("Date", Some(summary.call_date.format("%Y-%m-%d %H:%M UTC").to_string())),
        ("Disconnect Reason", summary.disconnect_reason.clone()),
        ("Sentiment", Some(summary.sentiment.clone())),
        ("Pest Issue", summary.pest_issue.clone()),
        ("Street Address", summary.street_address.clone()),
        ("Home Size", summary.home_size.clone()),
        ("Yard Size", summary.yard_size.clone()),
        ("Decision Maker", summary.decision_maker.clone()),
        ("Preferred Service Time", summary.preferred_service_time.clone()),
        ("Lead ID", summary.lead_id.clone()),
    ];

    optional
        .into_iter()
        .filter_map(|(label, value)| value.filter(|v| !v.is_empty()).map(|v| (label, v)))
        .collect()
}

/// Build HTML version of the call summary email
pub fn build_summary_html(summary: &CallSummary, app_url: &str) -> String {
    let rows: String = detail_rows(summary)
        .iter()
        .map(|(label, value)| {
            format!(
                r#"<tr><td class="label">{}</td><td>{}</td></tr>"#,
                label,
                escape_html(value)
            )
        })
        .collect::<Vec<_>>()
        .join("\n                ");

    let ai_summary = summary
        .call_summary
        .as_deref()
        .map(|s| format!("<h3>AI Summary</h3>\n            <p>{}</p>", escape_html(s)))
        .unwrap_or_default();

    let transcript = summary
        .transcript
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| format!("<h3>Transcript</h3>\n            <pre class=\"transcript\">{}</pre>", escape_html(t)))
        .unwrap_or_default();

    let mut links = Vec::new();
    if let Some(url) = summary.recording_url.as_deref().filter(|u| !u.is_empty()) {
        links.push(format!(r#"<a href="{}" class="button">Listen to Recording</a>"#, escape_html(url)));
    }
    if let Some(url) = ticket_url(summary, app_url) {
        links.push(format!(r#"<a href="{}" class="button">Open Ticket</a>"#, escape_html(&url)));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Call Summary Report</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif;
            line-height: 1.6;
            color: #333;
            max-width: 700px;
            margin: 0 auto;
            padding: 20px;
            background-color: #f4f4f4;
        }}
        .container {{
            background-color: #ffffff;
            padding: 32px;
            border-radius: 8px;
            box-shadow: 0 2px 4px rgba(0, 0, 0, 0.1);
        }}
        .header {{
            text-align: center;
            margin-bottom: 24px;
        }}
        .header h1 {{
            color: #1e40af;
            margin: 0;
            font-size: 24px;
        }}
        .sentiment {{
            display: inline-block;
            padding: 2px 10px;
            border-radius: 12px;
            color: #ffffff;
            background-color: {};
        }}
        td {{
            padding: 6px 12px 6px 0;
            vertical-align: top;
        }}
        .label {{
            font-weight: 600;
            color: #475569;
            white-space: nowrap;
        }}
        .transcript {{
            white-space: pre-wrap;
            background-color: #f8fafc;
            padding: 12px;
            border-radius: 6px;
            font-size: 13px;
        }}
        .button {{
            display: inline-block;
            padding: 10px 24px;
            margin: 8px 8px 0 0;
            background-color: #2563eb;
            color: #ffffff !important;
            text-decoration: none;
            border-radius: 6px;
            font-weight: 600;
        }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>Call Summary Report</h1>
            <p>{}</p>
            <span class="sentiment">{}</span>
        </div>
        <div class="content">
            <table>
                {}
            </table>
            {}
            {}
            <div>{}</div>
        </div>
    </div>
</body>
</html>"#,
        sentiment_color(&summary.sentiment),
        escape_html(&summary.company_name),
        escape_html(&summary.sentiment),
        rows,
        ai_summary,
        transcript,
        links.join(" ")
    )
}

/// Build plain text version of the call summary email
pub fn build_summary_text(summary: &CallSummary, app_url: &str) -> String {
    let mut text = format!("Call Summary Report - {}\n\n", summary.company_name);

    for (label, value) in detail_rows(summary) {
        text.push_str(&format!("{}: {}\n", label, value));
    }

    if let Some(ai_summary) = summary.call_summary.as_deref() {
        text.push_str(&format!("\nAI Summary:\n{}\n", ai_summary));
    }
    if let Some(transcript) = summary.transcript.as_deref().filter(|t| !t.is_empty()) {
        text.push_str(&format!("\nTranscript:\n{}\n", transcript));
    }
    if let Some(url) = summary.recording_url.as_deref().filter(|u| !u.is_empty()) {
        text.push_str(&format!("\nRecording: {}\n", url));
    }
    if let Some(url) = ticket_url(summary, app_url) {
        text.push_str(&format!("Ticket: {}\n", url));
    }

    text
}
