//! Company, voice agent and company settings lookups

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;
use crate::models::{AgentAssignment, AgentDirection, SETTING_INBOUND_AGENT_ID, SETTING_OUTBOUND_AGENT_ID};

/// Resolve the company and direction of an active voice agent.
pub async fn get_agent_assignment(
    pool: &PgPool,
    agent_id: &str,
) -> Result<Option<AgentAssignment>, sqlx::Error> {
    sqlx::query_as::<_, AgentAssignment>(
        r#"
        SELECT company_id, agent_direction
        FROM agents
        WHERE agent_id = $1 AND is_active = TRUE
        "#
    )
    .bind(agent_id)
    .fetch_optional(pool)
    .await
}

/// Companies that configure their agent ids as settings rather than agent rows.
pub async fn get_agent_assignment_from_settings(
    pool: &PgPool,
    agent_id: &str,
) -> Result<Option<AgentAssignment>, sqlx::Error> {
    let row: Option<(Uuid, String)> = sqlx::query_as(
        r#"
        SELECT company_id, setting_key
        FROM company_settings
        WHERE setting_key IN ($2, $3) AND setting_value = $1
        ORDER BY setting_key
        LIMIT 1
        "#
    )
    .bind(agent_id)
    .bind(SETTING_INBOUND_AGENT_ID)
    .bind(SETTING_OUTBOUND_AGENT_ID)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(company_id, key)| AgentAssignment {
        company_id,
        direction: if key == SETTING_OUTBOUND_AGENT_ID {
            AgentDirection::Outbound
        } else {
            AgentDirection::Inbound
        },
    }))
}

pub async fn get_settings(
    pool: &PgPool,
    company_id: Uuid,
    keys: &[&str],
) -> Result<HashMap<String, String>, sqlx::Error> {
    let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();

    let rows: Vec<(String, Option<String>)> = sqlx::query_as(
        r#"
        SELECT setting_key, setting_value
        FROM company_settings
        WHERE company_id = $1 AND setting_key = ANY($2)
        "#
    )
    .bind(company_id)
    .bind(&keys)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect())
}

pub async fn get_name(pool: &PgPool, company_id: Uuid) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT name FROM companies WHERE id = $1")
        .bind(company_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(name,)| name))
}
