//! Call record database operations
//!
//! Updates are keyed by the provider's `call_id`, so re-delivered events
//! rewrite the same row.

use sqlx::PgPool;
use crate::models::{CallAnalyzedUpdate, CallEndedUpdate, CallRecord, CallRecordStatus, NewCallRecord};

pub async fn get_by_call_id(pool: &PgPool, call_id: &str) -> Result<Option<CallRecord>, sqlx::Error> {
    sqlx::query_as::<_, CallRecord>(
        r#"
        SELECT id, call_id, ticket_id, customer_id, direction, phone_number,
               from_number, to_number, call_status, start_timestamp, end_timestamp,
               duration_seconds, billable_duration_seconds, disconnect_reason,
               retell_variables, home_size, yard_size, pest_issue, street_address,
               preferred_service_time, sentiment, transcript, recording_url,
               call_analysis, opt_out_sensitive_data_storage, created_at, updated_at
        FROM call_records
        WHERE call_id = $1
        "#
    )
    .bind(call_id)
    .fetch_optional(pool)
    .await
}

pub async fn create(pool: &PgPool, new: &NewCallRecord) -> Result<CallRecord, sqlx::Error> {
    sqlx::query_as::<_, CallRecord>(
        r#"
        INSERT INTO call_records (
            call_id, ticket_id, customer_id, direction, phone_number, from_number, to_number,
            call_status, start_timestamp, retell_variables, opt_out_sensitive_data_storage,
            home_size, yard_size, pest_issue, street_address, preferred_service_time, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, NOW())
        RETURNING id, call_id, ticket_id, customer_id, direction, phone_number,
                  from_number, to_number, call_status, start_timestamp, end_timestamp,
                  duration_seconds, billable_duration_seconds, disconnect_reason,
                  retell_variables, home_size, yard_size, pest_issue, street_address,
                  preferred_service_time, sentiment, transcript, recording_url,
                  call_analysis, opt_out_sensitive_data_storage, created_at, updated_at
        "#
    )
    .bind(&new.call_id)
    .bind(new.ticket_id)
    .bind(new.customer_id)
    .bind(new.direction)
    .bind(&new.phone_number)
    .bind(&new.from_number)
    .bind(&new.to_number)
    .bind(CallRecordStatus::InProgress)
    .bind(new.start_timestamp)
    .bind(&new.retell_variables)
    .bind(new.opt_out_sensitive_data_storage)
    .bind(&new.details.home_size)
    .bind(&new.details.yard_size)
    .bind(&new.details.pest_issue)
    .bind(&new.details.street_address)
    .bind(&new.details.preferred_service_time)
    .fetch_one(pool)
    .await
}

/// Mark the call as ended and awaiting analysis.
pub async fn update_ended(
    pool: &PgPool,
    call_id: &str,
    update: &CallEndedUpdate,
) -> Result<Option<CallRecord>, sqlx::Error> {
    sqlx::query_as::<_, CallRecord>(
        r#"
        UPDATE call_records
        SET call_status = $2,
            end_timestamp = $3,
            duration_seconds = $4,
            billable_duration_seconds = $5,
            disconnect_reason = $6,
            retell_variables = $7,
            opt_out_sensitive_data_storage = $8,
            home_size = $9,
            yard_size = $10,
            pest_issue = $11,
            street_address = COALESCE($12, street_address),
            preferred_service_time = $13,
            updated_at = NOW()
        WHERE call_id = $1
        RETURNING id, call_id, ticket_id, customer_id, direction, phone_number,
                  from_number, to_number, call_status, start_timestamp, end_timestamp,
                  duration_seconds, billable_duration_seconds, disconnect_reason,
                  retell_variables, home_size, yard_size, pest_issue, street_address,
                  preferred_service_time, sentiment, transcript, recording_url,
                  call_analysis, opt_out_sensitive_data_storage, created_at, updated_at
        "#
    )
    .bind(call_id)
    .bind(CallRecordStatus::Processing)
    .bind(update.end_timestamp)
    .bind(update.duration_seconds)
    .bind(update.billable_duration_seconds)
    .bind(&update.disconnect_reason)
    .bind(&update.retell_variables)
    .bind(update.opt_out_sensitive_data_storage)
    .bind(&update.details.home_size)
    .bind(&update.details.yard_size)
    .bind(&update.details.pest_issue)
    .bind(&update.details.street_address)
    .bind(&update.details.preferred_service_time)
    .fetch_optional(pool)
    .await
}

/// Store the post-call analysis and complete the record.
pub async fn update_analyzed(
    pool: &PgPool,
    call_id: &str,
    update: &CallAnalyzedUpdate,
) -> Result<Option<CallRecord>, sqlx::Error> {
    sqlx::query_as::<_, CallRecord>(
        r#"
        UPDATE call_records
        SET call_status = $2,
            recording_url = $3,
            transcript = $4,
            call_analysis = $5,
            sentiment = $6,
            retell_variables = $7,
            opt_out_sensitive_data_storage = $8,
            home_size = $9,
            yard_size = $10,
            pest_issue = $11,
            street_address = COALESCE($12, street_address),
            preferred_service_time = $13,
            updated_at = NOW()
        WHERE call_id = $1
        RETURNING id, call_id, ticket_id, customer_id, direction, phone_number,
                  from_number, to_number, call_status, start_timestamp, end_timestamp,
                  duration_seconds, billable_duration_seconds, disconnect_reason,
                  retell_variables, home_size, yard_size, pest_issue, street_address,
                  preferred_service_time, sentiment, transcript, recording_url,
                  call_analysis, opt_out_sensitive_data_storage, created_at, updated_at
        "#
    )
    .bind(call_id)
    .bind(CallRecordStatus::Completed)
    .bind(&update.recording_url)
    .bind(&update.transcript)
    .bind(&update.call_analysis)
    .bind(&update.sentiment)
    .bind(&update.retell_variables)
    .bind(update.opt_out_sensitive_data_storage)
    .bind(&update.details.home_size)
    .bind(&update.details.yard_size)
    .bind(&update.details.pest_issue)
    .bind(&update.details.street_address)
    .bind(&update.details.preferred_service_time)
    .fetch_optional(pool)
    .await
}
