//! Ticket database operations

use sqlx::PgPool;
use uuid::Uuid;
use crate::models::{
    NewTicket, Ticket, TicketStatus, TicketUpdate, TICKET_PRIORITY_MEDIUM, TICKET_SOURCE_COLD_CALL,
    TICKET_TYPE_PHONE_CALL,
};

pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Ticket>, sqlx::Error> {
    sqlx::query_as::<_, Ticket>(
        r#"
        SELECT id, company_id, customer_id, source, type, status, priority,
               description, service_type, call_record_id, created_at, updated_at
        FROM tickets
        WHERE id = $1
        "#
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Open a live phone-call ticket.
pub async fn create(pool: &PgPool, new: &NewTicket) -> Result<Ticket, sqlx::Error> {
    sqlx::query_as::<_, Ticket>(
        r#"
        INSERT INTO tickets (company_id, customer_id, source, type, status, priority, description, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        RETURNING id, company_id, customer_id, source, type, status, priority,
                  description, service_type, call_record_id, created_at, updated_at
        "#
    )
    .bind(new.company_id)
    .bind(new.customer_id)
    .bind(TICKET_SOURCE_COLD_CALL)
    .bind(TICKET_TYPE_PHONE_CALL)
    .bind(TicketStatus::Live)
    .bind(TICKET_PRIORITY_MEDIUM)
    .bind(&new.description)
    .fetch_one(pool)
    .await
}

pub async fn update(pool: &PgPool, id: Uuid, update: &TicketUpdate) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE tickets
        SET description = COALESCE($2, description),
            status = COALESCE($3, status),
            service_type = COALESCE($4, service_type),
            updated_at = NOW()
        WHERE id = $1
        "#
    )
    .bind(id)
    .bind(&update.description)
    .bind(update.status)
    .bind(&update.service_type)
    .execute(pool)
    .await?;
    Ok(())
}

/// Point the ticket back at its call record.
pub async fn set_call_record(pool: &PgPool, id: Uuid, call_record_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tickets SET call_record_id = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(call_record_id)
        .execute(pool)
        .await?;
    Ok(())
}
