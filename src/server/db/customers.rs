//! Customer database operations

use sqlx::PgPool;
use uuid::Uuid;
use crate::models::{Customer, CustomerUpdate, NewCustomer};

pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Customer>, sqlx::Error> {
    sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, company_id, phone, first_name, last_name, email,
               address, city, state, zip_code, created_at, updated_at
        FROM customers
        WHERE id = $1
        "#
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn get_by_phone(
    pool: &PgPool,
    phone: &str,
    company_id: Uuid,
) -> Result<Option<Customer>, sqlx::Error> {
    sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, company_id, phone, first_name, last_name, email,
               address, city, state, zip_code, created_at, updated_at
        FROM customers
        WHERE phone = $1 AND company_id = $2
        "#
    )
    .bind(phone)
    .bind(company_id)
    .fetch_optional(pool)
    .await
}

/// Insert a customer. Fails with a unique violation on
/// `customers_phone_company_unique` if the pair already exists.
pub async fn create(pool: &PgPool, new: &NewCustomer) -> Result<Customer, sqlx::Error> {
    sqlx::query_as::<_, Customer>(
        r#"
        INSERT INTO customers (company_id, phone, first_name, last_name, created_at)
        VALUES ($1, $2, $3, $4, NOW())
        RETURNING id, company_id, phone, first_name, last_name, email,
                  address, city, state, zip_code, created_at, updated_at
        "#
    )
    .bind(new.company_id)
    .bind(&new.phone)
    .bind(&new.first_name)
    .bind(&new.last_name)
    .fetch_one(pool)
    .await
}

pub async fn update(pool: &PgPool, id: Uuid, update: &CustomerUpdate) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE customers
        SET first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            address = COALESCE($4, address),
            city = COALESCE($5, city),
            state = COALESCE($6, state),
            zip_code = COALESCE($7, zip_code),
            updated_at = NOW()
        WHERE id = $1
        "#
    )
    .bind(id)
    .bind(&update.first_name)
    .bind(&update.last_name)
    .bind(&update.address)
    .bind(&update.city)
    .bind(&update.state)
    .bind(&update.zip_code)
    .execute(pool)
    .await?;
    Ok(())
}
