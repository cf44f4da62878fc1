//! Repositório de cobranças
//!
//! Uma cobrança pertence a um laudo; o escopo de visibilidade é herdado do
//! paciente e do médico do laudo.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{Billing, Money, PaymentMethod, PaymentStatus, RecordScope};

#[derive(Debug, Clone)]
pub struct BillingInput {
    pub report_id: Uuid,
    pub amount: Money,
    pub insurance_coverage: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub billing_date: NaiveDate,
}

pub async fn create_billing(pool: &SqlitePool, input: &BillingInput) -> Result<Billing, DbError> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO billings (id, report_id, amount_cents, insurance_coverage_cents, \
         payment_method, payment_status, billing_date) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(input.report_id)
    .bind(input.amount.cents())
    .bind(input.insurance_coverage.cents())
    .bind(input.payment_method.as_str())
    .bind(input.payment_status.as_str())
    .bind(input.billing_date)
    .execute(pool)
    .await?;

    get_billing(pool, id).await
}

pub async fn get_billing(pool: &SqlitePool, id: Uuid) -> Result<Billing, DbError> {
    sqlx::query_as::<_, Billing>("SELECT * FROM billings WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("cobrança"))
}

pub async fn update_billing(
    pool: &SqlitePool,
    id: Uuid,
    input: &BillingInput,
) -> Result<Billing, DbError> {
    let result = sqlx::query(
        "UPDATE billings SET report_id = ?, amount_cents = ?, insurance_coverage_cents = ?, \
         payment_method = ?, payment_status = ?, billing_date = ? WHERE id = ?",
    )
    .bind(input.report_id)
    .bind(input.amount.cents())
    .bind(input.insurance_coverage.cents())
    .bind(input.payment_method.as_str())
    .bind(input.payment_status.as_str())
    .bind(input.billing_date)
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("cobrança"));
    }
    get_billing(pool, id).await
}

pub async fn list_billings(
    pool: &SqlitePool,
    scope: RecordScope,
) -> Result<Vec<Billing>, DbError> {
    let query = match scope {
        RecordScope::All => sqlx::query_as::<_, Billing>(
            "SELECT * FROM billings ORDER BY billing_date DESC",
        ),
        RecordScope::Patient(id) => sqlx::query_as::<_, Billing>(
            "SELECT b.* FROM billings b JOIN reports r ON r.id = b.report_id \
             WHERE r.patient_id = ? ORDER BY b.billing_date DESC",
        )
        .bind(id),
        RecordScope::Doctor(id) => sqlx::query_as::<_, Billing>(
            "SELECT b.* FROM billings b JOIN reports r ON r.id = b.report_id \
             WHERE r.doctor_id = ? ORDER BY b.billing_date DESC",
        )
        .bind(id),
    };
    Ok(query.fetch_all(pool).await?)
}
