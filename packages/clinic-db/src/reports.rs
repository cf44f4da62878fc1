//! Repositório de laudos diagnósticos

use chrono::NaiveDate;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{RecordScope, Report};

#[derive(Debug, Clone)]
pub struct ReportInput {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub diagnosis_summary: String,
    pub recommendations: String,
    pub follow_up_date: Option<NaiveDate>,
}

pub async fn create_report(pool: &SqlitePool, input: &ReportInput) -> Result<Report, DbError> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO reports (id, patient_id, doctor_id, appointment_id, diagnosis_summary, \
         recommendations, follow_up_date) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(input.patient_id)
    .bind(input.doctor_id)
    .bind(input.appointment_id)
    .bind(&input.diagnosis_summary)
    .bind(&input.recommendations)
    .bind(input.follow_up_date)
    .execute(pool)
    .await?;

    get_report(pool, id).await
}

pub async fn get_report(pool: &SqlitePool, id: Uuid) -> Result<Report, DbError> {
    sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("laudo"))
}

pub async fn update_report(
    pool: &SqlitePool,
    id: Uuid,
    input: &ReportInput,
) -> Result<Report, DbError> {
    let result = sqlx::query(
        "UPDATE reports SET patient_id = ?, doctor_id = ?, appointment_id = ?, \
         diagnosis_summary = ?, recommendations = ?, follow_up_date = ? WHERE id = ?",
    )
    .bind(input.patient_id)
    .bind(input.doctor_id)
    .bind(input.appointment_id)
    .bind(&input.diagnosis_summary)
    .bind(&input.recommendations)
    .bind(input.follow_up_date)
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("laudo"));
    }
    get_report(pool, id).await
}

pub async fn list_reports(pool: &SqlitePool, scope: RecordScope) -> Result<Vec<Report>, DbError> {
    let query = match scope {
        RecordScope::All => sqlx::query_as::<_, Report>("SELECT * FROM reports"),
        RecordScope::Patient(id) => {
            sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE patient_id = ?").bind(id)
        }
        RecordScope::Doctor(id) => {
            sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE doctor_id = ?").bind(id)
        }
    };
    Ok(query.fetch_all(pool).await?)
}

/// Remove o laudo; as cobranças vinculadas são removidas em cascata
pub async fn delete_report(pool: &SqlitePool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM reports WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("laudo"));
    }
    Ok(())
}
