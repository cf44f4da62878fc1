//! Repositório de agendamentos

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{Appointment, AppointmentStatus, RecordScope, VisitType};

/// Campos de um agendamento, usados tanto na criação quanto na edição
#[derive(Debug, Clone)]
pub struct AppointmentInput {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: i64,
    pub reason: String,
    pub status: AppointmentStatus,
    pub covered_by_insurance: bool,
    pub visit_type: VisitType,
}

pub async fn create_appointment(
    pool: &SqlitePool,
    input: &AppointmentInput,
) -> Result<Appointment, DbError> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO appointments (id, patient_id, doctor_id, appointment_date, duration_minutes, \
         reason, status, covered_by_insurance, visit_type) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(input.patient_id)
    .bind(input.doctor_id)
    .bind(input.appointment_date)
    .bind(input.duration_minutes)
    .bind(&input.reason)
    .bind(input.status.as_str())
    .bind(input.covered_by_insurance)
    .bind(input.visit_type.as_str())
    .execute(pool)
    .await?;

    get_appointment(pool, id).await
}

pub async fn get_appointment(pool: &SqlitePool, id: Uuid) -> Result<Appointment, DbError> {
    sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("agendamento"))
}

pub async fn update_appointment(
    pool: &SqlitePool,
    id: Uuid,
    input: &AppointmentInput,
) -> Result<Appointment, DbError> {
    let result = sqlx::query(
        "UPDATE appointments SET patient_id = ?, doctor_id = ?, appointment_date = ?, \
         duration_minutes = ?, reason = ?, status = ?, covered_by_insurance = ?, visit_type = ? \
         WHERE id = ?",
    )
    .bind(input.patient_id)
    .bind(input.doctor_id)
    .bind(input.appointment_date)
    .bind(input.duration_minutes)
    .bind(&input.reason)
    .bind(input.status.as_str())
    .bind(input.covered_by_insurance)
    .bind(input.visit_type.as_str())
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("agendamento"));
    }
    get_appointment(pool, id).await
}

/// Lista agendamentos visíveis no escopo, do mais recente ao mais antigo
pub async fn list_appointments(
    pool: &SqlitePool,
    scope: RecordScope,
) -> Result<Vec<Appointment>, DbError> {
    let query = match scope {
        RecordScope::All => {
            sqlx::query_as::<_, Appointment>("SELECT * FROM appointments ORDER BY appointment_date DESC")
        }
        RecordScope::Patient(id) => sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE patient_id = ? ORDER BY appointment_date DESC",
        )
        .bind(id),
        RecordScope::Doctor(id) => sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE doctor_id = ? ORDER BY appointment_date DESC",
        )
        .bind(id),
    };
    Ok(query.fetch_all(pool).await?)
}

pub async fn count_for_patient(pool: &SqlitePool, patient_id: Uuid) -> Result<i64, DbError> {
    Ok(
        sqlx::query_scalar("SELECT COUNT(*) FROM appointments WHERE patient_id = ?")
            .bind(patient_id)
            .fetch_one(pool)
            .await?,
    )
}

/// Remove o agendamento; laudos vinculados perdem a referência
pub async fn delete_appointment(pool: &SqlitePool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM appointments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("agendamento"));
    }
    Ok(())
}
