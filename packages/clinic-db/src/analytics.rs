//! Consultas agregadas para relatórios administrativos

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{decode_text, AppointmentStatus, Money, PaymentStatus};

/// Médico com a contagem de registros associados
#[derive(Debug, Clone, Serialize)]
pub struct DoctorCount {
    pub doctor_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub specialization: String,
    pub count: i64,
}

impl FromRow<'_, SqliteRow> for DoctorCount {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            doctor_id: row.try_get("doctor_id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            specialization: row.try_get("specialization")?,
            count: row.try_get("count")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientSummary {
    pub patient_id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl FromRow<'_, SqliteRow> for PatientSummary {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            patient_id: row.try_get("patient_id")?,
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
        })
    }
}

/// Quantidade de agendamentos por status; só aparecem status existentes
pub async fn appointment_status_summary(
    pool: &SqlitePool,
) -> Result<BTreeMap<AppointmentStatus, i64>, DbError> {
    let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM appointments GROUP BY status")
        .fetch_all(pool)
        .await?;

    let mut summary = BTreeMap::new();
    for row in rows {
        let status: AppointmentStatus = decode_text(&row, "status")?;
        summary.insert(status, row.try_get("count")?);
    }
    Ok(summary)
}

pub async fn top_doctors_by_appointments(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<DoctorCount>, DbError> {
    Ok(sqlx::query_as::<_, DoctorCount>(
        "SELECT d.user_id AS doctor_id, u.first_name, u.last_name, d.specialization, \
         COUNT(a.id) AS count \
         FROM doctors d \
         JOIN users u ON u.id = d.user_id \
         JOIN appointments a ON a.doctor_id = d.user_id \
         GROUP BY d.user_id \
         ORDER BY count DESC, u.last_name, u.first_name \
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// Soma dos valores das cobranças pagas
pub async fn total_paid_revenue(pool: &SqlitePool) -> Result<Money, DbError> {
    let cents: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM billings WHERE payment_status = ?",
    )
    .bind(PaymentStatus::Paid.as_str())
    .fetch_one(pool)
    .await?;
    Ok(Money::from_cents(cents))
}

pub async fn reports_per_doctor(pool: &SqlitePool) -> Result<Vec<DoctorCount>, DbError> {
    Ok(sqlx::query_as::<_, DoctorCount>(
        "SELECT d.user_id AS doctor_id, u.first_name, u.last_name, d.specialization, \
         COUNT(r.id) AS count \
         FROM doctors d \
         JOIN users u ON u.id = d.user_id \
         JOIN reports r ON r.doctor_id = d.user_id \
         GROUP BY d.user_id \
         ORDER BY count DESC, u.last_name, u.first_name",
    )
    .fetch_all(pool)
    .await?)
}

/// Pacientes sem nenhum agendamento posterior a `now`
pub async fn patients_without_upcoming_appointments(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<Vec<PatientSummary>, DbError> {
    Ok(sqlx::query_as::<_, PatientSummary>(
        "SELECT p.user_id AS patient_id, u.username, u.first_name, u.last_name, u.email \
         FROM patients p \
         JOIN users u ON u.id = p.user_id \
         WHERE NOT EXISTS ( \
             SELECT 1 FROM appointments a \
             WHERE a.patient_id = p.user_id AND a.appointment_date > ? \
         ) \
         ORDER BY u.last_name, u.first_name",
    )
    .bind(now)
    .fetch_all(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        appointment_input, billing_input, create_doctor, create_patient, report_input, test_pool,
    };
    use crate::{appointments, billing, reports};
    use anyhow::Result;
    use chrono::Duration;

    #[tokio::test]
    async fn test_status_summary_and_top_doctors() -> Result<()> {
        let pool = test_pool().await?;
        let joana = create_patient(&pool, "joana").await?;
        let house = create_doctor(&pool, "dr_house").await?;
        let wilson = create_doctor(&pool, "dr_wilson").await?;
        create_doctor(&pool, "dr_cuddy").await?;
        let now = Utc::now();

        appointments::create_appointment(&pool, &appointment_input(joana.user.id, house.user.id, now))
            .await?;
        let mut cancelled = appointment_input(joana.user.id, house.user.id, now);
        cancelled.status = AppointmentStatus::Cancelled;
        appointments::create_appointment(&pool, &cancelled).await?;
        appointments::create_appointment(&pool, &appointment_input(joana.user.id, wilson.user.id, now))
            .await?;

        let summary = appointment_status_summary(&pool).await?;
        assert_eq!(summary.get(&AppointmentStatus::Scheduled), Some(&2));
        assert_eq!(summary.get(&AppointmentStatus::Cancelled), Some(&1));
        assert!(!summary.contains_key(&AppointmentStatus::NoShow));

        let top = top_doctors_by_appointments(&pool, 5).await?;
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].doctor_id, house.user.id);
        assert_eq!(top[0].count, 2);

        let limited = top_doctors_by_appointments(&pool, 1).await?;
        assert_eq!(limited.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_revenue_sums_only_paid() -> Result<()> {
        let pool = test_pool().await?;
        assert_eq!(total_paid_revenue(&pool).await?, Money::ZERO);

        let joana = create_patient(&pool, "joana").await?;
        let doctor = create_doctor(&pool, "dr_house").await?;
        let report = reports::create_report(&pool, &report_input(joana.user.id, doctor.user.id))
            .await?;

        for (cents, status) in [
            (10000, PaymentStatus::Paid),
            (2550, PaymentStatus::Paid),
            (99999, PaymentStatus::Pending),
            (5000, PaymentStatus::Denied),
        ] {
            billing::create_billing(&pool, &billing_input(report.id, Money::from_cents(cents), status))
                .await?;
        }

        assert_eq!(total_paid_revenue(&pool).await?, Money::from_cents(12550));
        Ok(())
    }

    #[tokio::test]
    async fn test_reports_and_patients_without_upcoming() -> Result<()> {
        let pool = test_pool().await?;
        let joana = create_patient(&pool, "joana").await?;
        let pedro = create_patient(&pool, "pedro").await?;
        let house = create_doctor(&pool, "dr_house").await?;
        let now = Utc::now();

        reports::create_report(&pool, &report_input(joana.user.id, house.user.id)).await?;
        reports::create_report(&pool, &report_input(pedro.user.id, house.user.id)).await?;

        appointments::create_appointment(
            &pool,
            &appointment_input(joana.user.id, house.user.id, now + Duration::days(3)),
        )
        .await?;
        appointments::create_appointment(
            &pool,
            &appointment_input(pedro.user.id, house.user.id, now - Duration::days(3)),
        )
        .await?;

        let per_doctor = reports_per_doctor(&pool).await?;
        assert_eq!(per_doctor.len(), 1);
        assert_eq!(per_doctor[0].count, 2);

        let without = patients_without_upcoming_appointments(&pool, now).await?;
        assert_eq!(without.len(), 1);
        assert_eq!(without[0].patient_id, pedro.user.id);
        Ok(())
    }
}
