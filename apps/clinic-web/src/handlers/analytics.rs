//! Relatórios agregados, restritos a administradores e superusuários

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use clinic_db::analytics::{self, DoctorCount, PatientSummary};
use clinic_db::models::{AppointmentStatus, Money};
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::error::{ApiError, FieldErrors};
use crate::state::AppState;

const DEFAULT_TOP_DOCTORS: i64 = 5;

/// `GET /analytics/appointment-status`
pub async fn appointment_status(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<BTreeMap<AppointmentStatus, i64>>, ApiError> {
    current.require_staff()?;
    Ok(Json(analytics::appointment_status_summary(&state.pool).await?))
}

#[derive(Debug, Deserialize)]
pub struct TopDoctorsQuery {
    pub limit: Option<String>,
}

impl TopDoctorsQuery {
    fn limit(&self) -> Result<i64, ApiError> {
        let Some(raw) = self.limit.as_deref() else {
            return Ok(DEFAULT_TOP_DOCTORS);
        };
        match raw.trim().parse::<i64>() {
            Ok(limit) if limit >= 1 => Ok(limit),
            _ => Err(ApiError::Validation(FieldErrors::single(
                "limit",
                "Ensure this value is a whole number greater than or equal to 1.",
            ))),
        }
    }
}

/// `GET /analytics/top-doctors?limit=N`
pub async fn top_doctors(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<TopDoctorsQuery>,
) -> Result<Json<Vec<DoctorCount>>, ApiError> {
    current.require_staff()?;
    let limit = query.limit()?;
    Ok(Json(
        analytics::top_doctors_by_appointments(&state.pool, limit).await?,
    ))
}

#[derive(Debug, Serialize)]
pub struct RevenueResponse {
    pub total_paid_revenue: Money,
}

/// `GET /analytics/revenue`
pub async fn revenue(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<RevenueResponse>, ApiError> {
    current.require_staff()?;
    Ok(Json(RevenueResponse {
        total_paid_revenue: analytics::total_paid_revenue(&state.pool).await?,
    }))
}

/// `GET /analytics/reports-per-doctor`
pub async fn reports_per_doctor(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<DoctorCount>>, ApiError> {
    current.require_staff()?;
    Ok(Json(analytics::reports_per_doctor(&state.pool).await?))
}

/// `GET /analytics/patients-without-upcoming`
pub async fn patients_without_upcoming(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<PatientSummary>>, ApiError> {
    current.require_staff()?;
    Ok(Json(
        analytics::patients_without_upcoming_appointments(&state.pool, Utc::now()).await?,
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use clinic_db::appointments::create_appointment;
    use clinic_db::billing::create_billing;
    use clinic_db::models::{Money, PaymentStatus};
    use clinic_db::reports::create_report;
    use clinic_db::test_utils::{
        appointment_input, billing_input, create_admin, create_doctor, create_patient, report_input,
    };

    use crate::test_support::TestApp;

    #[tokio::test]
    async fn test_requires_staff() -> anyhow::Result<()> {
        let app = TestApp::new().await?;
        let doctor = create_doctor(&app.state.pool, "dr_house").await?;
        let token = app.token_for(&doctor).await?;
        for uri in [
            "/analytics/appointment-status",
            "/analytics/top-doctors",
            "/analytics/revenue",
            "/analytics/reports-per-doctor",
            "/analytics/patients-without-upcoming",
        ] {
            let (status, _) = app.get(uri, Some(&token)).await?;
            assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_revenue_sums_paid_billings() -> anyhow::Result<()> {
        let app = TestApp::new().await?;
        let pool = &app.state.pool;
        let admin = create_admin(pool, "chefe").await?;
        let token = app.token_for(&admin).await?;

        let (status, body) = app.get("/analytics/revenue", Some(&token)).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_paid_revenue"], "0.00");

        let patient = create_patient(pool, "joana").await?;
        let doctor = create_doctor(pool, "dr_house").await?;
        let report = create_report(pool, &report_input(patient.user.id, doctor.user.id)).await?;
        for (cents, status) in [
            (12050, PaymentStatus::Paid),
            (7950, PaymentStatus::Paid),
            (50000, PaymentStatus::Pending),
            (1000, PaymentStatus::Denied),
        ] {
            create_billing(pool, &billing_input(report.id, Money::from_cents(cents), status)).await?;
        }

        let (_, body) = app.get("/analytics/revenue", Some(&token)).await?;
        assert_eq!(body["total_paid_revenue"], "200.00");
        Ok(())
    }

    #[tokio::test]
    async fn test_top_doctors_limit() -> anyhow::Result<()> {
        let app = TestApp::new().await?;
        let pool = &app.state.pool;
        let admin = create_admin(pool, "chefe").await?;
        let patient = create_patient(pool, "joana").await?;
        let house = create_doctor(pool, "dr_house").await?;
        let wilson = create_doctor(pool, "dr_wilson").await?;
        let when = Utc::now() + Duration::days(3);
        for doctor in [&house, &house, &wilson] {
            create_appointment(pool, &appointment_input(patient.user.id, doctor.user.id, when))
                .await?;
        }
        let token = app.token_for(&admin).await?;

        let (_, body) = app.get("/analytics/top-doctors", Some(&token)).await?;
        assert_eq!(body.as_array().map(Vec::len), Some(2));
        assert_eq!(body[0]["doctor_id"], house.user.id.to_string());
        assert_eq!(body[0]["count"], 2);

        let (_, body) = app.get("/analytics/top-doctors?limit=1", Some(&token)).await?;
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let (status, _) = app.get("/analytics/top-doctors?limit=0", Some(&token)).await?;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = app.get("/analytics/appointment-status", Some(&token)).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scheduled"], 3);
        assert!(body.get("completed").is_none());

        let (_, body) = app
            .get("/analytics/patients-without-upcoming", Some(&token))
            .await?;
        assert_eq!(body.as_array().map(Vec::len), Some(0));
        Ok(())
    }
}
