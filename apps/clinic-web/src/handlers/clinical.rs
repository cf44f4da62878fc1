//! Registros clínicos: agendamentos, receitas, laudos e cobranças
//!
//! Visibilidade: pacientes veem os próprios registros, médicos os registros em
//! que são o médico, administradores e superusuários veem tudo. Médicos só
//! gravam registros em seu próprio nome; cobranças são exclusivas da
//! administração.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use clinic_db::models::{
    Appointment, Billing, PrescriptionGlasses, RecordScope, Report, RoleProfile,
};
use clinic_db::{accounts, appointments, billing, prescriptions, reports, DbError};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::{ApiError, FieldErrors};
use crate::extract::ApiJson;
use crate::forms::clinical::{AppointmentForm, BillingForm, PrescriptionForm, ReportForm};
use crate::state::AppState;

const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

fn ensure_can_view(current: &CurrentUser, patient_id: Uuid, doctor_id: Uuid) -> Result<(), ApiError> {
    match current.record_scope() {
        RecordScope::All => Ok(()),
        RecordScope::Patient(id) if id == patient_id => Ok(()),
        RecordScope::Doctor(id) if id == doctor_id => Ok(()),
        _ => Err(ApiError::forbidden()),
    }
}

/// Pacientes nunca gravam registros clínicos
fn ensure_clinician(current: &CurrentUser) -> Result<(), ApiError> {
    if current.is_staff() || matches!(current.account.profile, RoleProfile::Doctor(_)) {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}

/// Médicos só gravam registros em que são o médico
fn ensure_can_write(current: &CurrentUser, doctor_id: Uuid) -> Result<(), ApiError> {
    if current.is_staff() {
        return Ok(());
    }
    match &current.account.profile {
        RoleProfile::Doctor(d) if d.user_id == doctor_id => Ok(()),
        _ => Err(ApiError::forbidden()),
    }
}

/// `true` quando a busca terminou em `NotFound`
fn is_missing<T>(result: Result<T, DbError>) -> Result<bool, ApiError> {
    match result {
        Ok(_) => Ok(false),
        Err(DbError::NotFound(_)) => Ok(true),
        Err(e) => Err(e.into()),
    }
}

/// Confere que paciente e médico referenciados existem
async fn check_people(
    pool: &SqlitePool,
    patient_id: Uuid,
    doctor_id: Uuid,
    errors: &mut FieldErrors,
) -> Result<(), ApiError> {
    if is_missing(accounts::get_patient(pool, patient_id).await)? {
        errors.add("patient_id", INVALID_CHOICE);
    }
    if is_missing(accounts::get_doctor(pool, doctor_id).await)? {
        errors.add("doctor_id", INVALID_CHOICE);
    }
    Ok(())
}

// Agendamentos

#[derive(Debug, Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<Appointment>,
}

async fn validate_appointment(state: &AppState, form: &AppointmentForm) -> Result<(), ApiError> {
    let mut errors = FieldErrors::of(form);
    check_people(&state.pool, form.patient_id, form.doctor_id, &mut errors).await?;
    errors.into_result()
}

/// `GET /clinic/appointments`
pub async fn list_appointments(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let appointments = appointments::list_appointments(&state.pool, current.record_scope()).await?;
    Ok(Json(AppointmentsResponse { appointments }))
}

/// `POST /clinic/appointments`
pub async fn create_appointment(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(form): ApiJson<AppointmentForm>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    ensure_clinician(&current)?;
    validate_appointment(&state, &form).await?;
    ensure_can_write(&current, form.doctor_id)?;

    let appointment = appointments::create_appointment(&state.pool, &form.to_input()).await?;
    tracing::info!(appointment_id = %appointment.id, by = %current.id(), "Agendamento criado");
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// `GET /clinic/appointments/:id`
pub async fn get_appointment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    let appointment = appointments::get_appointment(&state.pool, id).await?;
    ensure_can_view(&current, appointment.patient_id, appointment.doctor_id)?;
    Ok(Json(appointment))
}

/// `PUT /clinic/appointments/:id`
pub async fn update_appointment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    ApiJson(form): ApiJson<AppointmentForm>,
) -> Result<Json<Appointment>, ApiError> {
    ensure_clinician(&current)?;
    let existing = appointments::get_appointment(&state.pool, id).await?;
    ensure_can_write(&current, existing.doctor_id)?;
    validate_appointment(&state, &form).await?;
    ensure_can_write(&current, form.doctor_id)?;

    let appointment = appointments::update_appointment(&state.pool, id, &form.to_input()).await?;
    tracing::info!(appointment_id = %id, status = %appointment.status, "Agendamento atualizado");
    Ok(Json(appointment))
}

/// `DELETE /clinic/appointments/:id`: laudos vinculados perdem o vínculo
pub async fn delete_appointment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    current.require_staff()?;
    appointments::delete_appointment(&state.pool, id).await?;
    tracing::info!(appointment_id = %id, by = %current.id(), "Agendamento removido");
    Ok(StatusCode::NO_CONTENT)
}

// Receitas

#[derive(Debug, Serialize)]
pub struct PrescriptionsResponse {
    pub prescriptions: Vec<PrescriptionGlasses>,
}

async fn validate_prescription(state: &AppState, form: &PrescriptionForm) -> Result<(), ApiError> {
    let mut errors = form.errors();
    check_people(&state.pool, form.patient_id, form.doctor_id, &mut errors).await?;
    errors.into_result()
}

/// `GET /clinic/prescriptions`
pub async fn list_prescriptions(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<PrescriptionsResponse>, ApiError> {
    let prescriptions =
        prescriptions::list_prescriptions(&state.pool, current.record_scope()).await?;
    Ok(Json(PrescriptionsResponse { prescriptions }))
}

/// `POST /clinic/prescriptions`
pub async fn create_prescription(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(form): ApiJson<PrescriptionForm>,
) -> Result<(StatusCode, Json<PrescriptionGlasses>), ApiError> {
    ensure_clinician(&current)?;
    validate_prescription(&state, &form).await?;
    ensure_can_write(&current, form.doctor_id)?;

    let prescription = prescriptions::create_prescription(&state.pool, &form.to_input()).await?;
    tracing::info!(prescription_id = %prescription.id, "Receita criada");
    Ok((StatusCode::CREATED, Json(prescription)))
}

/// `GET /clinic/prescriptions/:id`
pub async fn get_prescription(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PrescriptionGlasses>, ApiError> {
    let prescription = prescriptions::get_prescription(&state.pool, id).await?;
    ensure_can_view(&current, prescription.patient_id, prescription.doctor_id)?;
    Ok(Json(prescription))
}

/// `PUT /clinic/prescriptions/:id`
pub async fn update_prescription(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    ApiJson(form): ApiJson<PrescriptionForm>,
) -> Result<Json<PrescriptionGlasses>, ApiError> {
    ensure_clinician(&current)?;
    let existing = prescriptions::get_prescription(&state.pool, id).await?;
    ensure_can_write(&current, existing.doctor_id)?;
    validate_prescription(&state, &form).await?;
    ensure_can_write(&current, form.doctor_id)?;

    let prescription =
        prescriptions::update_prescription(&state.pool, id, &form.to_input()).await?;
    tracing::info!(prescription_id = %id, "Receita atualizada");
    Ok(Json(prescription))
}

// Laudos

#[derive(Debug, Serialize)]
pub struct ReportsResponse {
    pub reports: Vec<Report>,
}

async fn validate_report(state: &AppState, form: &ReportForm) -> Result<(), ApiError> {
    let mut errors = FieldErrors::of(form);
    check_people(&state.pool, form.patient_id, form.doctor_id, &mut errors).await?;
    if let Some(appointment_id) = form.appointment_id {
        match appointments::get_appointment(&state.pool, appointment_id).await {
            Ok(appointment) if appointment.patient_id != form.patient_id => {
                errors.add(
                    "appointment_id",
                    "The appointment belongs to a different patient.",
                );
            }
            Ok(_) => {}
            Err(DbError::NotFound(_)) => errors.add("appointment_id", INVALID_CHOICE),
            Err(e) => return Err(e.into()),
        }
    }
    errors.into_result()
}

/// `GET /clinic/reports`
pub async fn list_reports(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<ReportsResponse>, ApiError> {
    let reports = reports::list_reports(&state.pool, current.record_scope()).await?;
    Ok(Json(ReportsResponse { reports }))
}

/// `POST /clinic/reports`
pub async fn create_report(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(form): ApiJson<ReportForm>,
) -> Result<(StatusCode, Json<Report>), ApiError> {
    ensure_clinician(&current)?;
    validate_report(&state, &form).await?;
    ensure_can_write(&current, form.doctor_id)?;

    let report = reports::create_report(&state.pool, &form.to_input()).await?;
    tracing::info!(report_id = %report.id, "Laudo criado");
    Ok((StatusCode::CREATED, Json(report)))
}

/// `GET /clinic/reports/:id`
pub async fn get_report(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Report>, ApiError> {
    let report = reports::get_report(&state.pool, id).await?;
    ensure_can_view(&current, report.patient_id, report.doctor_id)?;
    Ok(Json(report))
}

/// `PUT /clinic/reports/:id`
pub async fn update_report(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    ApiJson(form): ApiJson<ReportForm>,
) -> Result<Json<Report>, ApiError> {
    ensure_clinician(&current)?;
    let existing = reports::get_report(&state.pool, id).await?;
    ensure_can_write(&current, existing.doctor_id)?;
    validate_report(&state, &form).await?;
    ensure_can_write(&current, form.doctor_id)?;

    let report = reports::update_report(&state.pool, id, &form.to_input()).await?;
    tracing::info!(report_id = %id, "Laudo atualizado");
    Ok(Json(report))
}

/// `DELETE /clinic/reports/:id`: as cobranças do laudo caem junto
pub async fn delete_report(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    current.require_staff()?;
    reports::delete_report(&state.pool, id).await?;
    tracing::info!(report_id = %id, by = %current.id(), "Laudo removido");
    Ok(StatusCode::NO_CONTENT)
}

// Cobranças

#[derive(Debug, Serialize)]
pub struct BillingsResponse {
    pub billings: Vec<Billing>,
}

async fn validate_billing(state: &AppState, form: &BillingForm) -> Result<(), ApiError> {
    let mut errors = FieldErrors::of(form);
    if is_missing(reports::get_report(&state.pool, form.report_id).await)? {
        errors.add("report_id", INVALID_CHOICE);
    }
    errors.into_result()
}

/// `GET /clinic/billings`
pub async fn list_billings(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<BillingsResponse>, ApiError> {
    let billings = billing::list_billings(&state.pool, current.record_scope()).await?;
    Ok(Json(BillingsResponse { billings }))
}

/// `POST /clinic/billings`
pub async fn create_billing(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(form): ApiJson<BillingForm>,
) -> Result<(StatusCode, Json<Billing>), ApiError> {
    current.require_staff()?;
    validate_billing(&state, &form).await?;

    let billing = billing::create_billing(&state.pool, &form.to_input()).await?;
    tracing::info!(billing_id = %billing.id, amount = %billing.amount, "Cobrança criada");
    Ok((StatusCode::CREATED, Json(billing)))
}

/// `GET /clinic/billings/:id`: visível a quem vê o laudo
pub async fn get_billing(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Billing>, ApiError> {
    let billing = billing::get_billing(&state.pool, id).await?;
    let report = reports::get_report(&state.pool, billing.report_id).await?;
    ensure_can_view(&current, report.patient_id, report.doctor_id)?;
    Ok(Json(billing))
}

/// `PUT /clinic/billings/:id`
pub async fn update_billing(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    ApiJson(form): ApiJson<BillingForm>,
) -> Result<Json<Billing>, ApiError> {
    current.require_staff()?;
    billing::get_billing(&state.pool, id).await?;
    validate_billing(&state, &form).await?;

    let billing = billing::update_billing(&state.pool, id, &form.to_input()).await?;
    tracing::info!(billing_id = %id, status = %billing.payment_status, "Cobrança atualizada");
    Ok(Json(billing))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use clinic_db::models::Account;
    use clinic_db::test_utils::{create_admin, create_doctor, create_patient};
    use serde_json::{json, Value};

    use crate::test_support::TestApp;

    struct Clinic {
        app: TestApp,
        patient: Account,
        other_patient: Account,
        doctor: Account,
        other_doctor: Account,
        admin: Account,
    }

    async fn clinic() -> anyhow::Result<Clinic> {
        let app = TestApp::new().await?;
        let pool = app.state.pool.clone();
        Ok(Clinic {
            patient: create_patient(&pool, "joana").await?,
            other_patient: create_patient(&pool, "pedro").await?,
            doctor: create_doctor(&pool, "dr_house").await?,
            other_doctor: create_doctor(&pool, "dr_wilson").await?,
            admin: create_admin(&pool, "chefe").await?,
            app,
        })
    }

    fn appointment(patient: &Account, doctor: &Account) -> Value {
        json!({
            "patient_id": patient.user.id,
            "doctor_id": doctor.user.id,
            "appointment_date": "2030-01-10T14:00:00Z",
            "duration_minutes": 30,
            "reason": "Revisão anual"
        })
    }

    fn report(patient: &Account, doctor: &Account) -> Value {
        json!({
            "patient_id": patient.user.id,
            "doctor_id": doctor.user.id,
            "diagnosis_summary": "Miopia leve",
            "recommendations": "Usar óculos para longe"
        })
    }

    fn id_of(body: &Value) -> String {
        body["id"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_doctor_writes_only_own_records() -> anyhow::Result<()> {
        let c = clinic().await?;
        let token = c.app.token_for(&c.doctor).await?;

        let (status, body) = c
            .app
            .post_json("/clinic/appointments", Some(&token), appointment(&c.patient, &c.doctor))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["status"], "scheduled");
        assert_eq!(body["visit_type"], "routine");

        let (status, _) = c
            .app
            .post_json(
                "/clinic/appointments",
                Some(&token),
                appointment(&c.patient, &c.other_doctor),
            )
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let patient_token = c.app.token_for(&c.patient).await?;
        let (status, _) = c
            .app
            .post_json(
                "/clinic/appointments",
                Some(&patient_token),
                appointment(&c.patient, &c.doctor),
            )
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn test_references_must_exist() -> anyhow::Result<()> {
        let c = clinic().await?;
        let token = c.app.token_for(&c.admin).await?;

        // Um médico no lugar do paciente não é um paciente válido
        let (status, body) = c
            .app
            .post_json("/clinic/appointments", Some(&token), appointment(&c.doctor, &c.doctor))
            .await?;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["fields"]["patient_id"].is_array());

        let (status, body) = c
            .app
            .post_json(
                "/clinic/billings",
                Some(&token),
                json!({"report_id": uuid::Uuid::new_v4(), "amount": "10.00", "payment_method": "cash"}),
            )
            .await?;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["fields"]["report_id"].is_array());

        let (status, _) = c
            .app
            .get(&format!("/clinic/reports/{}", uuid::Uuid::new_v4()), Some(&token))
            .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn test_visibility_follows_role() -> anyhow::Result<()> {
        let c = clinic().await?;
        let admin_token = c.app.token_for(&c.admin).await?;
        for (patient, doctor) in [
            (&c.patient, &c.doctor),
            (&c.other_patient, &c.doctor),
            (&c.patient, &c.other_doctor),
        ] {
            let (status, _) = c
                .app
                .post_json("/clinic/reports", Some(&admin_token), report(patient, doctor))
                .await?;
            assert_eq!(status, StatusCode::CREATED);
        }

        let count = |body: &Value| body["reports"].as_array().map(Vec::len).unwrap_or_default();

        let (_, body) = c.app.get("/clinic/reports", Some(&admin_token)).await?;
        assert_eq!(count(&body), 3);

        let patient_token = c.app.token_for(&c.patient).await?;
        let (_, body) = c.app.get("/clinic/reports", Some(&patient_token)).await?;
        assert_eq!(count(&body), 2);

        let doctor_token = c.app.token_for(&c.other_doctor).await?;
        let (_, body) = c.app.get("/clinic/reports", Some(&doctor_token)).await?;
        assert_eq!(count(&body), 1);

        let other_patient_token = c.app.token_for(&c.other_patient).await?;
        let (_, body) = c.app.get("/clinic/reports", Some(&patient_token)).await?;
        let joana_report = body["reports"][0]["id"].as_str().unwrap_or_default().to_string();
        let (status, _) = c
            .app
            .get(&format!("/clinic/reports/{joana_report}"), Some(&other_patient_token))
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn test_prescription_validation() -> anyhow::Result<()> {
        let c = clinic().await?;
        let token = c.app.token_for(&c.doctor).await?;
        let mut body = json!({
            "patient_id": c.patient.user.id,
            "doctor_id": c.doctor.user.id,
            "lens_type": "read",
            "left_sphere": 1.5,
            "left_cylinder": -0.25,
            "left_axis": 90,
            "right_sphere": 1.25,
            "right_cylinder": 0.0,
            "right_axis": 180,
            "prescription_date": "2024-03-01",
            "expiration_date": "2023-03-01"
        });

        let (status, response) = c
            .app
            .post_json("/clinic/prescriptions", Some(&token), body.clone())
            .await?;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response["error"]["fields"]["expiration_date"].is_array());

        body["expiration_date"] = json!("2025-03-01");
        let (status, response) = c
            .app
            .post_json("/clinic/prescriptions", Some(&token), body)
            .await?;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response["left"]["axis"], 90);
        Ok(())
    }

    #[tokio::test]
    async fn test_deletions_cascade_and_unlink() -> anyhow::Result<()> {
        let c = clinic().await?;
        let admin_token = c.app.token_for(&c.admin).await?;

        let (_, appointment_body) = c
            .app
            .post_json(
                "/clinic/appointments",
                Some(&admin_token),
                appointment(&c.patient, &c.doctor),
            )
            .await?;
        let appointment_id = id_of(&appointment_body);

        let mut linked = report(&c.patient, &c.doctor);
        linked["appointment_id"] = json!(appointment_id);
        let (status, report_body) = c
            .app
            .post_json("/clinic/reports", Some(&admin_token), linked)
            .await?;
        assert_eq!(status, StatusCode::CREATED);
        let report_id = id_of(&report_body);

        let (status, _) = c
            .app
            .post_json(
                "/clinic/billings",
                Some(&admin_token),
                json!({"report_id": report_id, "amount": "200.00", "payment_method": "insurance"}),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);

        // Médicos não removem registros
        let doctor_token = c.app.token_for(&c.doctor).await?;
        let (status, _) = c
            .app
            .delete(&format!("/clinic/appointments/{appointment_id}"), Some(&doctor_token))
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = c
            .app
            .delete(&format!("/clinic/appointments/{appointment_id}"), Some(&admin_token))
            .await?;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, report_body) = c
            .app
            .get(&format!("/clinic/reports/{report_id}"), Some(&admin_token))
            .await?;
        assert!(report_body["appointment_id"].is_null());

        let (status, _) = c
            .app
            .delete(&format!("/clinic/reports/{report_id}"), Some(&admin_token))
            .await?;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(c.app.count("billings").await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_billing_is_admin_only() -> anyhow::Result<()> {
        let c = clinic().await?;
        let admin_token = c.app.token_for(&c.admin).await?;
        let (_, report_body) = c
            .app
            .post_json("/clinic/reports", Some(&admin_token), report(&c.patient, &c.doctor))
            .await?;
        let billing = json!({"report_id": id_of(&report_body), "amount": 80, "payment_method": "cash"});

        let doctor_token = c.app.token_for(&c.doctor).await?;
        let (status, _) = c
            .app
            .post_json("/clinic/billings", Some(&doctor_token), billing.clone())
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = c
            .app
            .post_json("/clinic/billings", Some(&admin_token), billing)
            .await?;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["amount"], "80.00");
        assert_eq!(body["payment_status"], "pending");

        // O paciente do laudo vê a cobrança
        let patient_token = c.app.token_for(&c.patient).await?;
        let (status, _) = c
            .app
            .get(&format!("/clinic/billings/{}", id_of(&body)), Some(&patient_token))
            .await?;
        assert_eq!(status, StatusCode::OK);
        Ok(())
    }
}
