//! Perfis de paciente, médico e administrador
//!
//! Perfis de paciente e médico só são acessíveis ao próprio usuário ou a um
//! superusuário. Edições validam identidade e perfil juntos e gravam os dois
//! numa transação, ou nada.

use axum::extract::{Multipart, Path, State};
use axum::Json;
use chrono::Utc;
use clinic_db::accounts;
use clinic_db::models::{Admin, Doctor, Patient, RoleProfile, User, UserType};
use clinic_db::{appointments, prescriptions};
use serde::Serialize;
use uuid::Uuid;

use super::accounts::upload_photo;
use crate::auth::CurrentUser;
use crate::error::{ApiError, FieldErrors};
use crate::extract::{read_multipart, ApiJson};
use crate::forms::accounts::{AdminForm, DoctorProfileForm, PatientProfileForm};
use crate::forms::REQUIRED;
use crate::services::PhotoMetadata;
use crate::state::AppState;

/// Primeiro horário de atendimento e quantidade de horários de uma hora
const FIRST_SLOT_HOUR: u32 = 8;
const SLOTS_PER_DAY: u32 = 8;

fn ensure_owner_or_superuser(current: &CurrentUser, user_id: Uuid) -> Result<(), ApiError> {
    if current.id() == user_id || current.is_superuser() {
        Ok(())
    } else {
        tracing::warn!(caller = %current.id(), target = %user_id, "Acesso negado a perfil alheio");
        Err(ApiError::forbidden())
    }
}

#[derive(Debug, Serialize)]
pub struct PatientProfileResponse {
    pub user: User,
    pub patient: Patient,
    pub age: i32,
    pub appointment_count: i64,
    pub prescription_count: i64,
}

async fn patient_profile_response(
    state: &AppState,
    user_id: Uuid,
) -> Result<PatientProfileResponse, ApiError> {
    let patient = accounts::get_patient(&state.pool, user_id).await?;
    let user = accounts::get_user(&state.pool, user_id).await?;
    Ok(PatientProfileResponse {
        age: patient.age_on(Utc::now().date_naive()),
        appointment_count: appointments::count_for_patient(&state.pool, user_id).await?,
        prescription_count: prescriptions::count_for_patient(&state.pool, user_id).await?,
        user,
        patient,
    })
}

/// `GET /accounts/profile/patient/:id`
pub async fn patient_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PatientProfileResponse>, ApiError> {
    ensure_owner_or_superuser(&current, user_id)?;
    Ok(Json(patient_profile_response(&state, user_id).await?))
}

/// `PUT /accounts/profile/patient/:id`
pub async fn update_patient_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<Uuid>,
    ApiJson(form): ApiJson<PatientProfileForm>,
) -> Result<Json<PatientProfileResponse>, ApiError> {
    ensure_owner_or_superuser(&current, user_id)?;
    accounts::get_patient(&state.pool, user_id).await?;
    form.errors().into_result()?;

    accounts::update_patient_profile(
        &state.pool,
        user_id,
        &form.user.to_update(),
        &form.patient.to_update(),
    )
    .await?;

    tracing::info!(user_id = %user_id, "Perfil de paciente atualizado");
    Ok(Json(patient_profile_response(&state, user_id).await?))
}

/// Horário de atendimento de uma hora
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub slot: u32,
    pub start_time: String,
    pub end_time: String,
}

pub fn daily_slots() -> Vec<Slot> {
    (0..SLOTS_PER_DAY)
        .map(|i| Slot {
            slot: i + 1,
            start_time: format!("{:02}:00", FIRST_SLOT_HOUR + i),
            end_time: format!("{:02}:00", FIRST_SLOT_HOUR + i + 1),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct DoctorProfileResponse {
    pub user: User,
    pub doctor: Doctor,
    pub slots: Vec<Slot>,
    pub editable: bool,
}

async fn doctor_profile_response(
    state: &AppState,
    current: &CurrentUser,
    user_id: Uuid,
) -> Result<DoctorProfileResponse, ApiError> {
    let doctor = accounts::get_doctor(&state.pool, user_id).await?;
    let user = accounts::get_user(&state.pool, user_id).await?;
    Ok(DoctorProfileResponse {
        user,
        doctor,
        slots: daily_slots(),
        editable: current.id() == user_id || current.is_superuser(),
    })
}

/// `GET /accounts/profile/doctor/:id`
pub async fn doctor_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<DoctorProfileResponse>, ApiError> {
    ensure_owner_or_superuser(&current, user_id)?;
    Ok(Json(doctor_profile_response(&state, &current, user_id).await?))
}

/// `PUT /accounts/profile/doctor/:id`. A avaliação não é editável.
pub async fn update_doctor_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<Uuid>,
    ApiJson(form): ApiJson<DoctorProfileForm>,
) -> Result<Json<DoctorProfileResponse>, ApiError> {
    ensure_owner_or_superuser(&current, user_id)?;
    accounts::get_doctor(&state.pool, user_id).await?;
    form.errors().into_result()?;

    accounts::update_doctor_profile(
        &state.pool,
        user_id,
        &form.user.to_update(),
        &form.doctor.to_update(),
    )
    .await?;

    tracing::info!(user_id = %user_id, "Perfil de médico atualizado");
    Ok(Json(doctor_profile_response(&state, &current, user_id).await?))
}

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub photo_url: String,
}

/// Troca a foto de um perfil. Em caso de falha o perfil fica como estava.
async fn replace_photo(
    state: &AppState,
    current: &CurrentUser,
    user_id: Uuid,
    role: UserType,
    multipart: Multipart,
) -> Result<PhotoResponse, ApiError> {
    ensure_owner_or_superuser(current, user_id)?;
    match role {
        UserType::Patient => {
            accounts::get_patient(&state.pool, user_id).await?;
        }
        UserType::Doctor => {
            accounts::get_doctor(&state.pool, user_id).await?;
        }
        UserType::Admin => return Err(ApiError::NotFound("profile not found".to_string())),
    }

    let form = read_multipart(multipart).await?;
    form.errors.into_result()?;
    let photo = form
        .photo
        .ok_or_else(|| ApiError::Validation(FieldErrors::single("photo", REQUIRED)))?;

    let metadata = PhotoMetadata {
        folder: format!("clinic/{role}s/"),
        public_id: format!("{role}_{user_id}_{}", Utc::now().format("%Y%m%d%H%M%S")),
        filename: photo.filename.clone(),
        content_type: photo.content_type.clone(),
    };
    let photo_url = upload_photo(state, photo, metadata).await?;

    match role {
        UserType::Patient => accounts::set_patient_photo(&state.pool, user_id, &photo_url).await?,
        UserType::Doctor => accounts::set_doctor_photo(&state.pool, user_id, &photo_url).await?,
        UserType::Admin => {}
    }

    tracing::info!(user_id = %user_id, "Foto de perfil atualizada");
    Ok(PhotoResponse { photo_url })
}

/// `POST /accounts/profile/patient/:id/photo`
pub async fn upload_patient_photo(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<PhotoResponse>, ApiError> {
    Ok(Json(
        replace_photo(&state, &current, user_id, UserType::Patient, multipart).await?,
    ))
}

/// `POST /accounts/profile/doctor/:id/photo`
pub async fn upload_doctor_photo(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<PhotoResponse>, ApiError> {
    Ok(Json(
        replace_photo(&state, &current, user_id, UserType::Doctor, multipart).await?,
    ))
}

#[derive(Debug, Serialize)]
pub struct AdminProfileResponse {
    pub user: User,
    pub admin: Admin,
}

fn own_admin(current: &CurrentUser) -> Result<&Admin, ApiError> {
    match &current.account.profile {
        RoleProfile::Admin(admin) => Ok(admin),
        RoleProfile::Patient(_) | RoleProfile::Doctor(_) => {
            Err(ApiError::NotFound("admin profile not found".to_string()))
        }
    }
}

/// `GET /accounts/profile/admin`
pub async fn admin_profile(current: CurrentUser) -> Result<Json<AdminProfileResponse>, ApiError> {
    let admin = own_admin(&current)?.clone();
    Ok(Json(AdminProfileResponse {
        user: current.account.user,
        admin,
    }))
}

/// `PUT /accounts/profile/admin`
pub async fn update_admin_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(form): ApiJson<AdminForm>,
) -> Result<Json<AdminProfileResponse>, ApiError> {
    let user_id = own_admin(&current)?.user_id;
    let admin = accounts::update_admin_role(&state.pool, user_id, form.role).await?;
    tracing::info!(user_id = %user_id, role = %admin.role, "Perfil de administrador atualizado");
    Ok(Json(AdminProfileResponse {
        user: current.account.user,
        admin,
    }))
}
