//! Painel inicial do usuário autenticado

use axum::extract::State;
use axum::response::Redirect;
use axum::Json;
use clinic_db::accounts::{self, DoctorListing};
use clinic_db::models::{Account, RoleProfile, UserType};
use serde::Serialize;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user_type: UserType,
    pub account: Account,
    pub doctors: Vec<DoctorListing>,
}

/// `GET /main`
pub async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<DashboardResponse>, ApiError> {
    let doctors = accounts::list_doctors(&state.pool).await?;
    Ok(Json(DashboardResponse {
        user_type: current.account.user.user_type,
        account: current.account,
        doctors,
    }))
}

/// Página de perfil de cada papel
pub fn profile_path(account: &Account) -> String {
    match &account.profile {
        RoleProfile::Patient(p) => format!("/accounts/profile/patient/{}", p.user_id),
        RoleProfile::Doctor(d) => format!("/accounts/profile/doctor/{}", d.user_id),
        RoleProfile::Admin(_) => "/accounts/profile/admin".to_string(),
    }
}

/// `GET /main/profile`
pub async fn profile_redirect(current: CurrentUser) -> Redirect {
    Redirect::to(&profile_path(&current.account))
}
