//! Cadastro, login, logout, troca de senha e remoção de usuários

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::Json;
use chrono::Utc;
use clinic_db::accounts;
use clinic_db::models::{Account, UserType};
use clinic_db::sessions;
use serde::Serialize;
use uuid::Uuid;

use super::MessageResponse;
use crate::auth::password::{hash_password, verify_password, verify_unknown_user};
use crate::auth::CurrentUser;
use crate::error::{ApiError, FieldErrors};
use crate::extract::{read_multipart, ApiJson, UploadedPhoto};
use crate::forms::accounts::{new_password_errors, parse_registration, ChangePasswordForm, LoginForm};
use crate::services::PhotoMetadata;
use crate::state::AppState;

const INVALID_LOGIN: &str = "Invalid username or password";

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_type: UserType,
    pub redirect: &'static str,
}

/// `POST /`
pub async fn login(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<LoginForm>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = accounts::find_user_by_username(&state.pool, form.username.trim()).await?;
    let Some(user) = user else {
        verify_unknown_user(form.password).await?;
        tracing::warn!(username = %form.username, "Login com usuário inexistente");
        return Err(ApiError::Unauthorized(INVALID_LOGIN.to_string()));
    };

    let matches = verify_password(form.password, user.password_hash.clone()).await?;
    if !matches || !user.is_active {
        tracing::warn!(user_id = %user.id, active = user.is_active, "Login recusado");
        return Err(ApiError::Unauthorized(INVALID_LOGIN.to_string()));
    }

    let session = sessions::create_session(&state.pool, user.id, state.session_ttl).await?;
    accounts::record_login(&state.pool, user.id, session.created_at).await?;
    let token = state.jwt.issue(&session)?;

    tracing::info!(user_id = %user.id, user_type = %user.user_type, "Login efetuado");
    Ok(Json(LoginResponse {
        token,
        user_type: user.user_type,
        redirect: "/main",
    }))
}

/// `POST /main/logout`: encerra a sessão do token usado
pub async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Redirect, ApiError> {
    sessions::delete_session(&state.pool, current.session_id).await?;
    tracing::info!(user_id = %current.id(), "Logout");
    Ok(Redirect::to("/"))
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub account: Account,
    pub redirect: &'static str,
}

/// `POST /accounts/register` (multipart)
///
/// Validação completa, depois o envio da foto e só então a transação que
/// grava usuário e perfil.
pub async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let form = read_multipart(multipart).await?;
    let registration = match parse_registration(&form.fields) {
        Ok(registration) => {
            form.errors.into_result()?;
            registration
        }
        Err(mut errors) => {
            errors.merge(form.errors);
            return Err(ApiError::Validation(errors));
        }
    };
    let user_form = &registration.user;

    let taken =
        accounts::find_taken_identifiers(&state.pool, &user_form.username, user_form.email.trim())
            .await?;
    if taken.any() {
        let mut errors = FieldErrors::new();
        if taken.username {
            errors.add("username", "A user with that username already exists.");
        }
        if taken.email {
            errors.add("email", "A user with that email already exists.");
        }
        return Err(ApiError::Validation(errors));
    }

    let password_hash = hash_password(user_form.password1.clone()).await?;

    let photo_url = match form.photo {
        Some(photo) => {
            let metadata = PhotoMetadata {
                folder: format!("clinic/{}s/", registration.user_type),
                public_id: format!("{}_profile", user_form.username),
                filename: photo.filename.clone(),
                content_type: photo.content_type.clone(),
            };
            Some(upload_photo(&state, photo, metadata).await?)
        }
        None => None,
    };

    let new_user = user_form.to_new_user(password_hash);
    let profile = registration
        .profile
        .into_new_profile(photo_url.clone().unwrap_or_default());

    let account = match accounts::create_account(&state.pool, &new_user, &profile).await {
        Ok(account) => account,
        Err(e) => {
            if let Some(url) = &photo_url {
                tracing::warn!(%url, "Cadastro falhou após o envio da foto; imagem órfã");
            }
            return Err(e.into());
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            account,
            redirect: "/",
        }),
    ))
}

/// Envia a foto ao serviço externo; a falha chega ao usuário como 502
pub(crate) async fn upload_photo(
    state: &AppState,
    photo: UploadedPhoto,
    metadata: PhotoMetadata,
) -> Result<String, ApiError> {
    state
        .photo_store
        .store(photo.bytes, metadata)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Falha no envio da foto");
            ApiError::ExternalService(format!("Error uploading photo: {e}"))
        })
}

/// `POST /accounts/change-password`
pub async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(form): ApiJson<ChangePasswordForm>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = &current.account.user;
    let mut errors = new_password_errors(&form.new_password, &form.confirm_password, &user.username);
    if !verify_password(form.current_password, user.password_hash.clone()).await? {
        errors.add(
            "current_password",
            "Your old password was entered incorrectly. Please enter it again.",
        );
    }
    errors.into_result()?;

    let password_hash = hash_password(form.new_password).await?;
    accounts::set_password_hash(&state.pool, user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Senha alterada");
    Ok(Json(MessageResponse::new(
        "Your password was successfully updated!",
    )))
}

/// `DELETE /accounts/users/:id`: só superusuários; perfil e registros caem
/// em cascata
pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    current.require_superuser()?;
    if user_id == current.id() {
        return Err(ApiError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    accounts::delete_user(&state.pool, user_id).await?;
    tracing::info!(deleted = %user_id, by = %current.id(), "Usuário removido por superusuário");
    Ok(StatusCode::NO_CONTENT)
}
