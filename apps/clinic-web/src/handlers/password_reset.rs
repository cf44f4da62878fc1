//! Redefinição de senha em três passos: pedido do código, verificação e
//! nova senha
//!
//! O estado fica na tabela de códigos, indexada por um token aleatório que o
//! cliente devolve a cada passo. O código em si só existe no email enviado.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use clinic_db::crypto::{generate_reset_code, hash_reset_code, verify_reset_code};
use clinic_db::models::PasswordResetCode;
use clinic_db::{accounts, reset_codes, sessions};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use super::MessageResponse;
use crate::auth::password::hash_password;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::forms::accounts::{
    new_password_errors, ForgotPasswordForm, ResetPasswordForm, VerifyCodeForm,
};
use crate::services::Email;
use crate::state::AppState;

const RESET_SUBJECT: &str = "Password Reset Code";
const INVALID_CODE: &str = "Invalid verification code";
const RESET_EXPIRED: &str = "Password reset session expired. Please request a new code.";

#[derive(Debug, Serialize)]
pub struct ResetTokenResponse {
    pub reset_token: Uuid,
    pub message: &'static str,
}

/// `POST /accounts/forgot-password`
///
/// Emails desconhecidos recebem a mesma resposta, com um token que nunca foi
/// gravado.
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<ForgotPasswordForm>,
) -> Result<(StatusCode, Json<ResetTokenResponse>), ApiError> {
    form.validate()?;

    let purged = reset_codes::purge_expired(&state.pool, Utc::now()).await?;
    if purged > 0 {
        tracing::debug!(purged, "Códigos de redefinição vencidos removidos");
    }

    let accepted = |reset_token: Uuid| {
        (
            StatusCode::ACCEPTED,
            Json(ResetTokenResponse {
                reset_token,
                message: "If the email is registered, a verification code has been sent to it.",
            }),
        )
    };

    let Some(user) = accounts::find_user_by_email(&state.pool, form.email.trim()).await? else {
        tracing::info!("Pedido de redefinição para email não cadastrado");
        return Ok(accepted(Uuid::new_v4()));
    };

    let code = generate_reset_code();
    let stored = reset_codes::replace_code(
        &state.pool,
        user.id,
        &hash_reset_code(&state.reset_key, &code),
        state.reset_code_ttl,
    )
    .await?;

    let email = Email {
        to: user.email.clone(),
        subject: RESET_SUBJECT.to_string(),
        body: format!("Your verification code is: {}", code.as_str()),
    };
    if let Err(e) = state.mailer.send(email).await {
        tracing::warn!(user_id = %user.id, error = %e, "Falha ao enviar o código de redefinição");
        reset_codes::delete_code(&state.pool, stored.id).await?;
        return Err(ApiError::ExternalService(
            "Failed to send the verification email. Please try again.".to_string(),
        ));
    }

    tracing::info!(user_id = %user.id, "Código de redefinição enviado");
    Ok(accepted(stored.id))
}

/// Carrega o código do token se ainda estiver dentro da validade
async fn live_code(state: &AppState, reset_token: &str) -> Result<Option<PasswordResetCode>, ApiError> {
    let Ok(token_id) = Uuid::parse_str(reset_token.trim()) else {
        return Ok(None);
    };
    let code = reset_codes::find_code(&state.pool, token_id).await?;
    Ok(code.filter(|c| !c.is_expired(Utc::now())))
}

#[derive(Debug, Serialize)]
pub struct VerifiedResponse {
    pub reset_token: Uuid,
    pub verified: bool,
    pub redirect: &'static str,
}

/// `POST /accounts/verify-code`
pub async fn verify_code(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<VerifyCodeForm>,
) -> Result<Json<VerifiedResponse>, ApiError> {
    let code = live_code(&state, &form.reset_token)
        .await?
        .filter(|stored| verify_reset_code(&state.reset_key, &form.code, &stored.code_hash))
        .ok_or_else(|| {
            tracing::warn!("Código de verificação inválido");
            ApiError::BadRequest(INVALID_CODE.to_string())
        })?;

    reset_codes::mark_verified(&state.pool, code.id, Utc::now()).await?;
    Ok(Json(VerifiedResponse {
        reset_token: code.id,
        verified: true,
        redirect: "/accounts/reset-password",
    }))
}

/// `POST /accounts/reset-password`: exige token verificado e dentro da
/// validade; encerra todas as sessões do usuário
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<ResetPasswordForm>,
) -> Result<Json<MessageResponse>, ApiError> {
    let code = live_code(&state, &form.reset_token)
        .await?
        .filter(|c| c.verified_at.is_some())
        .ok_or_else(|| ApiError::BadRequest(RESET_EXPIRED.to_string()))?;

    let user = accounts::get_user(&state.pool, code.user_id).await?;
    new_password_errors(&form.new_password, &form.confirm_password, &user.username)
        .into_result()?;

    let password_hash = hash_password(form.new_password).await?;
    accounts::set_password_hash(&state.pool, user.id, &password_hash).await?;
    reset_codes::delete_code(&state.pool, code.id).await?;
    let closed = sessions::delete_user_sessions(&state.pool, user.id).await?;

    tracing::info!(user_id = %user.id, closed_sessions = closed, "Senha redefinida");
    Ok(Json(
        MessageResponse::new("Your password has been reset successfully. Please log in.")
            .redirect_to("/"),
    ))
}
