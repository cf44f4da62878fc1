//! Extrator do usuário autenticado
//!
//! Lê `Authorization: Bearer <jwt>`, confere a assinatura e exige que a
//! sessão referenciada ainda exista e não tenha expirado.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use clinic_db::models::{Account, RecordScope, RoleProfile};
use clinic_db::{accounts, sessions, DbError};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub account: Account,
    pub session_id: Uuid,
}

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.account.user.id
    }

    pub fn is_superuser(&self) -> bool {
        self.account.user.is_superuser
    }

    /// Administrador ou superusuário
    pub fn is_staff(&self) -> bool {
        self.account.is_staff()
    }

    /// Registros clínicos que este usuário pode listar
    pub fn record_scope(&self) -> RecordScope {
        if self.is_staff() {
            return RecordScope::All;
        }
        match &self.account.profile {
            RoleProfile::Patient(p) => RecordScope::Patient(p.user_id),
            RoleProfile::Doctor(d) => RecordScope::Doctor(d.user_id),
            RoleProfile::Admin(_) => RecordScope::All,
        }
    }

    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }

    pub fn require_superuser(&self) -> Result<(), ApiError> {
        if self.is_superuser() {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(ApiError::unauthenticated)?;
        let claims = state.jwt.verify(token)?;

        let session = sessions::find_active_session(&state.pool, claims.sid, Utc::now())
            .await?
            .filter(|s| s.user_id == claims.sub)
            .ok_or_else(|| {
                tracing::warn!(session_id = %claims.sid, "Sessão inexistente ou expirada");
                ApiError::unauthenticated()
            })?;

        let account = match accounts::get_account(&state.pool, session.user_id).await {
            Ok(account) => account,
            Err(DbError::NotFound(_)) => return Err(ApiError::unauthenticated()),
            Err(e) => return Err(e.into()),
        };
        if !account.user.is_active {
            return Err(ApiError::unauthenticated());
        }

        Ok(CurrentUser {
            account,
            session_id: session.id,
        })
    }
}
