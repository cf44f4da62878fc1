//! Estado compartilhado entre os handlers

use std::sync::Arc;

use chrono::Duration;
use clinic_db::crypto::ResetCodeKey;
use sqlx::SqlitePool;

use crate::auth::JwtKeys;
use crate::config::{AppConfig, ConfigError};
use crate::services::{
    DisabledPhotoStore, HttpMailer, HttpPhotoStore, LogMailer, Mailer, PhotoStore,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: JwtKeys,
    pub reset_key: ResetCodeKey,
    pub photo_store: Arc<dyn PhotoStore>,
    pub mailer: Arc<dyn Mailer>,
    pub session_ttl: Duration,
    pub reset_code_ttl: Duration,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Monta o estado a partir da configuração, escolhendo as implementações
    /// dos colaboradores externos
    pub fn from_config(pool: SqlitePool, config: &AppConfig) -> Result<Self, ConfigError> {
        let reset_key = ResetCodeKey::from_secret(config.reset_code_secret.as_bytes()).map_err(
            |e| ConfigError::Invalid {
                key: "CLINIC_RESET_CODE_SECRET",
                reason: e.to_string(),
            },
        )?;

        let photo_store: Arc<dyn PhotoStore> = match &config.photo_store {
            Some(photo) => Arc::new(HttpPhotoStore::new(photo.clone()).map_err(|e| {
                ConfigError::Invalid {
                    key: "CLINIC_PHOTO_STORE_URL",
                    reason: e.to_string(),
                }
            })?),
            None => {
                tracing::warn!("Serviço de fotos não configurado; envios de foto serão recusados");
                Arc::new(DisabledPhotoStore)
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.mail_gateway {
            Some(gateway) => Arc::new(
                HttpMailer::new(gateway.clone(), config.mail_from.clone()).map_err(|e| {
                    ConfigError::Invalid {
                        key: "CLINIC_MAIL_GATEWAY_URL",
                        reason: e.to_string(),
                    }
                })?,
            ),
            None => {
                tracing::warn!("Gateway de email não configurado; emails irão apenas para o log");
                Arc::new(LogMailer)
            }
        };

        Ok(Self {
            pool,
            jwt: JwtKeys::from_secret(config.jwt_secret.as_bytes()),
            reset_key,
            photo_store,
            mailer,
            session_ttl: config.session_ttl,
            reset_code_ttl: config.reset_code_ttl,
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}
