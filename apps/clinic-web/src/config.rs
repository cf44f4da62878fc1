//! Configuração do serviço a partir de variáveis de ambiente `CLINIC_*`

use std::net::SocketAddr;

use chrono::Duration;
use clinic_db::DbConfig;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_SESSION_TTL_HOURS: i64 = 12;
const DEFAULT_RESET_CODE_TTL_MINUTES: i64 = 15;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_MAIL_FROM: &str = "no-reply@clinica.med.br";
const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Variável de ambiente obrigatória ausente: {0}")]
    Missing(&'static str),

    #[error("Valor inválido para {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Serviço externo de hospedagem de fotos
#[derive(Debug, Clone)]
pub struct PhotoStoreConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub upload_preset: Option<String>,
}

/// Gateway HTTP de envio de emails
#[derive(Debug, Clone)]
pub struct MailGatewayConfig {
    pub url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub db: DbConfig,
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub reset_code_secret: String,
    pub reset_code_ttl: Duration,
    pub max_upload_bytes: usize,
    /// Sem configuração, envios de foto falham com mensagem ao usuário
    pub photo_store: Option<PhotoStoreConfig>,
    /// Sem configuração, os emails são apenas registrados no log
    pub mail_gateway: Option<MailGatewayConfig>,
    pub mail_from: String,
    pub json_logs: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Monta a configuração a partir de uma função de consulta; valores vazios
    /// contam como ausentes.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = parse_or(
            "CLINIC_BIND_ADDR",
            get("CLINIC_BIND_ADDR"),
            DEFAULT_BIND_ADDR.parse().map_err(|e| invalid("CLINIC_BIND_ADDR", e))?,
        )?;

        let defaults = DbConfig::default();
        let db = DbConfig {
            db_path: get("CLINIC_DB_PATH").unwrap_or(defaults.db_path),
            max_connections: parse_or(
                "CLINIC_DB_MAX_CONNECTIONS",
                get("CLINIC_DB_MAX_CONNECTIONS"),
                defaults.max_connections,
            )?,
        };

        let jwt_secret = get("CLINIC_JWT_SECRET").ok_or(ConfigError::Missing("CLINIC_JWT_SECRET"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                key: "CLINIC_JWT_SECRET",
                reason: format!("deve ter ao menos {MIN_JWT_SECRET_LEN} bytes"),
            });
        }

        let reset_code_secret = get("CLINIC_RESET_CODE_SECRET")
            .ok_or(ConfigError::Missing("CLINIC_RESET_CODE_SECRET"))?;

        let session_hours: i64 = parse_or(
            "CLINIC_SESSION_TTL_HOURS",
            get("CLINIC_SESSION_TTL_HOURS"),
            DEFAULT_SESSION_TTL_HOURS,
        )?;
        let reset_minutes: i64 = parse_or(
            "CLINIC_RESET_CODE_TTL_MINUTES",
            get("CLINIC_RESET_CODE_TTL_MINUTES"),
            DEFAULT_RESET_CODE_TTL_MINUTES,
        )?;
        if session_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "CLINIC_SESSION_TTL_HOURS",
                reason: "deve ser positivo".to_string(),
            });
        }
        if reset_minutes <= 0 {
            return Err(ConfigError::Invalid {
                key: "CLINIC_RESET_CODE_TTL_MINUTES",
                reason: "deve ser positivo".to_string(),
            });
        }

        let photo_store = get("CLINIC_PHOTO_STORE_URL").map(|endpoint| PhotoStoreConfig {
            endpoint,
            api_key: get("CLINIC_PHOTO_STORE_API_KEY"),
            upload_preset: get("CLINIC_PHOTO_STORE_UPLOAD_PRESET"),
        });

        let mail_gateway = get("CLINIC_MAIL_GATEWAY_URL").map(|url| MailGatewayConfig {
            url,
            api_key: get("CLINIC_MAIL_GATEWAY_API_KEY"),
        });

        Ok(Self {
            bind_addr,
            db,
            jwt_secret,
            session_ttl: Duration::hours(session_hours),
            reset_code_secret,
            reset_code_ttl: Duration::minutes(reset_minutes),
            max_upload_bytes: parse_or(
                "CLINIC_MAX_UPLOAD_BYTES",
                get("CLINIC_MAX_UPLOAD_BYTES"),
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
            photo_store,
            mail_gateway,
            mail_from: get("CLINIC_MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
            json_logs: parse_or("CLINIC_LOG_JSON", get("CLINIC_LOG_JSON"), false)?,
        })
    }
}

fn invalid(key: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e| invalid(key, e)),
        None => Ok(default),
    }
}
