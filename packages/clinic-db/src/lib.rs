//! Clinic DB - Biblioteca compartilhada para acesso ao banco de dados da clínica
//!
//! Esta biblioteca fornece:
//! - Modelos de dados (usuários, perfis por papel, registros clínicos)
//! - Migrações automáticas do banco de dados
//! - Repositórios com as consultas usadas pelo serviço web
//! - Consultas agregadas para relatórios administrativos
//! - Primitivas para o código de redefinição de senha

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

pub mod accounts;
pub mod analytics;
pub mod appointments;
pub mod billing;
pub mod crypto;
pub mod error;
pub mod migrations;
pub mod models;
pub mod prescriptions;
pub mod reports;
pub mod reset_codes;
pub mod sessions;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::DbError;

/// Configuração da conexão com o banco de dados
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Caminho para o arquivo SQLite
    pub db_path: String,
    /// Número máximo de conexões no pool
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_path: "data/clinic.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Inicializa o pool de conexões SQLite e aplica as migrações pendentes
pub async fn init_db_pool(config: &DbConfig) -> Result<SqlitePool> {
    let db_path = Path::new(&config.db_path);

    // Verifica se o diretório pai existe
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .context("Falha ao criar diretório para banco de dados")?;
        }
    }

    let connection_options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .foreign_keys(true)
        .pragma("synchronous", "NORMAL");

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(connection_options)
        .await
        .context("Falha ao conectar ao banco de dados SQLite")?;

    migrations::run_migrations(&pool)
        .await
        .context("Falha ao aplicar migrações")?;

    info!("Banco de dados inicializado com sucesso: {}", config.db_path);
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_db_connection() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("nested").join("test.db");

        let config = DbConfig {
            db_path: db_path.to_string_lossy().into_owned(),
            max_connections: 2,
        };

        // O diretório intermediário deve ser criado automaticamente
        let pool = init_db_pool(&config).await?;
        assert!(db_path.exists());

        let result: (i64,) = sqlx::query_as("SELECT 1").fetch_one(&pool).await?;
        assert_eq!(result.0, 1);

        let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await?;
        assert_eq!(foreign_keys, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_reopen_keeps_schema_version() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("reopen.db");
        let config = DbConfig {
            db_path: db_path.to_string_lossy().into_owned(),
            max_connections: 1,
        };

        let pool = init_db_pool(&config).await?;
        pool.close().await;

        // Segunda abertura não deve reaplicar migrações
        let pool = init_db_pool(&config).await?;
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await?;
        assert_eq!(version, migrations::schema_version());

        Ok(())
    }
}
