//! Definições de erro para a biblioteca clinic-db
//!
//! Este módulo define os tipos de erro devolvidos pelos repositórios

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Erros específicos para operações de banco de dados
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Erro de conexão com banco de dados: {0}")]
    ConnectionError(String),

    #[error("Erro de migração: {0}")]
    MigrationError(String),

    #[error("Erro de consulta: {0}")]
    QueryError(String),

    #[error("Entidade não encontrada: {0}")]
    NotFound(String),

    /// Violação de UNIQUE; `field` é a coluna que colidiu (ex.: `username`)
    #[error("Valor já cadastrado para o campo {field}")]
    UniqueViolation { field: String },

    #[error("Registro referenciado não existe: {0}")]
    ForeignKeyViolation(String),

    #[error("Violação de restrição: {0}")]
    ConstraintViolation(String),

    #[error("Erro interno: {0}")]
    InternalError(String),
}

impl DbError {
    pub fn not_found(entity: &str) -> Self {
        DbError::NotFound(entity.to_string())
    }
}

/// Extrai o nome da coluna de mensagens como `UNIQUE constraint failed: users.email`
fn unique_field(message: &str) -> String {
    message
        .rsplit(':')
        .next()
        .and_then(|cols| cols.split(',').next())
        .map(|col| col.trim())
        .and_then(|col| col.rsplit('.').next())
        .unwrap_or("unknown")
        .to_string()
}

/// Conversão de erros específicos do SQLx para nossos tipos de erro
impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DbError::NotFound("Registro não encontrado".to_string()),
            sqlx::Error::Database(dbe) => match dbe.kind() {
                ErrorKind::UniqueViolation => DbError::UniqueViolation {
                    field: unique_field(dbe.message()),
                },
                ErrorKind::ForeignKeyViolation => {
                    DbError::ForeignKeyViolation(dbe.message().to_string())
                }
                ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                    DbError::ConstraintViolation(dbe.message().to_string())
                }
                _ => DbError::QueryError(dbe.message().to_string()),
            },
            sqlx::Error::ColumnNotFound(col) => {
                DbError::QueryError(format!("Coluna não encontrada: {}", col))
            }
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::QueryError(format!("Tipo não encontrado: {}", type_name))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::QueryError(format!("Erro ao decodificar coluna {}: {}", index, source))
            }
            sqlx::Error::Io(io_err) => DbError::ConnectionError(io_err.to_string()),
            sqlx::Error::Configuration(conf_err) => DbError::ConnectionError(conf_err.to_string()),
            sqlx::Error::PoolClosed => {
                DbError::ConnectionError("Pool de conexões fechado".to_string())
            }
            sqlx::Error::PoolTimedOut => {
                DbError::ConnectionError("Timeout no pool de conexões".to_string())
            }
            sqlx::Error::WorkerCrashed => {
                DbError::InternalError("Worker do banco de dados falhou".to_string())
            }
            _ => DbError::InternalError(format!("Erro inesperado: {:?}", error)),
        }
    }
}
