//! Sessões de login persistidas
//!
//! O token entregue ao cliente referencia uma linha desta tabela; remover a
//! linha invalida o token mesmo antes da sua expiração.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::Session;

pub async fn create_session(
    pool: &SqlitePool,
    user_id: Uuid,
    ttl: Duration,
) -> Result<Session, DbError> {
    let now = Utc::now();
    let session = Session {
        id: Uuid::new_v4(),
        user_id,
        created_at: now,
        expires_at: now + ttl,
    };

    sqlx::query("INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(pool)
        .await?;

    Ok(session)
}

/// Devolve a sessão apenas se ainda estiver válida em `now`
pub async fn find_active_session(
    pool: &SqlitePool,
    session_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<Session>, DbError> {
    let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
        .bind(session_id)
        .fetch_optional(pool)
        .await?;
    Ok(session.filter(|s| s.expires_at > now))
}

pub async fn delete_session(pool: &SqlitePool, session_id: Uuid) -> Result<(), DbError> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Encerra todas as sessões do usuário (ex.: após troca de senha)
pub async fn delete_user_sessions(pool: &SqlitePool, user_id: Uuid) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
