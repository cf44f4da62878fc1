//! Armazenamento dos códigos de redefinição de senha
//!
//! Cada pedido gera um token aleatório com validade explícita. Existe no
//! máximo um código vivo por usuário: um novo pedido substitui o anterior.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::PasswordResetCode;

/// Substitui qualquer código anterior do usuário por um novo
pub async fn replace_code(
    pool: &SqlitePool,
    user_id: Uuid,
    code_hash: &[u8],
    ttl: Duration,
) -> Result<PasswordResetCode, DbError> {
    let now = Utc::now();
    let code = PasswordResetCode {
        id: Uuid::new_v4(),
        user_id,
        code_hash: code_hash.to_vec(),
        created_at: now,
        expires_at: now + ttl,
        verified_at: None,
    };

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM password_reset_codes WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "INSERT INTO password_reset_codes (id, user_id, code_hash, created_at, expires_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(code.id)
    .bind(code.user_id)
    .bind(&code.code_hash)
    .bind(code.created_at)
    .bind(code.expires_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(code)
}

pub async fn find_code(
    pool: &SqlitePool,
    token_id: Uuid,
) -> Result<Option<PasswordResetCode>, DbError> {
    Ok(
        sqlx::query_as::<_, PasswordResetCode>("SELECT * FROM password_reset_codes WHERE id = ?")
            .bind(token_id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn mark_verified(
    pool: &SqlitePool,
    token_id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE password_reset_codes SET verified_at = ? WHERE id = ?")
        .bind(at)
        .bind(token_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("código de redefinição"));
    }
    Ok(())
}

pub async fn delete_code(pool: &SqlitePool, token_id: Uuid) -> Result<(), DbError> {
    sqlx::query("DELETE FROM password_reset_codes WHERE id = ?")
        .bind(token_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove códigos vencidos
pub async fn purge_expired(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM password_reset_codes WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{hash_reset_code, verify_reset_code, ResetCodeKey};
    use crate::test_utils::{create_patient, test_pool};
    use anyhow::Result;

    fn key() -> ResetCodeKey {
        ResetCodeKey::from_secret(b"segredo-de-teste-com-32-bytes!!!").unwrap()
    }

    #[tokio::test]
    async fn test_new_code_replaces_previous() -> Result<()> {
        let pool = test_pool().await?;
        let account = create_patient(&pool, "joana").await?;
        let key = key();

        let first = replace_code(
            &pool,
            account.user.id,
            &hash_reset_code(&key, "111111"),
            Duration::minutes(15),
        )
        .await?;
        let second = replace_code(
            &pool,
            account.user.id,
            &hash_reset_code(&key, "222222"),
            Duration::minutes(15),
        )
        .await?;

        assert!(find_code(&pool, first.id).await?.is_none());
        let stored = find_code(&pool, second.id).await?.expect("código atual");
        assert!(verify_reset_code(&key, "222222", &stored.code_hash));
        assert!(!verify_reset_code(&key, "111111", &stored.code_hash));
        Ok(())
    }

    #[tokio::test]
    async fn test_mark_verified_and_purge() -> Result<()> {
        let pool = test_pool().await?;
        let account = create_patient(&pool, "joana").await?;

        let code = replace_code(&pool, account.user.id, b"hash", Duration::minutes(15)).await?;
        mark_verified(&pool, code.id, Utc::now()).await?;
        let stored = find_code(&pool, code.id).await?.expect("código");
        assert!(stored.verified_at.is_some());
        assert!(!stored.is_expired(Utc::now()));

        let removed = purge_expired(&pool, Utc::now() + Duration::minutes(16)).await?;
        assert_eq!(removed, 1);
        assert!(matches!(
            mark_verified(&pool, code.id, Utc::now()).await,
            Err(DbError::NotFound(_))
        ));
        Ok(())
    }
}
