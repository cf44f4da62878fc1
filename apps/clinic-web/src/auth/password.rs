//! Hash de senhas com Argon2id e regras mínimas de força

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tokio::sync::OnceCell;

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Gera o hash PHC da senha fora das threads do runtime
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::Internal(format!("Falha ao gerar hash de senha: {e}")))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Tarefa de hash interrompida: {e}")))?
}

/// Confere a senha com o hash armazenado. Hashes malformados nunca conferem.
pub async fn verify_password(password: String, stored_hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || match PasswordHash::new(&stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Tarefa de verificação interrompida: {e}")))
}

static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

/// Verificação contra um hash descartável, para que usuários inexistentes
/// custem o mesmo que senhas erradas. Sempre devolve `false`.
pub async fn verify_unknown_user(password: String) -> Result<bool, ApiError> {
    let dummy = DUMMY_HASH
        .get_or_try_init(|| hash_password("usuario-inexistente".to_string()))
        .await?;
    verify_password(password, dummy.clone()).await?;
    Ok(false)
}

/// Problemas de força da senha, na ordem em que são exibidos ao usuário
pub fn password_problems(password: &str, username: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        problems.push("This password is too short. It must contain at least 8 characters.");
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.");
    }
    if !username.is_empty() && password.eq_ignore_ascii_case(username) {
        problems.push("The password is too similar to the username.");
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() -> anyhow::Result<()> {
        let hash = hash_password("correta-cavalo-42".to_string()).await?;
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correta-cavalo-42".to_string(), hash.clone()).await?);
        assert!(!verify_password("errada".to_string(), hash).await?);
        assert!(!verify_password("qualquer".to_string(), "hash-de-teste".to_string()).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_user_never_matches() -> anyhow::Result<()> {
        assert!(!verify_unknown_user("usuario-inexistente".to_string()).await?);
        assert!(!verify_unknown_user("senha-forte-1".to_string()).await?);
        assert!(DUMMY_HASH.get().is_some_and(|h| h.starts_with("$argon2")));
        Ok(())
    }

    #[test]
    fn test_password_problems() {
        assert!(password_problems("senha-forte-1", "joana").is_empty());
        assert_eq!(password_problems("abc", "joana").len(), 1);
        assert_eq!(
            password_problems("12345678", "joana"),
            vec!["This password is entirely numeric."]
        );
        assert_eq!(
            password_problems("JoanaSilva", "joanasilva"),
            vec!["The password is too similar to the username."]
        );
    }
}
