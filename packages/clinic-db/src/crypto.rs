//! Módulo de criptografia para o código de redefinição de senha
//!
//! O código de 6 dígitos nunca é persistido em claro: o banco guarda apenas o
//! HMAC-SHA256 do código com a chave do servidor.

use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, Rng};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Menor e maior código aceitos (sempre 6 dígitos)
const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// Erros específicos para operações de criptografia
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Configuração de criptografia inválida: {0}")]
    InvalidConfiguration(String),
}

/// Chave HMAC usada para proteger os códigos
#[derive(Clone)]
pub struct ResetCodeKey {
    mac: HmacSha256,
}

impl ResetCodeKey {
    /// Cria a chave a partir do segredo configurado
    pub fn from_secret(secret: &[u8]) -> Result<Self, CryptoError> {
        if secret.len() < 16 {
            return Err(CryptoError::InvalidConfiguration(format!(
                "O segredo deve ter ao menos 16 bytes, recebeu {}",
                secret.len()
            )));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| CryptoError::InvalidConfiguration(e.to_string()))?;
        Ok(Self { mac })
    }

    fn mac(&self) -> HmacSha256 {
        self.mac.clone()
    }
}

impl std::fmt::Debug for ResetCodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResetCodeKey(..)")
    }
}

/// Gera um novo código numérico de 6 dígitos
pub fn generate_reset_code() -> Zeroizing<String> {
    let code: u32 = OsRng.gen_range(CODE_MIN..=CODE_MAX);
    Zeroizing::new(code.to_string())
}

/// Calcula o HMAC do código para armazenamento
pub fn hash_reset_code(key: &ResetCodeKey, code: &str) -> Vec<u8> {
    let mut mac = key.mac();
    mac.update(code.trim().as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Compara o código informado com o HMAC armazenado em tempo constante
pub fn verify_reset_code(key: &ResetCodeKey, code: &str, expected_hash: &[u8]) -> bool {
    let mut mac = key.mac();
    mac.update(code.trim().as_bytes());
    mac.verify_slice(expected_hash).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ResetCodeKey {
        ResetCodeKey::from_secret(b"segredo-de-teste-com-32-bytes!!!").unwrap()
    }

    #[test]
    fn test_generated_codes_have_six_digits() {
        for _ in 0..200 {
            let code = generate_reset_code();
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
            assert_ne!(code.as_bytes()[0], b'0');
        }
    }

    #[test]
    fn test_verify_accepts_only_matching_code() {
        let key = key();
        let stored = hash_reset_code(&key, "482913");

        assert!(verify_reset_code(&key, "482913", &stored));
        assert!(verify_reset_code(&key, " 482913 ", &stored));
        assert!(!verify_reset_code(&key, "482914", &stored));
        assert!(!verify_reset_code(&key, "", &stored));
    }

    #[test]
    fn test_different_keys_produce_different_hashes() {
        let other = ResetCodeKey::from_secret(b"outro-segredo-de-teste-32-bytes!").unwrap();
        let stored = hash_reset_code(&key(), "123456");
        assert!(!verify_reset_code(&other, "123456", &stored));
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(ResetCodeKey::from_secret(b"curto").is_err());
    }
}
