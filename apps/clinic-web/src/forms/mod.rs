//! Formulários de entrada e as suas regras de validação
//!
//! Os formulários usam `validator` para as regras por campo; regras que
//! envolvem mais de um campo (confirmação de senha, datas da receita) ficam em
//! métodos `errors()` que devolvem [`FieldErrors`](crate::error::FieldErrors).

use std::borrow::Cow;

use clinic_db::models::Money;
use serde::{Deserialize, Deserializer};
use validator::ValidationError;

pub mod accounts;
pub mod clinical;

pub(crate) const REQUIRED: &str = "This field is required.";

pub(crate) fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Campo opcional em que a string em branco significa "sem valor"
pub(crate) fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

/// Telefone com 7 a 20 dígitos, opcionalmente precedido de `+`
pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    let digits = value.strip_prefix('+').unwrap_or(value);
    let len = digits.chars().count();
    if (7..=20).contains(&len) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(invalid(
            "phone",
            "Phone number must be entered in the format: '+999999999'. Up to 20 digits allowed.",
        ))
    }
}

/// Letras, dígitos e `@ . + - _`
pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    if value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        Ok(())
    } else {
        Err(invalid(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ))
    }
}

pub fn validate_non_negative(value: &Money) -> Result<(), ValidationError> {
    if value.is_negative() {
        Err(invalid("non_negative", "Ensure this value is greater than or equal to 0."))
    } else {
        Ok(())
    }
}
