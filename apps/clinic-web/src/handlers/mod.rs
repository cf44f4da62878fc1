//! Handlers HTTP, um módulo por área da aplicação

pub mod accounts;
pub mod analytics;
pub mod clinical;
pub mod health;
pub mod home;
pub mod password_reset;
pub mod profiles;

use serde::Serialize;

/// Resposta com mensagem ao usuário e, opcionalmente, a próxima página
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self {
            message,
            redirect: None,
        }
    }

    pub fn redirect_to(mut self, path: &'static str) -> Self {
        self.redirect = Some(path);
        self
    }
}
