//! Clinic Web - serviço HTTP de gestão da clínica
//!
//! Cadastro e autenticação de pacientes, médicos e administradores, edição de
//! perfis, redefinição de senha por código enviado por email e os registros
//! clínicos (agendamentos, receitas, laudos e cobranças).

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod forms;
pub mod handlers;
pub mod router;
pub mod services;
pub mod state;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

/// Informações geradas em tempo de compilação
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub use config::AppConfig;
pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
