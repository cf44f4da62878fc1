//! Autenticação: senhas (argon2), tokens de sessão (JWT) e o extrator do
//! usuário autenticado

pub mod jwt;
pub mod password;
pub mod session;

pub use jwt::{Claims, JwtKeys};
pub use session::CurrentUser;
