//! Tabela de rotas do serviço
//!
//! Rotas públicas: saúde, login, cadastro e os três passos da redefinição de
//! senha. As demais exigem um token de sessão, verificado pelo extrator
//! `CurrentUser` de cada handler.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::handlers::{
    accounts, analytics, clinical, health, home, password_reset, profiles,
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let accounts_routes = Router::new()
        .route("/register", post(accounts::register))
        .route("/change-password", post(accounts::change_password))
        .route("/forgot-password", post(password_reset::forgot_password))
        .route("/verify-code", post(password_reset::verify_code))
        .route("/reset-password", post(password_reset::reset_password))
        .route(
            "/profile/patient/:id",
            get(profiles::patient_profile).put(profiles::update_patient_profile),
        )
        .route(
            "/profile/patient/:id/photo",
            post(profiles::upload_patient_photo),
        )
        .route(
            "/profile/doctor/:id",
            get(profiles::doctor_profile).put(profiles::update_doctor_profile),
        )
        .route(
            "/profile/doctor/:id/photo",
            post(profiles::upload_doctor_photo),
        )
        .route(
            "/profile/admin",
            get(profiles::admin_profile).put(profiles::update_admin_profile),
        )
        .route("/users/:id", axum::routing::delete(accounts::delete_user));

    let clinic_routes = Router::new()
        .route(
            "/appointments",
            get(clinical::list_appointments).post(clinical::create_appointment),
        )
        .route(
            "/appointments/:id",
            get(clinical::get_appointment)
                .put(clinical::update_appointment)
                .delete(clinical::delete_appointment),
        )
        .route(
            "/prescriptions",
            get(clinical::list_prescriptions).post(clinical::create_prescription),
        )
        .route(
            "/prescriptions/:id",
            get(clinical::get_prescription).put(clinical::update_prescription),
        )
        .route(
            "/reports",
            get(clinical::list_reports).post(clinical::create_report),
        )
        .route(
            "/reports/:id",
            get(clinical::get_report)
                .put(clinical::update_report)
                .delete(clinical::delete_report),
        )
        .route(
            "/billings",
            get(clinical::list_billings).post(clinical::create_billing),
        )
        .route(
            "/billings/:id",
            get(clinical::get_billing).put(clinical::update_billing),
        );

    let analytics_routes = Router::new()
        .route("/appointment-status", get(analytics::appointment_status))
        .route("/top-doctors", get(analytics::top_doctors))
        .route("/revenue", get(analytics::revenue))
        .route("/reports-per-doctor", get(analytics::reports_per_doctor))
        .route(
            "/patients-without-upcoming",
            get(analytics::patients_without_upcoming),
        );

    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        .route("/health", get(health::check))
        .route("/", post(accounts::login))
        .route("/main", get(home::dashboard))
        .route("/main/profile", get(home::profile_redirect))
        .route("/main/logout", post(accounts::logout))
        .nest("/accounts", accounts_routes)
        .nest("/clinic", clinic_routes)
        .nest("/analytics", analytics_routes)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Page not found".to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::test_support::TestApp;

    #[tokio::test]
    async fn test_health_is_public() -> anyhow::Result<()> {
        let app = TestApp::new().await?;
        let (status, body) = app.get("/health", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() -> anyhow::Result<()> {
        let app = TestApp::new().await?;
        let (status, body) = app.get("/nao-existe", None).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        Ok(())
    }

    #[tokio::test]
    async fn test_protected_routes_require_session() -> anyhow::Result<()> {
        let app = TestApp::new().await?;
        for uri in ["/main", "/clinic/appointments", "/analytics/revenue"] {
            let (status, _) = app.get(uri, None).await?;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        }
        Ok(())
    }
}
