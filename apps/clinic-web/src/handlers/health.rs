use axum::Json;
use serde::Serialize;

use crate::built_info;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub built_at: &'static str,
}

/// `GET /health`
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: built_info::PKG_VERSION,
        built_at: built_info::BUILT_TIME_UTC,
    })
}
