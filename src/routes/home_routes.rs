use axum::{Json, Router, routing::get};

use crate::models::{ApiOk, AppState};

#[derive(serde::Serialize)]
pub struct HealthData {
    pub status: &'static str,
    pub version: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

pub async fn health() -> Json<ApiOk<HealthData>> {
    Json(ApiOk {
        data: HealthData {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        },
    })
}
