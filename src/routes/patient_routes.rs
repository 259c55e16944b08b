// src/routes/patient_routes.rs

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    error::ApiError,
    lifecycle::lookup::{self, PatientLookup},
    middleware::auth_context::AdminContext,
    models::{ApiOk, AppState},
};

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub phone: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/patients/lookup", get(lookup_patient))
}

/// Everything on file for one phone number, with visit counts.
pub async fn lookup_patient(
    State(state): State<AppState>,
    _admin: AdminContext,
    Query(q): Query<LookupQuery>,
) -> Result<Json<ApiOk<PatientLookup>>, ApiError> {
    let phone = q.phone.unwrap_or_default();
    let today = Utc::now().date_naive();
    let data = lookup::lookup_patient(state.store.as_ref(), &phone, today).await?;
    Ok(Json(ApiOk { data }))
}
