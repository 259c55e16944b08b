use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
    auth::{generate_session_token, hash_session_token, verify_password},
    error::ApiError,
    middleware::auth_context::AdminContext,
    models::*,
    store::AdminStore,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

#[derive(Debug, Serialize)]
pub struct MeData {
    pub admin: AdminProfile,
    pub session_id: uuid::Uuid,
    pub session_expires_at: DateTime<Utc>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiOk<LoginResponseData>>, ApiError> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("username and password are required"));
    }

    // 1) Load admin
    let admin = state
        .store
        .find_admin_by_username(username)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    if !admin.is_active {
        return Err(ApiError::Forbidden("FORBIDDEN", "Account is disabled".into()));
    }

    // 2) Verify password
    if !verify_password(&req.password, &admin.password_hash) {
        tracing::warn!(username, "failed admin login");
        return Err(ApiError::invalid_credentials());
    }

    // 3) Create session
    let access_token = generate_session_token();
    let expires_at = Utc::now() + Duration::hours(state.session_ttl_hours);
    state
        .store
        .create_session(admin.admin_id, &hash_session_token(&access_token), expires_at)
        .await?;

    tracing::info!(admin_id = %admin.admin_id, "admin logged in");

    Ok(Json(ApiOk {
        data: LoginResponseData {
            access_token,
            expires_at,
            admin: AdminProfile {
                admin_id: admin.admin_id,
                username: admin.username,
                display_name: admin.display_name,
            },
        },
    }))
}

pub async fn me(admin: AdminContext) -> Json<ApiOk<MeData>> {
    Json(ApiOk {
        data: MeData {
            admin: AdminProfile {
                admin_id: admin.admin_id,
                username: admin.username,
                display_name: admin.display_name,
            },
            session_id: admin.session_id,
            session_expires_at: admin.session_expires_at,
        },
    })
}

pub async fn logout(
    State(state): State<AppState>,
    admin: AdminContext,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    state.store.revoke_session(admin.session_id).await?;
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}
