use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use chrono::{DateTime, Utc};
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::auth::hash_session_token;
use crate::error::ApiError;
use crate::models::AppState;
use crate::store::AdminStore;

/// An authenticated back-office admin. Handlers that take this are admin-only.
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub admin_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub session_id: Uuid,
    pub session_expires_at: DateTime<Utc>,
}

impl FromRequestParts<AppState> for AdminContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Authorization: Bearer <token>
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let token_hash = hash_session_token(authz.token());

            let session = state
                .store
                .find_active_session(&token_hash, Utc::now())
                .await?
                .ok_or_else(ApiError::session_expired)?;

            Ok(AdminContext {
                admin_id: session.admin_id,
                username: session.username,
                display_name: session.display_name,
                session_id: session.session_id,
                session_expires_at: session.expires_at,
            })
        }
    }
}
