use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;

/// Authenticated user plus the bearer session the request arrived on.
pub(crate) struct CurrentUser(pub(crate) User, pub(crate) SessionId);
pub(crate) struct CurrentStaff(pub(crate) User, pub(crate) SessionId);

/// Stable id of one bearer session; anti-forgery tokens are bound to it.
pub(crate) struct SessionId(pub(crate) String);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        let user = repositories::users::find_by_id(app_state.db(), &claims.sub)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

        let Some(user) = user else {
            return Err(ApiError::Unauthorized("User not found"));
        };

        if !user.is_active {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        Ok(CurrentUser(user, SessionId(security::session_id(token, &claims))))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentStaff {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user, session) = CurrentUser::from_request_parts(parts, state).await?;

        if user.role == UserRole::Staff {
            Ok(CurrentStaff(user, session))
        } else {
            Err(ApiError::Forbidden("Staff access required"))
        }
    }
}

/// Token to hand out for this user's current bearer session.
pub(crate) fn issue_anti_forgery(state: &AppState, user: &User, session: &SessionId) -> String {
    security::anti_forgery_token(&user.id, &session.0, state.settings())
}

/// Rejects a mutating request whose anti-forgery token was not issued to
/// `user` for this bearer session.
pub(crate) fn require_anti_forgery(
    state: &AppState,
    user: &User,
    session: &SessionId,
    token: &str,
) -> Result<(), ApiError> {
    security::verify_anti_forgery_token(token, &user.id, &session.0, state.settings()).map_err(
        |_| {
            tracing::warn!(user_id = %user.id, "Rejected request with invalid anti-forgery token");
            ApiError::Forbidden("Invalid anti-forgery token")
        },
    )
}
