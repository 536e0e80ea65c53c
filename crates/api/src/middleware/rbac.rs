//! Role gates for administrative routes.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use journey_core::error::CoreError;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// An authenticated admin. Learners get 403.
///
/// Used by the final-test reset, which acts on another user's journey.
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Core(CoreError::Forbidden(format!(
                "User {} is not an admin",
                user.user_id
            ))));
        }
        Ok(Self(user))
    }
}
