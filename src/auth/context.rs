use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::repo::User;
use crate::auth::resolver::{resolve_principal, AuthOutcome};
use crate::auth::session::{SessionCookie, SessionRecord};
use crate::auth::token::TokenCodec;
use crate::error::ApiError;
use crate::state::AppState;

/// Per-request context handed to every handler, authenticated or not.
/// Construction never fails; a request the resolver could not authenticate
/// simply carries no user. Authorization stays with the handlers.
pub struct RequestContext {
    pub user: Option<User>,
    pub session: Option<SessionRecord>,
    pub outcome: AuthOutcome,
}

impl RequestContext {
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn require_user(&self) -> Result<&User, ApiError> {
        self.user.as_ref().ok_or(ApiError::Unauthorized)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let codec = TokenCodec::from_ref(state);
        let cookie = SessionCookie::from_ref(state);

        let resolution = resolve_principal(
            &parts.headers,
            &codec,
            &cookie,
            state.sessions.as_ref(),
            state.config.cookie.ttl,
        )
        .await;

        let user = match resolution.outcome.principal() {
            Some(user_id) => match User::find_by_id(&state.db, user_id).await {
                Ok(Some(user)) => Some(user),
                Ok(None) => {
                    warn!(user_id = %user_id, "authenticated principal has no user row");
                    None
                }
                Err(e) => {
                    warn!(error = %e, user_id = %user_id, "user lookup failed, degrading to anonymous");
                    None
                }
            },
            None => None,
        };

        Ok(RequestContext {
            user,
            session: resolution.session,
            outcome: resolution.outcome,
        })
    }
}
