use axum::{
    extract::{FromRef, Path, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::AppendHeaders,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::context::RequestContext;
use crate::auth::dto::{AuthResponse, LoginRequest, MessageResponse, PublicUser, SignUpRequest};
use crate::auth::password::hash_password;
use crate::auth::repo::User;
use crate::auth::session::{SessionCookie, SessionRecord};
use crate::auth::token::TokenCodec;
use crate::error::ApiError;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(sign_up))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/auth-user", get(auth_user))
        .route("/users/:id", get(user_by_id))
}

fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[a-z0-9_]{3,24}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

/// Issue the bearer token and open a server-side session in one step, so a
/// client can continue with whichever credential it prefers.
async fn open_session(
    state: &AppState,
    user_id: Uuid,
) -> Result<(String, String), ApiError> {
    let codec = TokenCodec::from_ref(state);
    let token = codec.issue(user_id)?;

    let session = SessionRecord::new(user_id, state.config.cookie.ttl);
    state.sessions.save(&session).await?;

    let cookie = SessionCookie::from_ref(state);
    Ok((token, cookie.set_value(&session.id)))
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<(AppendHeaders<[(axum::http::HeaderName, String); 1]>, Json<AuthResponse>), ApiError> {
    let SignUpRequest {
        username,
        name,
        password,
        gender,
    } = payload;
    let (Some(username), Some(name), Some(password), Some(gender)) =
        (username, name, password, gender)
    else {
        return Err(ApiError::Validation("All fields are required".into()));
    };

    let username = username.trim().to_lowercase();
    let name = name.trim().to_string();
    if username.is_empty() || name.is_empty() || password.is_empty() {
        return Err(ApiError::Validation("All fields are required".into()));
    }
    if !is_valid_username(&username) {
        return Err(ApiError::Validation(
            "Username must be 3-24 characters of a-z, 0-9 or _".into(),
        ));
    }
    if password.len() < 6 {
        return Err(ApiError::Validation("Password too short".into()));
    }

    let hash = hash_password(&password)?;
    let user = User::create(&state.db, &username, &name, &hash, gender).await?;

    let (token, cookie) = open_session(&state, user.id).await?;

    info!(user_id = %user.id, username = %user.username, "user signed up");
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(AuthResponse {
            user: user.into(),
            token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(AppendHeaders<[(axum::http::HeaderName, String); 1]>, Json<AuthResponse>), ApiError> {
    let (Some(username), Some(password)) = (payload.username, payload.password) else {
        return Err(ApiError::Validation("All fields are required".into()));
    };
    let username = username.trim().to_lowercase();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::Validation("All fields are required".into()));
    }

    let user = User::verify_credentials(&state.db, &username, &password).await?;
    let (token, cookie) = open_session(&state, user.id).await?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(AuthResponse {
            user: user.into(),
            token,
        }),
    ))
}

#[instrument(skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(AppendHeaders<[(axum::http::HeaderName, String); 1]>, Json<MessageResponse>), ApiError>
{
    // The session is destroyed off the cookie itself, not the resolved
    // context: a browser that also sends a bearer token authenticates via
    // the token path, but its cookie-carried session must still die here.
    // Bearer-only clients have nothing to destroy; the token is dropped
    // client-side and expires on its own.
    let cookie = SessionCookie::from_ref(&state);
    if let Some(session_id) = cookie.extract(&headers) {
        state.sessions.destroy(&session_id).await?;
        info!("session destroyed");
    }

    Ok((
        AppendHeaders([(SET_COOKIE, cookie.clear_value())]),
        Json(MessageResponse {
            message: "Logged out successfully".into(),
        }),
    ))
}

/// The `authUser` query: returns the context user, or `null` for an
/// anonymous request. Never an error at this layer.
#[instrument(skip(ctx))]
pub async fn auth_user(ctx: RequestContext) -> Json<Option<PublicUser>> {
    Json(ctx.user.map(PublicUser::from))
}

#[instrument(skip(state))]
pub async fn user_by_id(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn username_pattern_accepts_reasonable_names() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("bob_42"));
        assert!(!is_valid_username("al"));
        assert!(!is_valid_username("Alice"));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username(""));
    }

    #[tokio::test]
    async fn logout_destroys_session_even_when_bearer_wins() {
        // A browser sends the cookie automatically alongside the bearer
        // token. The token path resolves the request, but logout must still
        // kill the server-side session or the cookie stays replayable.
        let state = AppState::fake();
        let user_id = Uuid::new_v4();

        let session = SessionRecord::new(user_id, state.config.cookie.ttl);
        state.sessions.save(&session).await.unwrap();

        let codec = TokenCodec::from_ref(&state);
        let token = codec.issue(user_id).unwrap();
        let cookie = SessionCookie::from_ref(&state);
        let cookie_pair = cookie
            .set_value(&session.id)
            .split(';')
            .next()
            .unwrap()
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_str(&cookie_pair).unwrap(),
        );

        let (AppendHeaders([(_, set_cookie)]), Json(body)) =
            logout(State(state.clone()), headers).await.unwrap();

        assert!(state.sessions.load(&session.id).await.unwrap().is_none());
        assert!(set_cookie.contains("sid=deleted"));
        assert_eq!(body.message, "Logged out successfully");
    }

    #[tokio::test]
    async fn logout_without_credentials_still_succeeds() {
        let state = AppState::fake();
        let (_, Json(body)) = logout(State(state), HeaderMap::new()).await.unwrap();
        assert_eq!(body.message, "Logged out successfully");
    }

    #[tokio::test]
    async fn signup_with_missing_fields_is_a_validation_error() {
        let state = AppState::fake();
        let payload = SignUpRequest {
            username: Some("alice".into()),
            ..Default::default()
        };
        let err = sign_up(State(state), Json(payload)).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(msg) if msg == "All fields are required"
        ));
    }

    #[tokio::test]
    async fn login_with_missing_fields_is_a_validation_error() {
        let state = AppState::fake();
        let payload = LoginRequest {
            username: Some("alice".into()),
            password: None,
        };
        let err = login(State(state), Json(payload)).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(msg) if msg == "All fields are required"
        ));
    }
}
