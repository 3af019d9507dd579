use axum::http::HeaderMap;
use time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::session::{SessionCookie, SessionRecord, SessionStore};
use crate::auth::token::TokenCodec;

/// Why a presented credential was refused. Downstream the result is the same
/// as no credential at all; the distinction only feeds logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(Uuid),
    Unauthenticated,
    Rejected(RejectReason),
}

impl AuthOutcome {
    pub fn principal(&self) -> Option<Uuid> {
        match self {
            AuthOutcome::Authenticated(id) => Some(*id),
            _ => None,
        }
    }
}

/// Result of running the strategy chain for one request.
#[derive(Debug)]
pub struct Resolution {
    pub outcome: AuthOutcome,
    /// Present only when the session path authenticated the request; carried
    /// so logout can destroy the right record.
    pub session: Option<SessionRecord>,
}

impl Resolution {
    fn anonymous() -> Self {
        Self {
            outcome: AuthOutcome::Unauthenticated,
            session: None,
        }
    }
}

/// Resolve the principal for a request. Bearer token is checked first, the
/// session cookie is the fallback; the two strategies never combine. A
/// failed bearer verification rejects without falling through to the
/// session, a missing or dead session just reads as anonymous. Store errors
/// degrade to anonymous rather than failing the request.
pub async fn resolve_principal(
    headers: &HeaderMap,
    codec: &TokenCodec,
    cookie: &SessionCookie,
    sessions: &dyn SessionStore,
    session_ttl: Duration,
) -> Resolution {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if let Some(token) = bearer {
        return match codec.verify(token) {
            Ok(user_id) => {
                debug!(user_id = %user_id, "bearer token accepted");
                Resolution {
                    outcome: AuthOutcome::Authenticated(user_id),
                    session: None,
                }
            }
            Err(_) => {
                debug!("bearer token rejected");
                Resolution {
                    outcome: AuthOutcome::Rejected(RejectReason::InvalidToken),
                    session: None,
                }
            }
        };
    }

    let Some(session_id) = cookie.extract(headers) else {
        return Resolution::anonymous();
    };

    let mut session = match sessions.load(&session_id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            debug!("session cookie references no live session");
            return Resolution::anonymous();
        }
        Err(e) => {
            warn!(error = %e, "session store unavailable, treating request as anonymous");
            return Resolution::anonymous();
        }
    };

    // Sliding TTL: every authenticated session-path request re-saves the
    // record with a fresh expiry, confirmed before the request proceeds.
    session.renew(session_ttl);
    if let Err(e) = sessions.save(&session).await {
        warn!(error = %e, "session save failed, treating request as anonymous");
        return Resolution::anonymous();
    }

    debug!(user_id = %session.user_id, "session accepted");
    Resolution {
        outcome: AuthOutcome::Authenticated(session.user_id),
        session: Some(session),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::MemorySessionStore;
    use crate::config::{SameSite, SessionCookieConfig};
    use axum::http::HeaderValue;

    fn codec() -> TokenCodec {
        TokenCodec::new("test-jwt-secret", Duration::days(7))
    }

    fn cookie() -> SessionCookie {
        SessionCookie::new(
            "test-session-secret".into(),
            SessionCookieConfig {
                secure: false,
                same_site: SameSite::Lax,
                ttl: Duration::days(7),
            },
        )
    }

    fn bearer_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    fn cookie_headers(cookie: &SessionCookie, session_id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let set_value = cookie.set_value(session_id);
        let pair = set_value.split(';').next().unwrap();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_str(pair).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn no_credentials_is_unauthenticated() {
        let store = MemorySessionStore::default();
        let res = resolve_principal(
            &HeaderMap::new(),
            &codec(),
            &cookie(),
            &store,
            Duration::days(7),
        )
        .await;
        assert_eq!(res.outcome, AuthOutcome::Unauthenticated);
        assert!(res.session.is_none());
    }

    #[tokio::test]
    async fn valid_bearer_token_authenticates() {
        let store = MemorySessionStore::default();
        let codec = codec();
        let user_id = Uuid::new_v4();
        let token = codec.issue(user_id).unwrap();
        let res = resolve_principal(
            &bearer_headers(&token),
            &codec,
            &cookie(),
            &store,
            Duration::days(7),
        )
        .await;
        assert_eq!(res.outcome, AuthOutcome::Authenticated(user_id));
        assert!(res.session.is_none());
    }

    #[tokio::test]
    async fn bad_bearer_token_is_rejected_not_errored() {
        let store = MemorySessionStore::default();
        let res = resolve_principal(
            &bearer_headers("garbage"),
            &codec(),
            &cookie(),
            &store,
            Duration::days(7),
        )
        .await;
        assert_eq!(
            res.outcome,
            AuthOutcome::Rejected(RejectReason::InvalidToken)
        );
        assert_eq!(res.outcome.principal(), None);
    }

    #[tokio::test]
    async fn valid_session_cookie_authenticates_and_slides_expiry() {
        let store = MemorySessionStore::default();
        let cookie = cookie();
        let user_id = Uuid::new_v4();
        let session = SessionRecord::new(user_id, Duration::minutes(5));
        store.save(&session).await.unwrap();
        let old_expiry = session.expires_at;

        let res = resolve_principal(
            &cookie_headers(&cookie, &session.id),
            &codec(),
            &cookie,
            &store,
            Duration::days(7),
        )
        .await;
        assert_eq!(res.outcome, AuthOutcome::Authenticated(user_id));

        let touched = store.load(&session.id).await.unwrap().unwrap();
        assert!(touched.expires_at > old_expiry);
    }

    #[tokio::test]
    async fn expired_session_is_unauthenticated() {
        let store = MemorySessionStore::default();
        let cookie = cookie();
        let session = SessionRecord::new(Uuid::new_v4(), Duration::seconds(-1));
        store.save(&session).await.unwrap();

        let res = resolve_principal(
            &cookie_headers(&cookie, &session.id),
            &codec(),
            &cookie,
            &store,
            Duration::days(7),
        )
        .await;
        assert_eq!(res.outcome, AuthOutcome::Unauthenticated);
    }

    #[tokio::test]
    async fn unknown_session_id_is_unauthenticated() {
        let store = MemorySessionStore::default();
        let cookie = cookie();
        let res = resolve_principal(
            &cookie_headers(&cookie, "deadbeef"),
            &codec(),
            &cookie,
            &store,
            Duration::days(7),
        )
        .await;
        assert_eq!(res.outcome, AuthOutcome::Unauthenticated);
    }

    #[tokio::test]
    async fn bearer_failure_does_not_fall_through_to_session() {
        let store = MemorySessionStore::default();
        let cookie = cookie();
        let session = SessionRecord::new(Uuid::new_v4(), Duration::days(7));
        store.save(&session).await.unwrap();

        let mut headers = cookie_headers(&cookie, &session.id);
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer garbage"),
        );

        let res = resolve_principal(&headers, &codec(), &cookie, &store, Duration::days(7)).await;
        assert_eq!(
            res.outcome,
            AuthOutcome::Rejected(RejectReason::InvalidToken)
        );
    }
}
