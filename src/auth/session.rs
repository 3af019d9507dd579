use std::collections::HashMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::{SessionCookieConfig, SESSION_COOKIE_NAME};

type HmacSha256 = Hmac<Sha256>;

/// Server-side session row. The id is opaque and only ever travels inside
/// the signed cookie.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl SessionRecord {
    pub fn new(user_id: Uuid, ttl: Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: new_session_id(),
            user_id,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc()
    }

    /// Slide the expiry forward; persisted by the caller on every
    /// authenticated session-path request.
    pub fn renew(&mut self, ttl: Duration) {
        self.expires_at = OffsetDateTime::now_utc() + ttl;
    }
}

fn new_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut s, "{:02x}", b);
    }
    s
}

/// Pluggable persistence for sessions. The store is the serialization point
/// for concurrent access; `save` is an upsert with synchronous confirmation.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> anyhow::Result<Option<SessionRecord>>;
    async fn save(&self, session: &SessionRecord) -> anyhow::Result<()>;
    async fn destroy(&self, session_id: &str) -> anyhow::Result<()>;
    async fn purge_expired(&self) -> anyhow::Result<u64>;
}

/// Postgres-backed store, rows in the `sessions` table.
pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, session_id: &str) -> anyhow::Result<Option<SessionRecord>> {
        let session = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT id, user_id, expires_at, created_at
            FROM sessions
            WHERE id = $1 AND expires_at > now()
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(session)
    }

    async fn save(&self, session: &SessionRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

/// In-memory store for tests and `AppState::fake()`.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> anyhow::Result<Option<SessionRecord>> {
        let map = self.sessions.read().await;
        Ok(map
            .get(session_id)
            .filter(|s| !s.is_expired())
            .cloned())
    }

    async fn save(&self, session: &SessionRecord) -> anyhow::Result<()> {
        let mut map = self.sessions.write().await;
        map.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> anyhow::Result<()> {
        let mut map = self.sessions.write().await;
        map.remove(session_id);
        Ok(())
    }

    async fn purge_expired(&self) -> anyhow::Result<u64> {
        let mut map = self.sessions.write().await;
        let before = map.len();
        map.retain(|_, s| !s.is_expired());
        Ok((before - map.len()) as u64)
    }
}

/// Builds and reads the `sid` cookie. The value is `<id>.<hmac(id)>` keyed
/// by the session secret, so a tampered or forged cookie is dropped before
/// the store is ever consulted.
#[derive(Clone)]
pub struct SessionCookie {
    secret: String,
    config: SessionCookieConfig,
}

impl SessionCookie {
    pub fn new(secret: String, config: SessionCookieConfig) -> Self {
        Self { secret, config }
    }

    fn mac(&self, session_id: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(session_id.as_bytes());
        mac
    }

    fn sign(&self, session_id: &str) -> String {
        let tag = self.mac(session_id).finalize().into_bytes();
        format!("{}.{}", session_id, hex_encode(&tag))
    }

    /// `Set-Cookie` value establishing the session, attributes per config.
    pub fn set_value(&self, session_id: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}",
            SESSION_COOKIE_NAME,
            self.sign(session_id),
            self.config.same_site.as_str(),
            self.config.ttl.whole_seconds(),
        );
        if self.config.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value clearing the session on logout.
    pub fn clear_value(&self) -> String {
        let mut cookie = format!(
            "{}=deleted; Path=/; HttpOnly; SameSite={}; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            SESSION_COOKIE_NAME,
            self.config.same_site.as_str(),
        );
        if self.config.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Pull the session id out of the request, verifying the signature with
    /// a constant-time comparison. Absent, malformed and forged cookies all
    /// read as "no session".
    pub fn extract(&self, headers: &HeaderMap) -> Option<String> {
        let raw = parse_cookie(headers, SESSION_COOKIE_NAME)?;
        let (session_id, tag_hex) = raw.split_once('.')?;
        let tag = hex_decode(tag_hex)?;
        self.mac(session_id).verify_slice(&tag).ok()?;
        Some(session_id.to_string())
    }
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get(axum::http::header::COOKIE)?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some((k, v)) = p.split_once('=') {
            if k == name {
                return Some(v.to_string());
            }
        }
    }
    None
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
