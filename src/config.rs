use anyhow::Context;
use serde::Deserialize;
use time::Duration;

pub const SESSION_COOKIE_NAME: &str = "sid";

/// `SameSite` attribute for the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes applied to the session cookie. `HttpOnly` is not configurable;
/// the cookie is never readable from script.
#[derive(Debug, Clone)]
pub struct SessionCookieConfig {
    pub secure: bool,
    pub same_site: SameSite,
    pub ttl: Duration,
}

impl SessionCookieConfig {
    /// Browsers only deliver `SameSite=None` cookies over TLS. An insecure
    /// cross-site cookie silently breaks authentication in a cross-origin
    /// deployment, so the combination is rejected at startup instead of
    /// being discovered at runtime.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.same_site == SameSite::None && !self.secure {
            anyhow::bail!("session cookie: SameSite=None requires secure=true");
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub session_secret: String,
    pub token_ttl: Duration,
    pub cookie: SessionCookieConfig,
    pub allowed_origins: Vec<String>,
    pub production: bool,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let session_secret =
            std::env::var("SESSION_SECRET").context("SESSION_SECRET must be set")?;

        let production = std::env::var("APP_ENV")
            .map(|v| v == "production")
            .unwrap_or(false);

        let token_ttl_days = env_i64("JWT_TTL_DAYS").unwrap_or(7);
        let session_ttl_days = env_i64("SESSION_TTL_DAYS").unwrap_or(7);

        // The production frontend is served from another origin, so the
        // session cookie has to travel cross-site there. Local dev stays lax.
        let cookie = SessionCookieConfig {
            secure: production,
            same_site: if production {
                SameSite::None
            } else {
                SameSite::Lax
            },
            ttl: Duration::days(session_ttl_days),
        };
        cookie.validate()?;

        let allowed_origins = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            database_url,
            jwt_secret,
            session_secret,
            token_ttl: Duration::days(token_ttl_days),
            cookie,
            allowed_origins,
            production,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("APP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(5000),
        })
    }
}

fn env_i64(name: &str) -> Option<i64> {
    std::env::var(name).ok().and_then(|v| v.parse::<i64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_site_cookie_requires_secure() {
        let cookie = SessionCookieConfig {
            secure: false,
            same_site: SameSite::None,
            ttl: Duration::days(7),
        };
        let err = cookie.validate().unwrap_err();
        assert!(err.to_string().contains("SameSite=None"));
    }

    #[test]
    fn secure_cross_site_cookie_is_accepted() {
        let cookie = SessionCookieConfig {
            secure: true,
            same_site: SameSite::None,
            ttl: Duration::days(7),
        };
        assert!(cookie.validate().is_ok());
    }

    #[test]
    fn lax_insecure_cookie_is_accepted() {
        let cookie = SessionCookieConfig {
            secure: false,
            same_site: SameSite::Lax,
            ttl: Duration::days(7),
        };
        assert!(cookie.validate().is_ok());
    }
}
