use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

/// Single opaque failure for malformed, forged and expired tokens alike;
/// callers (and clients) never learn which one it was.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid token")]
pub struct InvalidToken;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    iat: usize,
    exp: usize,
}

/// Stateless bearer-token codec. A token's validity is fully determined by
/// its signature and expiry; there is no server-side record and no
/// revocation. Tokens issued before a password change stay valid until they
/// expire — accepted limitation.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Sign a token for `user_id` with the expiry fixed at issuance.
    pub fn issue(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + self.ttl;
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "token issued");
        Ok(token)
    }

    /// Verify signature and expiry, returning the encoded user id. Zero
    /// leeway: the TTL window is strict.
    pub fn verify(&self, token: &str) -> Result<Uuid, InvalidToken> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data =
            decode::<Claims>(token, &self.decoding, &validation).map_err(|_| InvalidToken)?;
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new("test-secret", Duration::days(7))
    }

    #[test]
    fn issue_then_verify_roundtrip() {
        let codec = codec();
        let user_id = Uuid::new_v4();
        let token = codec.issue(user_id).expect("issue");
        assert_eq!(codec.verify(&token), Ok(user_id));
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = TokenCodec::new("test-secret", Duration::seconds(-10));
        let token = codec.issue(Uuid::new_v4()).expect("issue");
        assert_eq!(codec.verify(&token), Err(InvalidToken));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let codec = codec();
        let token = codec.issue(Uuid::new_v4()).expect("issue");
        let mut tampered = token.clone();
        let last = tampered.pop().expect("token is non-empty");
        tampered.push(if last == 'A' { 'B' } else { 'A' });
        assert_eq!(codec.verify(&tampered), Err(InvalidToken));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let ours = codec();
        let theirs = TokenCodec::new("other-secret", Duration::days(7));
        let token = theirs.issue(Uuid::new_v4()).expect("issue");
        assert_eq!(ours.verify(&token), Err(InvalidToken));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(codec().verify("not.a.token"), Err(InvalidToken));
    }
}
