use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{config::TokenConfig, state::AppState};

/// Token type: a session token proves an authenticated login, a reset
/// token proves email ownership for password recovery. Neither is ever
/// accepted in place of the other.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Session,
    Reset,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,        // user ID
    pub exp: usize,      // expiration time
    pub iat: usize,      // issued at
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub kind: TokenKind, // session or reset
}

/// Holds signing and verification keys with config data.
#[derive(Clone)]
pub struct TokenKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub session_ttl: Duration,
    pub remember_ttl: Duration,
    pub reset_ttl: Duration,
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        let TokenConfig {
            secret,
            issuer,
            audience,
            session_ttl_minutes,
            remember_ttl_minutes,
            reset_ttl_minutes,
        } = state.config.token.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            session_ttl: Duration::from_secs((session_ttl_minutes as u64) * 60),
            remember_ttl: Duration::from_secs((remember_ttl_minutes as u64) * 60),
            reset_ttl: Duration::from_secs((reset_ttl_minutes as u64) * 60),
        }
    }
}

impl TokenKeys {
    fn sign_with_kind(&self, user_id: i64, kind: TokenKind, ttl: Duration) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id, kind = ?kind, "token signed");
        Ok(token)
    }

    /// Issue a session token; `remember` selects the long-lived TTL.
    pub fn issue_session(&self, user_id: i64, remember: bool) -> anyhow::Result<String> {
        let ttl = if remember {
            self.remember_ttl
        } else {
            self.session_ttl
        };
        self.sign_with_kind(user_id, TokenKind::Session, ttl)
    }

    pub fn issue_reset(&self, user_id: i64) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, TokenKind::Reset, self.reset_ttl)
    }

    /// Check signature, issuer, audience and expiry.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = data.claims.sub, kind = ?data.claims.kind, "token verified");
        Ok(data.claims)
    }

    pub fn verify_session(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Session {
            anyhow::bail!("not a session token");
        }
        Ok(claims)
    }

    pub fn verify_reset(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Reset {
            anyhow::bail!("not a reset token");
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> TokenKeys {
        let state = AppState::fake();
        TokenKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn session_token_roundtrips_user_id() {
        let keys = make_keys();
        let token = keys.issue_session(7, false).expect("issue session");
        let claims = keys.verify_session(&token).expect("verify session");
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Session);
    }

    #[tokio::test]
    async fn session_token_is_rejected_as_reset() {
        let keys = make_keys();
        let token = keys.issue_session(7, false).expect("issue session");
        let err = keys.verify_reset(&token).unwrap_err();
        assert!(err.to_string().contains("not a reset token"));
    }

    #[tokio::test]
    async fn reset_token_is_rejected_as_session() {
        let keys = make_keys();
        let token = keys.issue_reset(7).expect("issue reset");
        assert_eq!(keys.verify_reset(&token).expect("verify reset").sub, 7);
        let err = keys.verify_session(&token).unwrap_err();
        assert!(err.to_string().contains("not a session token"));
    }

    #[tokio::test]
    async fn remember_me_extends_expiry() {
        let keys = make_keys();
        let short = keys.issue_session(1, false).expect("short session");
        let long = keys.issue_session(1, true).expect("long session");
        let short_exp = keys.verify(&short).unwrap().exp;
        let long_exp = keys.verify(&long).unwrap().exp;
        assert!(long_exp > short_exp);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let keys = make_keys();
        let past = OffsetDateTime::now_utc() - TimeDuration::hours(2);
        let claims = Claims {
            sub: 1,
            iat: past.unix_timestamp() as usize,
            exp: (past + TimeDuration::minutes(5)).unix_timestamp() as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
            kind: TokenKind::Session,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).expect("encode");
        assert!(keys.verify(&token).is_err());
    }

    #[tokio::test]
    async fn tampered_token_is_rejected() {
        let keys = make_keys();
        let token = keys.issue_session(7, false).expect("issue session");
        let mut tampered = token.into_bytes();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(keys.verify(&tampered).is_err());
    }
}
