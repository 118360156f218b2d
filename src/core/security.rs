use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core::config::Settings;

const ANTI_FORGERY_CONTEXT: &str = "exam-engine:anti-forgery:v2";

#[derive(Debug, Error)]
pub(crate) enum SecurityError {
    #[error("jwt decoding failed")]
    JwtDecoding,
    #[error("unsupported jwt algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("anti-forgery token mismatch")]
    AntiForgeryMismatch,
}

/// Claims of bearer tokens minted by the identity service.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    pub(crate) exp: i64,
    /// Session id, when the issuer sets one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) sid: Option<String>,
}

/// Identifies the bearer session: the issuer's `sid` claim, or a digest of the
/// token itself when the issuer sets none.
pub(crate) fn session_id(token: &str, claims: &Claims) -> String {
    match claims.sid.as_deref().map(str::trim) {
        Some(sid) if !sid.is_empty() => sid.to_string(),
        _ => hex::encode(Sha256::digest(token.as_bytes())),
    }
}

pub(crate) fn verify_token(token: &str, settings: &Settings) -> Result<Claims, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = true;
    validation.required_spec_claims.insert("exp".to_string());
    validation.required_spec_claims.insert("sub".to_string());

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.security().secret_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| SecurityError::JwtDecoding)
}

/// Token the client must echo on every mutating request of one bearer session.
pub(crate) fn anti_forgery_token(user_id: &str, session_id: &str, settings: &Settings) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ANTI_FORGERY_CONTEXT.as_bytes());
    hasher.update([0u8]);
    hasher.update(settings.security().secret_key.as_bytes());
    hasher.update([0u8]);
    hasher.update(user_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(session_id.as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn verify_anti_forgery_token(
    presented: &str,
    user_id: &str,
    session_id: &str,
    settings: &Settings,
) -> Result<(), SecurityError> {
    let expected = anti_forgery_token(user_id, session_id, settings);
    if constant_time_eq(presented.trim().as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(SecurityError::AntiForgeryMismatch)
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

fn algorithm_from_settings(settings: &Settings) -> Result<Algorithm, SecurityError> {
    match settings.security().algorithm.as_str() {
        "HS256" => Ok(Algorithm::HS256),
        other => Err(SecurityError::UnsupportedAlgorithm(other.to_string())),
    }
}

/// Mints a bearer token the way the identity service does; tests only.
#[cfg(test)]
pub(crate) fn create_access_token(
    subject: &str,
    settings: &Settings,
    expires_in: time::Duration,
) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: subject.to_string(),
        exp: (time::OffsetDateTime::now_utc() + expires_in).unix_timestamp(),
        sid: Some(uuid::Uuid::new_v4().to_string()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(settings.security().secret_key.as_bytes()),
    )
    .expect("encode token")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn jwt_encode_decode_roundtrip() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");

        let token = create_access_token("student-123", &settings, time::Duration::minutes(1));
        let claims = verify_token(&token, &settings).expect("claims");

        assert_eq!(claims.sub, "student-123");
    }

    #[tokio::test]
    async fn expired_jwt_is_rejected() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");

        let token = create_access_token("student-123", &settings, time::Duration::minutes(-10));
        assert!(verify_token(&token, &settings).is_err());
    }

    #[tokio::test]
    async fn anti_forgery_token_is_bound_to_user_and_session() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");

        let token = anti_forgery_token("student-a", "session-1", &settings);
        assert_eq!(token.len(), 64);
        assert!(verify_anti_forgery_token(&token, "student-a", "session-1", &settings).is_ok());
        assert!(verify_anti_forgery_token(&format!(" {token} "), "student-a", "session-1", &settings)
            .is_ok());
        assert!(verify_anti_forgery_token(&token, "student-b", "session-1", &settings).is_err());
        assert!(verify_anti_forgery_token(&token, "student-a", "session-2", &settings).is_err());
        assert!(verify_anti_forgery_token("", "student-a", "session-1", &settings).is_err());
    }

    #[tokio::test]
    async fn fresh_bearer_tokens_are_distinct_sessions() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");

        let first = create_access_token("student-a", &settings, time::Duration::minutes(5));
        let second = create_access_token("student-a", &settings, time::Duration::minutes(5));
        let first_session = session_id(&first, &verify_token(&first, &settings).expect("claims"));
        let second_session =
            session_id(&second, &verify_token(&second, &settings).expect("claims"));

        assert_ne!(first_session, second_session);
    }

    #[test]
    fn session_id_falls_back_to_token_digest() {
        let claims = Claims { sub: "student-a".to_string(), exp: 0, sid: None };
        let blank = Claims { sub: "student-a".to_string(), exp: 0, sid: Some("  ".to_string()) };
        let issued = Claims { sub: "student-a".to_string(), exp: 0, sid: Some("s-1".to_string()) };

        assert_eq!(session_id("token-a", &claims).len(), 64);
        assert_ne!(session_id("token-a", &claims), session_id("token-b", &claims));
        assert_eq!(session_id("token-a", &blank), session_id("token-a", &claims));
        assert_eq!(session_id("token-a", &issued), "s-1");
    }

    #[test]
    fn constant_time_eq_matches_plain_equality() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
