//! Admin session tokens look like `sbs_` followed by 32 hex characters. The
//! database keeps an argon2 hash and a short clear-text lookup prefix, never
//! the token itself.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use sb_common::error::{AppError, AppResult};
use uuid::Uuid;

pub const TOKEN_SCHEME: &str = "sbs_";
/// Leading characters of a token stored in clear to find its session row.
pub const LOOKUP_PREFIX_LEN: usize = 12;
pub const SESSION_TTL_HOURS: i64 = 24;

const TOKEN_BODY_LEN: usize = 32;

/// A session about to be stored. `token` is handed to the caller once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub token: String,
    pub lookup_prefix: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

pub fn new_session(now: DateTime<Utc>) -> AppResult<NewSession> {
    let token = format!("{TOKEN_SCHEME}{}", Uuid::new_v4().simple());
    let salt = SaltString::generate(&mut OsRng);
    let token_hash = Argon2::default()
        .hash_password(token.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to hash session token");
            AppError::Internal
        })?
        .to_string();

    Ok(NewSession {
        lookup_prefix: token[..LOOKUP_PREFIX_LEN].to_string(),
        token_hash,
        expires_at: now + Duration::hours(SESSION_TTL_HOURS),
        token,
    })
}

/// A bearer value with the session token shape.
#[derive(Debug, Clone, Copy)]
pub struct SessionToken<'a> {
    raw: &'a str,
}

impl<'a> SessionToken<'a> {
    pub fn parse(raw: &'a str) -> Option<Self> {
        let body = raw.strip_prefix(TOKEN_SCHEME)?;
        let well_formed =
            body.len() == TOKEN_BODY_LEN && body.bytes().all(|b| b.is_ascii_hexdigit());
        well_formed.then_some(Self { raw })
    }

    pub fn lookup_prefix(&self) -> &'a str {
        &self.raw[..LOOKUP_PREFIX_LEN]
    }

    pub fn matches(&self, stored_hash: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|e| AppError::External(format!("invalid stored session hash: {e}")))?;
        Ok(Argon2::default()
            .verify_password(self.raw.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{new_session, SessionToken};

    #[test]
    fn new_session_token_parses_back_to_its_row() {
        let now = Utc::now();
        let session = new_session(now).expect("session");

        let token = SessionToken::parse(&session.token).expect("well formed");
        assert_eq!(token.lookup_prefix(), session.lookup_prefix);
        assert!(token.matches(&session.token_hash).expect("verify"));
        assert!(!session.token_hash.contains(&session.token));
        assert_eq!(session.expires_at - now, Duration::hours(24));
    }

    #[test]
    fn another_sessions_hash_does_not_match() {
        let mine = new_session(Utc::now()).expect("session");
        let theirs = new_session(Utc::now()).expect("session");

        let token = SessionToken::parse(&mine.token).expect("well formed");
        assert!(!token.matches(&theirs.token_hash).expect("verify"));
        assert!(token.matches("not-a-hash").is_err());
    }

    #[test]
    fn only_scheme_and_hex_body_parse() {
        let hex = "0123456789abcdef0123456789abcdef";
        assert!(SessionToken::parse(&format!("sbs_{hex}")).is_some());
        assert!(SessionToken::parse(hex).is_none());
        assert!(SessionToken::parse("sbs_000000000000000000").is_none());
        assert!(SessionToken::parse(&format!("sbs_{}", "z".repeat(32))).is_none());
        assert!(SessionToken::parse("Basic abcdefghijkl").is_none());
    }
}
