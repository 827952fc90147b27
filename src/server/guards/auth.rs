use crate::db::{DbUser, UserRole};
use crate::error::CimsError;
use crate::server::router::CimsState;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, Key, PrivateCookieJar, SameSite};
use chrono::Utc;
use tracing::debug;

pub const SESSION_COOKIE: &str = "token";

/// Decrypted content of the session cookie: `"<user_id>:<issued_unix>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub issued_at: i64,
}

impl Session {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            issued_at: Utc::now().timestamp(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}:{}", self.user_id, self.issued_at)
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let (user_id, issued_at) = raw.split_once(':')?;
        Some(Self {
            user_id: user_id.parse().ok()?,
            issued_at: issued_at.parse().ok()?,
        })
    }

    pub fn is_expired(&self, ttl_hours: i64) -> bool {
        Utc::now().timestamp() - self.issued_at > ttl_hours.saturating_mul(3600)
    }
}

pub fn session_cookie(session: Session, ttl_hours: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.encode()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(ttl_hours))
        .build()
}

pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// The signed-in, active user.
///
/// 401 without a session cookie; 403 when the cookie cannot be decrypted, has
/// expired, or names a missing or inactive user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub DbUser);

impl FromRequestParts<CimsState> for CurrentUser {
    type Rejection = CimsError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &CimsState,
    ) -> Result<Self, Self::Rejection> {
        if CookieJar::from_headers(&parts.headers).get(SESSION_COOKIE).is_none() {
            return Err(CimsError::Unauthorized("Authentication required".to_string()));
        }

        let jar = PrivateCookieJar::from_headers(&parts.headers, Key::from_ref(state));
        let Some(session) = jar
            .get(SESSION_COOKIE)
            .and_then(|c| Session::decode(c.value()))
        else {
            return Err(CimsError::Forbidden("Invalid or expired token".to_string()));
        };

        if session.is_expired(state.cfg.basic.session_ttl_hours) {
            debug!(user_id = session.user_id, "Session expired");
            return Err(CimsError::Forbidden("Invalid or expired token".to_string()));
        }

        match state.db.find_user(session.user_id).await? {
            Some(user) if user.is_active => Ok(CurrentUser(user)),
            _ => Err(CimsError::Forbidden("User not found or inactive".to_string())),
        }
    }
}

/// [`CurrentUser`] with the admin role; 403 otherwise.
#[derive(Debug, Clone)]
pub struct AdminUser(pub DbUser);

impl FromRequestParts<CimsState> for AdminUser {
    type Rejection = CimsError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &CimsState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != UserRole::Admin {
            return Err(CimsError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_roundtrip_and_expiry() {
        let s = Session::new(42);
        assert_eq!(Session::decode(&s.encode()), Some(s));
        assert!(!s.is_expired(24));

        let old = Session {
            user_id: 42,
            issued_at: Utc::now().timestamp() - 25 * 3600,
        };
        assert!(old.is_expired(24));
    }

    #[test]
    fn malformed_sessions_are_rejected() {
        assert_eq!(Session::decode("nope"), None);
        assert_eq!(Session::decode("1:x"), None);
        assert_eq!(Session::decode(""), None);
    }
}
