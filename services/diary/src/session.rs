//! Session cookies
//!
//! The session itself lives with the identity provider; the service only
//! carries its tokens in two cookies and asks the provider who they
//! belong to. An expired access token is exchanged for a new pair through
//! the refresh token.

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, header};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use common::{IdentityProvider, ProviderResult, Session};
use tracing::{info, warn};

pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";

pub fn access_token(jar: &CookieJar) -> Option<String> {
    jar.get(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Outcome of looking up the session behind the request's cookies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
    SignedOut,
    Active(Session),
    /// The access token had expired and was exchanged for a new pair
    Refreshed(Session),
}

impl SessionLookup {
    pub fn is_signed_in(&self) -> bool {
        !matches!(self, SessionLookup::SignedOut)
    }
}

fn refresh_token(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Ask the provider for the user behind the request's access token,
/// falling back to the refresh token once the access token is rejected
pub async fn resolve_session(
    provider: &Arc<dyn IdentityProvider>,
    jar: &CookieJar,
) -> ProviderResult<SessionLookup> {
    let refresh_token = refresh_token(jar);

    if let Some(access_token) = access_token(jar) {
        if let Some(user) = provider.get_current_user(&access_token).await? {
            return Ok(SessionLookup::Active(Session {
                access_token,
                refresh_token,
                user,
            }));
        }
    }

    let Some(refresh_token) = refresh_token else {
        return Ok(SessionLookup::SignedOut);
    };

    match provider.refresh_session(&refresh_token).await? {
        Some(session) => {
            info!("Refreshed expired session for user {}", session.user_id());
            Ok(SessionLookup::Refreshed(session))
        }
        None => Ok(SessionLookup::SignedOut),
    }
}

/// Session for a handler; rotated tokens are written back to the jar
pub async fn current_session(
    provider: &Arc<dyn IdentityProvider>,
    jar: CookieJar,
    secure: bool,
) -> ProviderResult<(CookieJar, Option<Session>)> {
    match resolve_session(provider, &jar).await? {
        SessionLookup::Active(session) => Ok((jar, Some(session))),
        SessionLookup::Refreshed(session) => {
            let jar = store_session(jar, &session, secure);
            Ok((jar, Some(session)))
        }
        SessionLookup::SignedOut => Ok((jar, None)),
    }
}

/// Rewrite the request's `Cookie` header to carry `session`'s tokens
pub fn forward_session(headers: &mut HeaderMap, session: &Session) {
    let jar = store_session(CookieJar::from_headers(headers), session, false);
    let cookies = jar
        .iter()
        .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
        .collect::<Vec<_>>()
        .join("; ");

    match HeaderValue::from_str(&cookies) {
        Ok(value) => {
            headers.insert(header::COOKIE, value);
        }
        Err(e) => warn!("Could not forward refreshed session cookies: {}", e),
    }
}

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

pub fn store_session(jar: CookieJar, session: &Session, secure: bool) -> CookieJar {
    let jar = jar.add(session_cookie(
        ACCESS_TOKEN_COOKIE,
        session.access_token.clone(),
        secure,
    ));
    match &session.refresh_token {
        Some(token) => jar.add(session_cookie(REFRESH_TOKEN_COOKIE, token.clone(), secure)),
        None => jar,
    }
}

pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_TOKEN_COOKIE).path("/"))
}
