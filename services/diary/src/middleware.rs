//! Session gate
//!
//! Runs ahead of `/`, `/login` and `/signup`. Signed-out requests for the
//! diary go to the sign-in page, signed-in requests for the sign-in or
//! sign-up pages go to the diary. The gate does its own provider lookup on
//! every request and fails open: missing configuration or a failed lookup
//! lets the request through and is only logged. A session renewed through
//! its refresh token is handed on to the route and set on the response.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use crate::{
    session::{SessionLookup, forward_session, resolve_session, store_session},
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RedirectToLogin,
    RedirectToDiary,
}

pub fn decide(path: &str, signed_in: bool) -> GateDecision {
    match (path, signed_in) {
        ("/", false) => GateDecision::RedirectToLogin,
        ("/login" | "/signup", true) => GateDecision::RedirectToDiary,
        _ => GateDecision::Allow,
    }
}

pub async fn session_gate(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let provider = match state.backend.provider() {
        Ok(provider) => provider.clone(),
        Err(e) => {
            warn!("Session gate skipped: {}", e);
            return next.run(req).await;
        }
    };

    let jar = CookieJar::from_headers(req.headers());
    let lookup = match resolve_session(&provider, &jar).await {
        Ok(lookup) => lookup,
        Err(e) => {
            warn!("Session check failed, letting request through: {}", e);
            return next.run(req).await;
        }
    };

    let mut req = req;
    if let SessionLookup::Refreshed(session) = &lookup {
        forward_session(req.headers_mut(), session);
    }

    let response = match decide(req.uri().path(), lookup.is_signed_in()) {
        GateDecision::Allow => next.run(req).await,
        GateDecision::RedirectToLogin => Redirect::to("/login").into_response(),
        GateDecision::RedirectToDiary => Redirect::to("/").into_response(),
    };

    match lookup {
        SessionLookup::Refreshed(session) => {
            let jar = store_session(CookieJar::new(), &session, state.server.secure_cookies);
            (jar, response).into_response()
        }
        _ => response,
    }
}
