//! Diary service routes

use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Local, NaiveDate};
use common::ProviderError;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    error::AppResult,
    middleware::session_gate,
    session::{access_token, clear_session, current_session, store_session},
    state::{AppState, Backend},
    validation::{validate_email, validate_password},
    view::{DiaryView, Notice},
};

/// Query parameters for the diary page
///
/// Kept as raw strings so a malformed value still renders the page.
#[derive(Debug, Default, Deserialize)]
pub struct DiaryQuery {
    pub date: Option<String>,
    pub edit: Option<String>,
    pub notice: Option<String>,
}

impl DiaryQuery {
    /// Requested date; `Ok(None)` when blank or absent
    fn date(&self) -> Result<Option<NaiveDate>, chrono::ParseError> {
        match self.date.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse().map(Some),
        }
    }

    fn edit(&self) -> bool {
        matches!(
            self.edit.as_deref().map(str::trim),
            Some("true" | "1" | "on" | "yes")
        )
    }
}

/// Query parameters for the sign-in page
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryAction {
    #[default]
    Save,
    Cancel,
}

/// Editor form submission
#[derive(Debug, Deserialize)]
pub struct EntryForm {
    pub date: NaiveDate,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub action: EntryAction,
}

/// Sign-in and sign-up form submission
#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
}

/// Create the router for the diary service
pub fn create_router(state: AppState) -> Router {
    let gated_routes = Router::new()
        .route("/", get(diary))
        .route("/login", get(login_page).post(login))
        .route("/signup", get(signup_page).post(signup))
        .route_layer(middleware::from_fn_with_state(state.clone(), session_gate));

    Router::new()
        .route("/health", get(health_check))
        .route("/entries", post(save_entry))
        .route("/logout", post(logout))
        .merge(gated_routes)
        .with_state(state)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn diary_url(date: NaiveDate) -> String {
    format!("/?date={date}")
}

/// Message shown to the user for a failed sign-in or sign-up
fn failure_message(err: &ProviderError, fallback: &str) -> String {
    match err {
        ProviderError::Backend(detail) if !detail.is_empty() => detail.clone(),
        _ => fallback.to_string(),
    }
}

fn setup_response(state: &AppState, err: &ProviderError) -> AppResult<Response> {
    Ok((StatusCode::SERVICE_UNAVAILABLE, state.pages.setup(err)?).into_response())
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "diary"
    }))
}

/// Diary page: configuration check, own session check, then the view
pub async fn diary(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<DiaryQuery>,
) -> AppResult<Response> {
    let (provider, entries) = match &state.backend {
        Backend::Ready { provider, entries } => (provider, entries),
        Backend::Unconfigured(err) => return setup_response(&state, err),
    };

    let secure = state.server.secure_cookies;
    let (jar, session) = match current_session(provider, jar, secure).await {
        Ok((jar, Some(session))) => (jar, session),
        Ok((_, None)) => return Ok(Redirect::to("/login").into_response()),
        Err(e) => {
            error!("Error checking session for diary page: {}", e);
            return Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                state.pages.error(&e.to_string())?,
            )
                .into_response());
        }
    };

    let mut view = DiaryView::new(today());
    match query.date() {
        Ok(Some(date)) => view.select_date(date),
        Ok(None) => {}
        Err(e) => {
            warn!("Ignoring invalid date {:?}: {}", query.date, e);
            view.notify(Notice::error("Error", "Invalid date, showing today instead"));
        }
    }
    if query.notice.as_deref() == Some("saved") {
        view.notify(Notice::success("Success", "Diary entry saved"));
    }

    view.load(entries, &session).await;
    if query.edit() {
        view.begin_edit();
    }

    let page = state.pages.diary(&view, session.user.email.as_deref())?;
    Ok((jar, page).into_response())
}

/// Save or cancel the editor for one date
pub async fn save_entry(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<EntryForm>,
) -> AppResult<Response> {
    let (provider, entries) = match &state.backend {
        Backend::Ready { provider, entries } => (provider, entries),
        Backend::Unconfigured(err) => return setup_response(&state, err),
    };

    let secure = state.server.secure_cookies;
    let (jar, session) = match current_session(provider, jar, secure).await {
        Ok((jar, Some(session))) => (jar, session),
        Ok((_, None)) => return Ok(Redirect::to("/login").into_response()),
        Err(e) => {
            error!("Error checking session before save: {}", e);
            return Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                state.pages.error(&e.to_string())?,
            )
                .into_response());
        }
    };

    // The upsert does its own lookup, so the editor opens without a load
    let mut view = DiaryView::editor(form.date);

    match form.action {
        EntryAction::Cancel => {
            view.cancel_edit();
            return Ok((jar, Redirect::to(&diary_url(form.date))).into_response());
        }
        EntryAction::Save => {
            if view.save(entries, &session, form.content).await {
                let target = format!("{}&notice=saved", diary_url(form.date));
                return Ok((jar, Redirect::to(&target)).into_response());
            }
        }
    }

    let page = state.pages.diary(&view, session.user.email.as_deref())?;
    Ok((jar, page).into_response())
}

/// Sign-in page
pub async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> AppResult<Response> {
    if let Err(err) = state.backend.provider() {
        return setup_response(&state, &err);
    }

    let notice = (query.notice.as_deref() == Some("check-email"))
        .then(|| Notice::success("Check your email", "We've sent you a confirmation link"));

    Ok(state.pages.login(notice.as_ref(), "")?.into_response())
}

/// Sign-in form submission
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    let provider = match state.backend.provider() {
        Ok(provider) => provider,
        Err(err) => return setup_response(&state, &err),
    };

    match provider.sign_in(&form.email, &form.password).await {
        Ok(session) => {
            info!("User {} signed in", session.user_id());
            let jar = store_session(jar, &session, state.server.secure_cookies);
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(e) => {
            warn!("Sign-in failed for {}: {}", form.email, e);
            let notice = Notice::error("Error", &failure_message(&e, "Failed to login"));
            Ok((
                StatusCode::UNAUTHORIZED,
                state.pages.login(Some(&notice), &form.email)?,
            )
                .into_response())
        }
    }
}

/// Sign-up page
pub async fn signup_page(State(state): State<AppState>) -> AppResult<Response> {
    if let Err(err) = state.backend.provider() {
        return setup_response(&state, &err);
    }

    Ok(state.pages.signup(None, "")?.into_response())
}

/// Sign-up form submission
pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    let provider = match state.backend.provider() {
        Ok(provider) => provider,
        Err(err) => return setup_response(&state, &err),
    };

    if let Err(message) = validate_email(&form.email).and_then(|_| validate_password(&form.password))
    {
        let notice = Notice::error("Error", &message);
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            state.pages.signup(Some(&notice), &form.email)?,
        )
            .into_response());
    }

    let redirect = state.server.confirmation_redirect();
    match provider.sign_up(&form.email, &form.password, &redirect).await {
        Ok(()) => {
            info!("Sign-up confirmation sent to {}", form.email);
            Ok(Redirect::to("/login?notice=check-email").into_response())
        }
        Err(e) => {
            warn!("Sign-up failed for {}: {}", form.email, e);
            let notice = Notice::error("Error", &failure_message(&e, "Failed to sign up"));
            Ok((
                StatusCode::BAD_REQUEST,
                state.pages.signup(Some(&notice), &form.email)?,
            )
                .into_response())
        }
    }
}

/// Sign out: revoke with the provider when possible, always drop the cookies
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    match (state.backend.provider(), access_token(&jar)) {
        (Ok(provider), Some(token)) => {
            if let Err(e) = provider.sign_out(&token).await {
                warn!("Sign-out with provider failed: {}", e);
            }
        }
        (Err(e), _) => warn!("Skipping provider sign-out: {}", e),
        (Ok(_), None) => {}
    }

    (clear_session(jar), Redirect::to("/login"))
}
