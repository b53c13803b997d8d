//! Server-rendered pages
//!
//! Templates are compiled into the binary and registered once at start-up.
//! Handlebars escapes every interpolated value, so diary content and
//! backend messages are safe to render as-is.

use std::sync::Arc;

use axum::response::Html;
use chrono::NaiveDate;
use common::ProviderError;
use handlebars::{Handlebars, RenderError, TemplateError};
use serde::Serialize;

use crate::{
    calendar::MonthGrid,
    view::{DiaryView, Notice, ViewState},
};

const HEAD: &str = include_str!("../templates/partials/head.hbs");
const NOTICE: &str = include_str!("../templates/partials/notice.hbs");
const LOGIN: &str = include_str!("../templates/login.hbs");
const SIGNUP: &str = include_str!("../templates/signup.hbs");
const SETUP: &str = include_str!("../templates/setup.hbs");
const ERROR: &str = include_str!("../templates/error.hbs");
const DIARY: &str = include_str!("../templates/diary.hbs");

#[derive(Serialize)]
struct AuthPage<'a> {
    title: &'a str,
    notice: Option<&'a Notice>,
    email: &'a str,
}

#[derive(Serialize)]
struct SetupPage<'a> {
    title: &'a str,
    missing: &'a [&'static str],
    detail: String,
}

#[derive(Serialize)]
struct ErrorPage<'a> {
    title: &'a str,
    detail: &'a str,
}

#[derive(Serialize)]
struct DiaryPage<'a> {
    title: &'a str,
    email: Option<&'a str>,
    notice: Option<&'a Notice>,
    date: NaiveDate,
    heading: String,
    previous_day: Option<NaiveDate>,
    next_day: Option<NaiveDate>,
    calendar: MonthGrid,
    loading: bool,
    editing: bool,
    has_entry: bool,
    entry: &'a str,
    draft: &'a str,
}

/// Long-form heading, e.g. "Friday, March 1, 2024"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// Compiled page templates
#[derive(Clone)]
pub struct Pages {
    registry: Arc<Handlebars<'static>>,
}

impl Pages {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.register_partial("head", HEAD)?;
        registry.register_partial("notice", NOTICE)?;
        registry.register_template_string("login", LOGIN)?;
        registry.register_template_string("signup", SIGNUP)?;
        registry.register_template_string("setup", SETUP)?;
        registry.register_template_string("error", ERROR)?;
        registry.register_template_string("diary", DIARY)?;

        Ok(Self {
            registry: Arc::new(registry),
        })
    }

    fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<Html<String>, RenderError> {
        self.registry.render(name, data).map(Html)
    }

    pub fn login(&self, notice: Option<&Notice>, email: &str) -> Result<Html<String>, RenderError> {
        self.render(
            "login",
            &AuthPage {
                title: "Sign in",
                notice,
                email,
            },
        )
    }

    pub fn signup(&self, notice: Option<&Notice>, email: &str) -> Result<Html<String>, RenderError> {
        self.render(
            "signup",
            &AuthPage {
                title: "Sign up",
                notice,
                email,
            },
        )
    }

    /// Blocking setup screen for missing or unusable provider configuration
    pub fn setup(&self, err: &ProviderError) -> Result<Html<String>, RenderError> {
        let missing: &[&'static str] = match err {
            ProviderError::ConfigMissing(missing) => missing.as_slice(),
            _ => &[],
        };
        self.render(
            "setup",
            &SetupPage {
                title: "Setup required",
                missing,
                detail: err.to_string(),
            },
        )
    }

    pub fn error(&self, detail: &str) -> Result<Html<String>, RenderError> {
        self.render(
            "error",
            &ErrorPage {
                title: "Error",
                detail,
            },
        )
    }

    pub fn diary(&self, view: &DiaryView, email: Option<&str>) -> Result<Html<String>, RenderError> {
        let date = view.date();
        let (loading, editing, entry, draft) = match view.state() {
            ViewState::Loading => (true, false, None, ""),
            ViewState::Viewing { entry } => (false, false, entry.as_ref(), ""),
            ViewState::Editing { entry, draft } => (false, true, entry.as_ref(), draft.as_str()),
        };

        self.render(
            "diary",
            &DiaryPage {
                title: "Diary",
                email,
                notice: view.notice(),
                date,
                heading: long_date(date),
                previous_day: date.pred_opt(),
                next_day: date.succ_opt(),
                calendar: MonthGrid::new(date, view.dates_with_entries()),
                loading,
                editing,
                has_entry: entry.is_some(),
                entry: entry.map(|entry| entry.content.as_str()).unwrap_or_default(),
                draft,
            },
        )
    }
}
