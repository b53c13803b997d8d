//! HTTP implementation of the identity provider adapter
//!
//! Talks to the hosted auth endpoints (`/auth/v1`) and the row service
//! (`/rest/v1`). Every request carries the public API key; row requests
//! carry the user's access token so the backend can apply row-level
//! security.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{error, info};

use crate::{
    config::SupabaseConfig,
    error::{ProviderError, ProviderResult},
    models::{
        DIARY_ENTRIES_TABLE, DiaryEntry, EntryId, NewDiaryEntry, Session, UpdateDiaryEntry, User,
    },
    provider::IdentityProvider,
};

/// Row service code for "zero rows where exactly one was requested"
const NO_ROWS_CODE: &str = "PGRST116";

/// Error payload shapes used by the auth and row services
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<serde_json::Value>,
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DateRow {
    date: NaiveDate,
}

/// Client for the hosted auth and row service
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    config: SupabaseConfig,
}

impl SupabaseClient {
    /// Create a client from validated configuration
    pub fn new(config: SupabaseConfig) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        info!("Identity provider client initialized for {}", config.url);
        Ok(Self { http, config })
    }

    /// Create a client from `SUPABASE_URL` / `SUPABASE_ANON_KEY`
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(SupabaseConfig::from_env()?)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.config.url, path)
    }

    fn rows_url(&self) -> String {
        format!("{}/rest/v1/{}", self.config.url, DIARY_ENTRIES_TABLE)
    }

    fn request(&self, method: Method, url: String, access_token: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.config.anon_key))
    }

    /// Pass successful responses through, turn the rest into a tagged error
    async fn check(response: Response) -> ProviderResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();

        if parsed.code.as_ref().and_then(|code| code.as_str()) == Some(NO_ROWS_CODE) {
            return Err(ProviderError::NotFound);
        }

        let detail = parsed
            .error_description
            .or(parsed.msg)
            .or(parsed.message)
            .or(parsed.error)
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    status.to_string()
                } else {
                    body
                }
            });

        Err(ProviderError::Backend(detail))
    }

    async fn fetch_entry(
        &self,
        session: &Session,
        date: NaiveDate,
    ) -> ProviderResult<Option<DiaryEntry>> {
        let response = self
            .request(Method::GET, self.rows_url(), Some(&session.access_token))
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", session.user_id())),
                ("date", format!("eq.{date}")),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;

        let rows: Vec<DiaryEntry> = Self::check(response).await?.json().await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn sign_in(&self, email: &str, password: &str) -> ProviderResult<Session> {
        info!("Sign-in attempt for {}", email);

        let response = self
            .request(Method::POST, self.auth_url("token"), None)
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let session = Self::check(response).await?.json::<Session>().await?;
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        confirmation_redirect: &str,
    ) -> ProviderResult<()> {
        info!("Sign-up request for {}", email);

        let response = self
            .request(Method::POST, self.auth_url("signup"), None)
            .query(&[("redirect_to", confirmation_redirect)])
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn sign_out(&self, access_token: &str) -> ProviderResult<()> {
        let response = self
            .request(Method::POST, self.auth_url("logout"), Some(access_token))
            .send()
            .await?;

        // An already-expired token has nothing left to revoke
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }

        Self::check(response).await?;
        Ok(())
    }

    async fn refresh_session(&self, refresh_token: &str) -> ProviderResult<Option<Session>> {
        let response = self
            .request(Method::POST, self.auth_url("token"), None)
            .query(&[("grant_type", "refresh_token")])
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        // Revoked, reused or unknown refresh tokens come back as 400
        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            info!("Refresh token rejected by identity provider");
            return Ok(None);
        }

        let session = Self::check(response).await?.json::<Session>().await?;
        info!("Session refreshed for user {}", session.user_id());
        Ok(Some(session))
    }

    async fn get_current_user(&self, access_token: &str) -> ProviderResult<Option<User>> {
        let response = self
            .request(Method::GET, self.auth_url("user"), Some(access_token))
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }

        let user = Self::check(response).await?.json::<User>().await?;
        Ok(Some(user))
    }

    async fn find(&self, session: &Session, date: NaiveDate) -> ProviderResult<Option<DiaryEntry>> {
        info!("Finding diary entry for user {} on {}", session.user_id(), date);

        match self.fetch_entry(session, date).await {
            Err(ProviderError::NotFound) => Ok(None),
            result => result,
        }
    }

    async fn list_dates(&self, session: &Session) -> ProviderResult<Vec<NaiveDate>> {
        info!("Listing diary dates for user {}", session.user_id());

        let response = self
            .request(Method::GET, self.rows_url(), Some(&session.access_token))
            .query(&[
                ("select", "date".to_string()),
                ("user_id", format!("eq.{}", session.user_id())),
            ])
            .send()
            .await?;

        let rows: Vec<DateRow> = Self::check(response).await?.json().await?;
        Ok(rows.into_iter().map(|row| row.date).collect())
    }

    async fn insert(
        &self,
        session: &Session,
        date: NaiveDate,
        content: &str,
    ) -> ProviderResult<DiaryEntry> {
        info!("Inserting diary entry for user {} on {}", session.user_id(), date);

        let payload = [NewDiaryEntry {
            user_id: session.user_id(),
            date,
            content,
        }];

        let response = self
            .request(Method::POST, self.rows_url(), Some(&session.access_token))
            .header("Prefer", "return=representation")
            .json(&payload)
            .send()
            .await?;

        let rows: Vec<DiaryEntry> = Self::check(response).await?.json().await?;
        rows.into_iter().next().ok_or_else(|| {
            error!("Insert for {} returned no representation", date);
            ProviderError::Backend("Insert returned no row".to_string())
        })
    }

    async fn update(
        &self,
        session: &Session,
        id: &EntryId,
        content: &str,
    ) -> ProviderResult<DiaryEntry> {
        info!("Updating diary entry {} for user {}", id, session.user_id());

        let response = self
            .request(Method::PATCH, self.rows_url(), Some(&session.access_token))
            .query(&[
                ("id", format!("eq.{id}")),
                ("user_id", format!("eq.{}", session.user_id())),
            ])
            .header("Prefer", "return=representation")
            .json(&UpdateDiaryEntry { content })
            .send()
            .await?;

        let rows: Vec<DiaryEntry> = Self::check(response).await?.json().await?;
        rows.into_iter().next().ok_or(ProviderError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path, query_param},
    };

    fn client(server: &MockServer) -> SupabaseClient {
        let config =
            SupabaseConfig::from_values(Some(server.uri()), Some("anon-key".to_string())).unwrap();
        SupabaseClient::new(config).unwrap()
    }

    fn session(user_id: Uuid) -> Session {
        Session {
            access_token: "user-token".to_string(),
            refresh_token: Some("refresh".to_string()),
            user: User {
                id: user_id,
                email: Some("diarist@example.com".to_string()),
            },
        }
    }

    fn march_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn missing_config_is_reported_before_any_call() {
        let err = SupabaseConfig::from_values(None, Some("anon-key".to_string()))
            .and_then(SupabaseClient::new)
            .err()
            .unwrap();
        assert!(err.is_config_missing());
    }

    #[tokio::test]
    async fn sign_in_returns_session() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon-key"))
            .and(body_json(
                json!({"email": "diarist@example.com", "password": "secret1"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "user-token",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "refresh",
                "user": {"id": user_id, "email": "diarist@example.com", "aud": "authenticated"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = client(&server)
            .sign_in("diarist@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(session.access_token, "user-token");
        assert_eq!(session.user.id, user_id);
    }

    #[tokio::test]
    async fn sign_in_surfaces_backend_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .sign_in("diarist@example.com", "wrong")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProviderError::Backend("Invalid login credentials".to_string())
        );
    }

    #[tokio::test]
    async fn sign_up_sends_confirmation_redirect() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .and(query_param("redirect_to", "http://localhost:3000/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": Uuid::new_v4()})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .sign_up("new@example.com", "secret1", "http://localhost:3000/login")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn expired_token_has_no_current_user() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"msg": "invalid JWT"})))
            .mount(&server)
            .await;

        assert_eq!(client(&server).get_current_user("stale").await.unwrap(), None);
    }

    #[tokio::test]
    async fn sign_out_revokes_with_user_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).sign_out("user-token").await.unwrap();
    }

    #[tokio::test]
    async fn sign_out_of_expired_session_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        assert!(client(&server).sign_out("stale").await.is_ok());
    }

    #[tokio::test]
    async fn refresh_exchanges_refresh_token() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(json!({"refresh_token": "old-refresh"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "new-token",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "new-refresh",
                "user": {"id": user_id, "email": "diarist@example.com"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = client(&server)
            .refresh_session("old-refresh")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.access_token, "new-token");
        assert_eq!(session.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(session.user.id, user_id);
    }

    #[tokio::test]
    async fn rejected_refresh_token_has_no_session() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid Refresh Token: Already Used"
            })))
            .mount(&server)
            .await;

        assert_eq!(client(&server).refresh_session("used").await.unwrap(), None);
    }

    #[tokio::test]
    async fn current_user_server_error_is_backend_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server).get_current_user("token").await.unwrap_err();
        assert!(matches!(err, ProviderError::Backend(_)));
    }

    #[tokio::test]
    async fn find_without_rows_is_absent() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/diary_entries"))
            .and(query_param("user_id", format!("eq.{user_id}")))
            .and(query_param("date", "eq.2024-03-02"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let found = client(&server)
            .find(&session(user_id), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap())
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn find_treats_no_rows_code_as_absent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/diary_entries"))
            .respond_with(ResponseTemplate::new(406).set_body_json(json!({
                "code": "PGRST116",
                "message": "JSON object requested, multiple (or no) rows returned"
            })))
            .mount(&server)
            .await;

        let found = client(&server)
            .find(&session(Uuid::new_v4()), march_first())
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn find_server_error_is_not_absent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/diary_entries"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"message": "relation missing"})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .find(&session(Uuid::new_v4()), march_first())
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Backend("relation missing".to_string()));
    }

    #[tokio::test]
    async fn list_dates_selects_only_dates() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/diary_entries"))
            .and(query_param("select", "date"))
            .and(query_param("user_id", format!("eq.{user_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"date": "2024-03-01"},
                {"date": "2024-03-05"}
            ])))
            .mount(&server)
            .await;

        let dates = client(&server).list_dates(&session(user_id)).await.unwrap();
        assert_eq!(
            dates,
            vec![march_first(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()]
        );
    }

    #[tokio::test]
    async fn upsert_updates_existing_row() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/diary_entries"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 7, "user_id": user_id, "date": "2024-03-01", "content": "draft"
            }])))
            .mount(&server)
            .await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/diary_entries"))
            .and(query_param("id", "eq.7"))
            .and(header("prefer", "return=representation"))
            .and(body_json(json!({"content": "Today was sunny."})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 7, "user_id": user_id, "date": "2024-03-01", "content": "Today was sunny."
            }])))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/diary_entries"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let saved = client(&server)
            .upsert(&session(user_id), march_first(), "Today was sunny.")
            .await
            .unwrap();
        assert_eq!(saved.id, EntryId::Int(7));
        assert_eq!(saved.content, "Today was sunny.");
    }

    #[tokio::test]
    async fn upsert_inserts_when_absent() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/diary_entries"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/diary_entries"))
            .and(body_json(json!([{
                "user_id": user_id, "date": "2024-03-01", "content": "Today was sunny."
            }])))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
                "id": 1, "user_id": user_id, "date": "2024-03-01", "content": "Today was sunny."
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let saved = client(&server)
            .upsert(&session(user_id), march_first(), "Today was sunny.")
            .await
            .unwrap();
        assert_eq!(saved.date, march_first());
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/diary_entries"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = client(&server)
            .update(&session(Uuid::new_v4()), &EntryId::Int(99), "x")
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::NotFound);
    }
}
