//! REST implementation of [`TicketSource`] for a Zammad-compatible server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use shared_utils::env::get_env_var;
use snafu::{ResultExt, ensure};
use url::Url;

use crate::{
    models::{Ticket, User},
    source::{
        AuthenticationSnafu, ClientBuildSnafu, DecodeSnafu, EmptyTokenSnafu, EndpointSnafu,
        InvalidTokenSnafu, InvalidUrlSnafu, MissingEnvVarSnafu, RequestSnafu, SourceError,
        SourceInitError, StatusSnafu, TicketSource,
    },
};

/// Environment variable holding the server URL (with or without `/api/v1`).
pub const URL_ENV: &str = "ZAMMAD_URL";
/// Environment variable holding the personal API token.
pub const TOKEN_ENV: &str = "ZAMMAD_TOKEN";

/// Page size for ticket searches. The API caps it; one page is what gets polled.
const PER_PAGE: u32 = 200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Turn whatever the user typed as "server" into the API base URL.
///
/// - no scheme -> `https://` is prefixed
/// - a trailing `/` is dropped
/// - `/api/v1` is appended when missing
/// - the result always ends in `/` so relative endpoints join underneath it
pub fn normalize_base_url(raw: &str) -> Result<Url, url::ParseError> {
    let mut s = raw.trim().to_string();
    if !s.to_lowercase().starts_with("http") {
        s = format!("https://{s}");
    }
    while s.ends_with('/') {
        s.pop();
    }
    if !s.ends_with("/api/v1") {
        s.push_str("/api/v1");
    }
    s.push('/');
    Url::parse(&s)
}

pub struct ZammadRestSource {
    client: Client,
    base: Url,
}

impl ZammadRestSource {
    /// Creates a source for `server_url`, authenticating with `token`.
    pub fn new(server_url: &str, token: impl Into<String>) -> Result<Self, SourceInitError> {
        let token = SecretString::new(token.into().into_boxed_str());
        ensure!(!token.expose_secret().trim().is_empty(), EmptyTokenSnafu);

        let base = normalize_base_url(server_url).context(InvalidUrlSnafu { url: server_url })?;

        let mut auth =
            header::HeaderValue::from_str(&format!("Token token={}", token.expose_secret()))
                .context(InvalidTokenSnafu)?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self { client, base })
    }

    /// Creates a source from the `ZAMMAD_URL` and `ZAMMAD_TOKEN` environment variables.
    pub fn from_env() -> Result<Self, SourceInitError> {
        let url = get_env_var(URL_ENV).context(MissingEnvVarSnafu)?;
        let token = get_env_var(TOKEN_ENV).context(MissingEnvVarSnafu)?;
        Self::new(&url, token)
    }

    /// The normalized API base URL requests are sent to.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let url = self.base.join(endpoint).context(EndpointSnafu { endpoint })?;
        tracing::debug!(%url, "GET");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .context(RequestSnafu { endpoint })?;

        let status = response.status();
        ensure!(
            status != StatusCode::UNAUTHORIZED,
            AuthenticationSnafu { endpoint }
        );
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            tracing::warn!(endpoint, status = status.as_u16(), %body, "server error");
            return StatusSnafu {
                endpoint,
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        let bytes = response.bytes().await.context(RequestSnafu { endpoint })?;
        serde_json::from_slice(&bytes).context(DecodeSnafu { endpoint })
    }
}

#[async_trait]
impl TicketSource for ZammadRestSource {
    async fn current_user(&self) -> Result<User, SourceError> {
        self.get_json("users/me", &[]).await
    }

    async fn open_tickets(&self, query: &str) -> Result<Vec<Ticket>, SourceError> {
        let mut tickets: Vec<Ticket> = self
            .get_json(
                "tickets/search",
                &[
                    ("query", query.to_string()),
                    ("expand", "true".to_string()),
                    ("per_page", PER_PAGE.to_string()),
                ],
            )
            .await?;
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }
}
