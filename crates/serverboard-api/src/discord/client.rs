// Discord REST API client (v10)
//
// Base path: https://discord.com/api/v10/
// Auth: `Authorization: Bot <token>` header

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::models::{ErrorBody, Message, MessagePayload, Snowflake, User};
use crate::error::Error;
use crate::transport::TransportConfig;

const DEFAULT_BASE_URL: &str = "https://discord.com/api/v10/";

/// Largest page `GET /channels/{id}/messages` returns.
pub const MAX_HISTORY_LIMIT: u8 = 100;

/// Async client for the Discord REST API, authenticated as a bot.
pub struct DiscordClient {
    http: reqwest::Client,
    base_url: Url,
}

impl DiscordClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Client against the public Discord API.
    pub fn new(token: &SecretString, transport: &TransportConfig) -> Result<Self, Error> {
        Self::with_base_url(DEFAULT_BASE_URL, token, transport)
    }

    /// Client against a custom base URL (tests, proxies).
    ///
    /// Injects `Authorization: Bot <token>` as a default header on every
    /// request.
    pub fn with_base_url(
        base_url: &str,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bot {}", token.expose_secret())).map_err(
            |e| Error::Authentication {
                message: format!("invalid bot token header value: {e}"),
            },
        )?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = transport.build_client_with_headers(headers)?;

        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { http, base_url })
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /users/@me`: the bot's own user. Doubles as a token check.
    pub async fn current_user(&self) -> Result<User, Error> {
        self.get("users/@me").await
    }

    /// `POST /channels/{channel}/messages`
    pub async fn create_message(
        &self,
        channel: Snowflake,
        payload: &MessagePayload,
    ) -> Result<Message, Error> {
        self.post(&format!("channels/{channel}/messages"), payload)
            .await
    }

    /// `PATCH /channels/{channel}/messages/{message}`
    pub async fn edit_message(
        &self,
        channel: Snowflake,
        message: Snowflake,
        payload: &MessagePayload,
    ) -> Result<Message, Error> {
        self.patch(&format!("channels/{channel}/messages/{message}"), payload)
            .await
    }

    /// `DELETE /channels/{channel}/messages/{message}`
    pub async fn delete_message(&self, channel: Snowflake, message: Snowflake) -> Result<(), Error> {
        self.delete(&format!("channels/{channel}/messages/{message}"))
            .await
    }

    /// `GET /channels/{channel}/messages/{message}`
    ///
    /// Returns `Ok(None)` when the message no longer exists.
    pub async fn get_message(
        &self,
        channel: Snowflake,
        message: Snowflake,
    ) -> Result<Option<Message>, Error> {
        match self
            .get(&format!("channels/{channel}/messages/{message}"))
            .await
        {
            Ok(msg) => Ok(Some(msg)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `GET /channels/{channel}/messages?limit=N`, newest first.
    pub async fn channel_messages(
        &self,
        channel: Snowflake,
        limit: u8,
    ) -> Result<Vec<Message>, Error> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        self.get_with_params(
            &format!("channels/{channel}/messages"),
            &[("limit", limit.to_string())],
        )
        .await
    }

    // ── URL builder ──────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        Self::handle_response(resp).await
    }

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url} params={params:?}");

        let resp = self.http.get(url).query(params).send().await?;
        Self::handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        Self::handle_response(resp).await
    }

    async fn patch<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("PATCH {url}");

        let resp = self.http.patch(url).json(body).send().await?;
        Self::handle_response(resp).await
    }

    async fn delete(&self, path: &str) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("DELETE {url}");

        let resp = self.http.delete(url).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        let raw = resp.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<ErrorBody>(&raw).ok();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Error::Authentication {
                message: parsed
                    .and_then(|b| b.message)
                    .unwrap_or_else(|| "bot token rejected".into()),
            };
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Error::RateLimited {
                retry_after_secs: parsed.and_then(|b| b.retry_after).unwrap_or(1.0),
            };
        }

        match parsed {
            Some(body) => Error::Discord {
                status: status.as_u16(),
                message: body.message.unwrap_or_else(|| status.to_string()),
                code: body.code,
            },
            None => Error::Discord {
                status: status.as_u16(),
                message: if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                },
                code: None,
            },
        }
    }
}
