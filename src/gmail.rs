//! Mailbox adapter over the Gmail REST API
//!
//! Exposes the [`Mailbox`] capability set (list, get, send, own address) and
//! the OAuth credential it authenticates with. Every call is bounded by the
//! configured request timeout; HTTP failures are mapped onto [`AppError`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::OAuthConfig;
use crate::errors::{AppError, AppResult};
use crate::message_id::MessageId;
use crate::models::{
    ListMessagesResponse, MailMessage, MessageFormat, MessageRef, Profile, SendConfirmation,
    SendMessageRequest,
};

/// Scope requested for every access token
pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Access tokens are refreshed this long before their stated expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Mailbox capability set used by the request handlers
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Up to `limit` most recent message stubs, most recent first
    async fn list_recent(&self, limit: u32) -> AppResult<Vec<MessageRef>>;

    /// Fetch one message with the requested level of detail
    async fn get(&self, id: &MessageId, format: MessageFormat<'_>) -> AppResult<MailMessage>;

    /// Submit a base64url-encoded RFC 822 message into an existing thread
    ///
    /// Failures are reported as `AppError::Send` (timeouts and auth failures
    /// keep their own variant).
    async fn send(&self, thread_id: &str, raw: &str) -> AppResult<SendConfirmation>;

    /// Address of the authorized account
    async fn account_address(&self) -> AppResult<String>;
}

/// OAuth refresh-token credential
///
/// Construction is pure: it only captures the secrets and the fixed scope.
/// The token exchange happens lazily in [`GmailClient`].
#[derive(Debug, Clone)]
pub struct OAuthCredential {
    client_id: String,
    client_secret: SecretString,
    refresh_token: SecretString,
    token_endpoint: String,
    scope: &'static str,
}

impl OAuthCredential {
    pub fn new(config: &OAuthConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
            token_endpoint: config.token_endpoint.clone(),
            scope: GMAIL_MODIFY_SCOPE,
        }
    }

    pub fn scope(&self) -> &'static str {
        self.scope
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    access_token: SecretString,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Utc::now() < self.expires_at - chrono::Duration::seconds(EXPIRY_MARGIN_SECS)
    }
}

/// Gmail API client bound to one authorized account
pub struct GmailClient {
    http: Client,
    base_url: String,
    credential: OAuthCredential,
    token: Mutex<Option<CachedToken>>,
}

impl GmailClient {
    /// Create a client for `base_url` (e.g. `https://gmail.googleapis.com/gmail/v1`)
    ///
    /// # Errors
    ///
    /// - `Internal` if the HTTP client cannot be built
    pub fn new(credential: OAuthCredential, base_url: &str, timeout: Duration) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            credential,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/users/me/{path}", self.base_url)
    }

    /// Current access token, exchanging the refresh token when needed
    async fn access_token(&self) -> AppResult<SecretString> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.is_fresh()
        {
            return Ok(token.access_token.clone());
        }

        debug!("exchanging refresh token for a new access token");
        let fresh = self.exchange_refresh_token().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    async fn exchange_refresh_token(&self) -> AppResult<CachedToken> {
        let cred = &self.credential;
        let response = self
            .http
            .post(&cred.token_endpoint)
            .form(&[
                ("client_id", cred.client_id.as_str()),
                ("client_secret", cred.client_secret.expose_secret()),
                ("refresh_token", cred.refresh_token.expose_secret()),
                ("grant_type", "refresh_token"),
                ("scope", cred.scope),
            ])
            .send()
            .await
            .map_err(|e| transport_error("token refresh", e))?;

        let status = response.status();
        if !status.is_success() {
            let body: TokenErrorResponse = response.json().await.unwrap_or(TokenErrorResponse {
                error: None,
                error_description: None,
            });
            let reason = body
                .error_description
                .or(body.error)
                .unwrap_or_else(|| "unknown error".to_owned());
            return Err(AppError::AuthFailed(format!(
                "token refresh failed ({status}): {reason}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::AuthFailed(format!("malformed token response: {e}")))?;
        let expires_in = token.expires_in.unwrap_or(3600);
        Ok(CachedToken {
            access_token: SecretString::new(token.access_token.into()),
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
        })
    }

    /// Attach the bearer token, send, and decode a JSON response
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder, context: &str) -> AppResult<T> {
        let token = self.access_token().await?;
        let response = request
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| transport_error(context, e))?;
        let response = check_status(response, context).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Mailbox(format!("{context}: malformed response: {e}")))
    }
}

#[async_trait]
impl Mailbox for GmailClient {
    async fn list_recent(&self, limit: u32) -> AppResult<Vec<MessageRef>> {
        let request = self
            .http
            .get(self.url("messages"))
            .query(&[("maxResults", limit.to_string())]);
        let list: ListMessagesResponse = self.call(request, "list messages").await?;
        debug!(count = list.messages.len(), "listed recent messages");
        Ok(list.messages)
    }

    async fn get(&self, id: &MessageId, format: MessageFormat<'_>) -> AppResult<MailMessage> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        match format {
            MessageFormat::Metadata(headers) => {
                query.push(("format", "metadata"));
                query.extend(headers.iter().map(|h| ("metadataHeaders", *h)));
            }
            MessageFormat::Full => query.push(("format", "full")),
        }
        let request = self
            .http
            .get(self.url(&format!("messages/{id}")))
            .query(&query);
        self.call(request, "get message").await
    }

    async fn send(&self, thread_id: &str, raw: &str) -> AppResult<SendConfirmation> {
        let body = SendMessageRequest {
            raw: raw.to_owned(),
            thread_id: thread_id.to_owned(),
        };
        let request = self.http.post(self.url("messages/send")).json(&body);
        let confirmation: SendConfirmation = self
            .call(request, "send message")
            .await
            .map_err(AppError::into_send)?;
        debug!(id = %confirmation.id, thread_id = ?confirmation.thread_id, "message submitted");
        Ok(confirmation)
    }

    async fn account_address(&self) -> AppResult<String> {
        let request = self.http.get(self.url("profile"));
        let profile: Profile = self.call(request, "get profile").await?;
        Ok(profile.email_address)
    }
}

/// Map a `reqwest` transport failure
fn transport_error(context: &str, e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(format!("{context} timed out"))
    } else {
        AppError::Mailbox(format!("{context} failed: {e}"))
    }
}

/// Turn a non-success HTTP status into the matching error variant
async fn check_status(response: Response, context: &str) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let msg = format!("{context} failed ({status}): {body}");
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::AuthFailed(msg),
        StatusCode::NOT_FOUND => AppError::NotFound(msg),
        _ => AppError::Mailbox(msg),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{GMAIL_MODIFY_SCOPE, GmailClient, Mailbox, OAuthCredential};
    use crate::config::OAuthConfig;
    use crate::message_id::MessageId;
    use crate::models::MessageFormat;

    fn credential(server: &MockServer) -> OAuthCredential {
        OAuthCredential::new(&OAuthConfig {
            client_id: "client-1".to_owned(),
            client_secret: SecretString::new("secret-1".into()),
            refresh_token: SecretString::new("refresh-1".into()),
            token_endpoint: format!("{}/token", server.uri()),
        })
    }

    async fn client(server: &MockServer) -> GmailClient {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "test-token",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(server)
            .await;

        GmailClient::new(
            credential(server),
            &format!("{}/gmail/v1", server.uri()),
            Duration::from_secs(5),
        )
        .expect("client builds")
    }

    #[test]
    fn credential_construction_fixes_modify_scope() {
        let cred = OAuthCredential::new(&OAuthConfig {
            client_id: "id".to_owned(),
            client_secret: SecretString::new("s".into()),
            refresh_token: SecretString::new("r".into()),
            token_endpoint: "http://unused".to_owned(),
        });
        assert_eq!(cred.scope(), GMAIL_MODIFY_SCOPE);
        let debug = format!("{cred:?}");
        assert!(!debug.contains("\"s\""));
        assert!(!debug.contains("\"r\""));
    }

    #[tokio::test]
    async fn lists_and_gets_with_single_token_exchange() {
        let server = MockServer::start().await;
        let gmail = client(&server).await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(query_param("maxResults", "15"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"id": "m1", "threadId": "t1"}, {"id": "m2", "threadId": "t2"}],
                "resultSizeEstimate": 2
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1"))
            .and(query_param("format", "metadata"))
            .and(query_param("metadataHeaders", "Subject"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "m1",
                "threadId": "t1",
                "labelIds": ["INBOX"],
                "payload": {"headers": [{"name": "Subject", "value": "Hi"}]}
            })))
            .mount(&server)
            .await;

        let refs = gmail.list_recent(15).await.expect("list succeeds");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].id, "m1");

        let id = MessageId::parse("m1").expect("valid id");
        let msg = gmail
            .get(&id, MessageFormat::Metadata(&["Subject", "From"]))
            .await
            .expect("get succeeds");
        assert_eq!(msg.header("Subject"), Some("Hi"));
        assert!(msg.has_label("INBOX"));
    }

    #[tokio::test]
    async fn empty_mailbox_lists_nothing() {
        let server = MockServer::start().await;
        let gmail = client(&server).await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"resultSizeEstimate": 0})),
            )
            .mount(&server)
            .await;

        let refs = gmail.list_recent(15).await.expect("list succeeds");
        assert!(refs.is_empty());
    }

    #[tokio::test]
    async fn send_posts_raw_message_into_thread() {
        let server = MockServer::start().await;
        let gmail = client(&server).await;

        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_string_contains("\"raw\":\"cmF3\""))
            .and(body_string_contains("\"threadId\":\"t1\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "sent-1",
                "threadId": "t1",
                "labelIds": ["SENT"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let confirmation = gmail.send("t1", "cmF3").await.expect("send succeeds");
        assert_eq!(confirmation.id, "sent-1");
        assert_eq!(confirmation.thread_id.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn send_rejection_maps_to_send_error() {
        let server = MockServer::start().await;
        let gmail = client(&server).await;

        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Invalid thread_id value"))
            .mount(&server)
            .await;

        let err = gmail.send("bogus", "cmF3").await.expect_err("must fail");
        assert_eq!(err.code(), "send_failed");
        assert!(err.to_string().contains("Invalid thread_id"));
    }

    #[tokio::test]
    async fn missing_message_maps_to_not_found() {
        let server = MockServer::start().await;
        let gmail = client(&server).await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Requested entity was not found."))
            .mount(&server)
            .await;

        let id = MessageId::parse("gone").expect("valid id");
        let err = gmail.get(&id, MessageFormat::Full).await.expect_err("must fail");
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn rejected_refresh_token_maps_to_auth_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let gmail = GmailClient::new(
            credential(&server),
            &format!("{}/gmail/v1", server.uri()),
            Duration::from_secs(5),
        )
        .expect("client builds");

        let err = gmail.account_address().await.expect_err("must fail");
        assert_eq!(err.code(), "auth_failed");
        assert!(err.to_string().contains("expired or revoked"));
    }
}
