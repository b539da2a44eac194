//! Configuration module for mailbox credentials and server settings
//!
//! All configuration is loaded from environment variables. The three OAuth
//! secrets and the completion API key are required; everything else uses the
//! `INBOX_TRIAGE_<KEY>` pattern and has a default.

use std::env;
use std::env::VarError;
use std::net::SocketAddr;

use secrecy::SecretString;

use crate::errors::{AppError, AppResult};

/// Default Gmail REST API base URL
pub const DEFAULT_GMAIL_ENDPOINT: &str = "https://gmail.googleapis.com/gmail/v1";
/// Default Google OAuth2 token endpoint
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
/// Default generative-language API base URL
pub const DEFAULT_COMPLETION_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default completion model
pub const DEFAULT_COMPLETION_MODEL: &str = "gemini-2.0-flash-001";

/// OAuth secrets for the mailbox account
///
/// Secrets are stored using `SecretString` to prevent accidental logging.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
    /// Long-lived refresh token for the authorized account
    pub refresh_token: SecretString,
    /// Token endpoint used for the `refresh_token` grant
    pub token_endpoint: String,
}

/// Completion backend settings
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// API key sent as `x-goog-api-key`
    pub api_key: SecretString,
    /// Model name, e.g. `gemini-2.0-flash-001`
    pub model: String,
    /// API base URL
    pub endpoint: String,
}

/// Server-wide configuration
///
/// Shared into request handlers via `Arc`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Mailbox OAuth secrets
    pub oauth: OAuthConfig,
    /// Completion backend settings
    pub completion: CompletionConfig,
    /// Gmail REST API base URL
    pub gmail_endpoint: String,
    /// Own account address; resolved from the mailbox profile when unset
    pub account_address: Option<String>,
    /// Listen address for the HTTP server
    pub bind: SocketAddr,
    /// Timeout applied to each outbound HTTP call in milliseconds
    pub request_timeout_ms: u64,
    /// Number of recent messages listed on the inbox page
    pub inbox_limit: u32,
    /// Maximum characters of body text returned by analysis
    pub body_max_chars: usize,
    /// Concurrent urgency classifications on the inbox page (1 = sequential)
    pub classify_concurrency: usize,
}

/// Upper bound on listed messages
pub const MAX_INBOX_LIMIT: u32 = 15;
/// Upper bound on body characters returned by analysis
pub const MAX_BODY_CHARS: usize = 2_000;

/// Variable lookup used while loading; `env::var` in production
type Lookup<'a> = dyn Fn(&str) -> Result<String, VarError> + 'a;

impl ServerConfig {
    /// Load all configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if required environment variables are missing
    /// or any optional one is malformed or out of range.
    ///
    /// # Example Environment
    ///
    /// ```text
    /// CLIENT_ID=1234.apps.googleusercontent.com
    /// CLIENT_SECRET=GOCSPX-...
    /// REFRESH_TOKEN=1//0g...
    /// GEMINI_API_KEY=AIza...
    /// INBOX_TRIAGE_ACCOUNT_ADDRESS=me@example.com
    /// INBOX_TRIAGE_BIND=0.0.0.0:8080
    /// ```
    pub fn load_from_env() -> AppResult<Self> {
        Self::load_with(&|key: &str| env::var(key))
    }

    fn load_with(lookup: &Lookup<'_>) -> AppResult<Self> {
        let oauth = OAuthConfig {
            client_id: required_env(lookup, "CLIENT_ID")?,
            client_secret: SecretString::new(required_env(lookup, "CLIENT_SECRET")?.into()),
            refresh_token: SecretString::new(required_env(lookup, "REFRESH_TOKEN")?.into()),
            token_endpoint: string_env(
                lookup,
                "INBOX_TRIAGE_TOKEN_ENDPOINT",
                DEFAULT_TOKEN_ENDPOINT,
            )?,
        };

        let completion = CompletionConfig {
            api_key: SecretString::new(required_env(lookup, "GEMINI_API_KEY")?.into()),
            model: string_env(
                lookup,
                "INBOX_TRIAGE_COMPLETION_MODEL",
                DEFAULT_COMPLETION_MODEL,
            )?,
            endpoint: string_env(
                lookup,
                "INBOX_TRIAGE_COMPLETION_ENDPOINT",
                DEFAULT_COMPLETION_ENDPOINT,
            )?,
        };

        let inbox_limit = parse_u32_env(lookup, "INBOX_TRIAGE_INBOX_LIMIT", MAX_INBOX_LIMIT)?;
        if !(1..=MAX_INBOX_LIMIT).contains(&inbox_limit) {
            return Err(AppError::invalid(format!(
                "INBOX_TRIAGE_INBOX_LIMIT must be in range 1..={MAX_INBOX_LIMIT}"
            )));
        }

        let body_max_chars =
            parse_usize_env(lookup, "INBOX_TRIAGE_BODY_MAX_CHARS", MAX_BODY_CHARS)?;
        if !(1..=MAX_BODY_CHARS).contains(&body_max_chars) {
            return Err(AppError::invalid(format!(
                "INBOX_TRIAGE_BODY_MAX_CHARS must be in range 1..={MAX_BODY_CHARS}"
            )));
        }

        let classify_concurrency =
            parse_usize_env(lookup, "INBOX_TRIAGE_CLASSIFY_CONCURRENCY", 1)?;
        if classify_concurrency == 0 {
            return Err(AppError::invalid(
                "INBOX_TRIAGE_CLASSIFY_CONCURRENCY must be at least 1",
            ));
        }

        Ok(Self {
            oauth,
            completion,
            gmail_endpoint: string_env(
                lookup,
                "INBOX_TRIAGE_GMAIL_ENDPOINT",
                DEFAULT_GMAIL_ENDPOINT,
            )?,
            account_address: optional_env(lookup, "INBOX_TRIAGE_ACCOUNT_ADDRESS")?,
            bind: parse_socket_addr_env(lookup, "INBOX_TRIAGE_BIND", "127.0.0.1:8080")?,
            request_timeout_ms: parse_u64_env(lookup, "INBOX_TRIAGE_REQUEST_TIMEOUT_MS", 30_000)?,
            inbox_limit,
            body_max_chars,
            classify_concurrency,
        })
    }
}

/// Read a required environment variable, returning error if missing or empty
fn required_env(lookup: &Lookup<'_>, key: &str) -> AppResult<String> {
    match lookup(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::InvalidInput(format!(
            "missing required environment variable {key}"
        ))),
    }
}

/// Read an optional environment variable; blank counts as unset
fn optional_env(lookup: &Lookup<'_>, key: &str) -> AppResult<Option<String>> {
    match lookup(key) {
        Ok(v) if v.trim().is_empty() => Ok(None),
        Ok(v) => Ok(Some(v.trim().to_owned())),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(non_unicode(key)),
    }
}

fn string_env(lookup: &Lookup<'_>, key: &str, default: &str) -> AppResult<String> {
    Ok(optional_env(lookup, key)?.unwrap_or_else(|| default.to_owned()))
}

fn non_unicode(key: &str) -> AppError {
    AppError::InvalidInput(format!(
        "environment variable {key} contains non-unicode data"
    ))
}

/// Parse a `SocketAddr` environment variable with default fallback
fn parse_socket_addr_env(lookup: &Lookup<'_>, key: &str, default: &str) -> AppResult<SocketAddr> {
    let raw = string_env(lookup, key, default)?;
    raw.parse::<SocketAddr>().map_err(|_| {
        AppError::InvalidInput(format!("invalid socket address in {key}: '{raw}'"))
    })
}

/// Parse a `u32` environment variable with default fallback
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set but not a valid `u32`.
fn parse_u32_env(lookup: &Lookup<'_>, key: &str, default: u32) -> AppResult<u32> {
    match lookup(key) {
        Ok(v) => v.trim().parse::<u32>().map_err(|_| {
            AppError::InvalidInput(format!("invalid u32 environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(non_unicode(key)),
    }
}

/// Parse a `u64` environment variable with default fallback
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set but not a valid `u64`.
fn parse_u64_env(lookup: &Lookup<'_>, key: &str, default: u64) -> AppResult<u64> {
    match lookup(key) {
        Ok(v) => v.trim().parse::<u64>().map_err(|_| {
            AppError::InvalidInput(format!("invalid u64 environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(non_unicode(key)),
    }
}

/// Parse a `usize` environment variable with default fallback
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set but not a valid `usize`.
fn parse_usize_env(lookup: &Lookup<'_>, key: &str, default: usize) -> AppResult<usize> {
    match lookup(key) {
        Ok(v) => v.trim().parse::<usize>().map_err(|_| {
            AppError::InvalidInput(format!("invalid usize environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(non_unicode(key)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use secrecy::ExposeSecret;

    use super::{
        MAX_BODY_CHARS, MAX_INBOX_LIMIT, ServerConfig, parse_socket_addr_env, parse_u32_env,
        required_env,
    };
    use crate::errors::AppResult;

    fn load(extra: &[(&str, &str)]) -> AppResult<ServerConfig> {
        let mut vars: HashMap<String, String> = [
            ("CLIENT_ID", "client-1"),
            ("CLIENT_SECRET", "secret-1"),
            ("REFRESH_TOKEN", "refresh-1"),
            ("GEMINI_API_KEY", "key-1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
        for (k, v) in extra {
            vars.insert((*k).to_owned(), (*v).to_owned());
        }
        ServerConfig::load_with(&|key: &str| vars.get(key).cloned().ok_or(VarError::NotPresent))
    }

    fn unset(_: &str) -> Result<String, VarError> {
        Err(VarError::NotPresent)
    }

    #[test]
    fn required_env_rejects_blank_values() {
        let err = required_env(&unset, "CLIENT_ID").expect_err("must fail");
        assert!(err.to_string().contains("missing required environment variable"));
    }

    #[test]
    fn numeric_env_falls_back_to_default_when_unset() {
        let value = parse_u32_env(&unset, "INBOX_TRIAGE_INBOX_LIMIT", 15).expect("default applies");
        assert_eq!(value, 15);
    }

    #[test]
    fn socket_addr_default_parses() {
        let addr = parse_socket_addr_env(&unset, "INBOX_TRIAGE_BIND", "127.0.0.1:8080")
            .expect("default parses");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn loads_defaults_with_required_secrets() {
        let config = load(&[]).expect("config loads");
        assert_eq!(config.oauth.client_id, "client-1");
        assert_eq!(config.oauth.refresh_token.expose_secret(), "refresh-1");
        assert_eq!(config.inbox_limit, MAX_INBOX_LIMIT);
        assert_eq!(config.body_max_chars, MAX_BODY_CHARS);
        assert_eq!(config.classify_concurrency, 1);
        assert_eq!(config.request_timeout_ms, 30_000);
        assert_eq!(config.bind.port(), 8080);
        assert!(config.account_address.is_none());
    }

    #[test]
    fn missing_or_blank_secret_fails() {
        let err = load(&[("GEMINI_API_KEY", "  ")]).expect_err("blank key must fail");
        assert!(err.to_string().contains("GEMINI_API_KEY"));

        let err = ServerConfig::load_with(&unset).expect_err("no secrets must fail");
        assert!(err.to_string().contains("CLIENT_ID"));
    }

    #[test]
    fn inbox_limit_is_bounded() {
        let config = load(&[("INBOX_TRIAGE_INBOX_LIMIT", "15")]).expect("upper bound");
        assert_eq!(config.inbox_limit, 15);
        let config = load(&[("INBOX_TRIAGE_INBOX_LIMIT", "1")]).expect("lower bound");
        assert_eq!(config.inbox_limit, 1);
        for raw in ["0", "16", "100"] {
            let err = load(&[("INBOX_TRIAGE_INBOX_LIMIT", raw)]).expect_err("out of range");
            assert!(err.to_string().contains("INBOX_TRIAGE_INBOX_LIMIT must be in range"));
        }
    }

    #[test]
    fn body_max_chars_is_bounded() {
        let config = load(&[("INBOX_TRIAGE_BODY_MAX_CHARS", "2000")]).expect("upper bound");
        assert_eq!(config.body_max_chars, 2000);
        for raw in ["0", "2001", "50000"] {
            let err = load(&[("INBOX_TRIAGE_BODY_MAX_CHARS", raw)]).expect_err("out of range");
            assert!(err.to_string().contains("INBOX_TRIAGE_BODY_MAX_CHARS must be in range"));
        }
    }

    #[test]
    fn malformed_numbers_and_zero_concurrency_fail() {
        let err = load(&[("INBOX_TRIAGE_REQUEST_TIMEOUT_MS", "soon")]).expect_err("not a number");
        assert!(err.to_string().contains("invalid u64 environment variable"));

        let err = load(&[("INBOX_TRIAGE_CLASSIFY_CONCURRENCY", "0")]).expect_err("zero");
        assert!(err.to_string().contains("at least 1"));

        let err = load(&[("INBOX_TRIAGE_BIND", "localhost")]).expect_err("no port");
        assert!(err.to_string().contains("invalid socket address"));
    }

    #[test]
    fn optional_values_are_trimmed() {
        let config = load(&[
            ("INBOX_TRIAGE_ACCOUNT_ADDRESS", "  me@example.com "),
            ("INBOX_TRIAGE_CLASSIFY_CONCURRENCY", "4"),
        ])
        .expect("config loads");
        assert_eq!(config.account_address.as_deref(), Some("me@example.com"));
        assert_eq!(config.classify_concurrency, 4);
    }
}
