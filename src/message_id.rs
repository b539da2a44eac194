//! Mailbox message id validation
//!
//! Message ids are opaque strings assigned by the mailbox service. They are
//! interpolated into API URL paths, so every id coming from a request is
//! validated here before any external call is made.

use std::fmt;

use crate::errors::{AppError, AppResult};

/// Maximum accepted id length
const MAX_ID_LEN: usize = 256;

/// Validated mailbox message id
///
/// Only ASCII alphanumerics, `-` and `_` are accepted, which covers the hex
/// ids the mailbox issues and rules out path separators and query syntax.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    /// Parse and validate a raw message id
    ///
    /// Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the id is empty, longer than 256 characters, or
    ///   contains characters outside `[A-Za-z0-9_-]`
    ///
    /// # Example
    ///
    /// ```
    /// let id = MessageId::parse("18c2f0a9b7d1e3f4").unwrap();
    /// assert_eq!(id.as_str(), "18c2f0a9b7d1e3f4");
    /// ```
    pub fn parse(raw: &str) -> AppResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid("msg_id must not be empty"));
        }
        if trimmed.len() > MAX_ID_LEN {
            return Err(AppError::invalid(format!(
                "msg_id must be at most {MAX_ID_LEN} characters"
            )));
        }
        if !trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            return Err(AppError::invalid("msg_id must match [A-Za-z0-9_-]+"));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
