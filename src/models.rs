//! Mailbox records, HTTP DTOs, and classification enums
//!
//! Mailbox records mirror the Gmail REST JSON shape (camelCase on the wire).
//! HTTP DTOs are what the handlers accept and return.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Message stub returned by the list endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    /// Opaque message id
    pub id: String,
    /// Conversation the message belongs to
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Response of `users/me/messages` (list)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    /// Absent entirely when the mailbox is empty
    #[serde(default)]
    pub messages: Vec<MessageRef>,
}

/// Response of `users/me/profile`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub email_address: String,
}

/// Single RFC 822 header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Body payload of a MIME part
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    /// Set when the content lives in a separate attachment resource
    #[serde(default)]
    pub attachment_id: Option<String>,
    /// Decoded size in bytes
    #[serde(default)]
    pub size: u64,
    /// Base64url-encoded content
    #[serde(default)]
    pub data: Option<String>,
}

/// Node of the MIME body tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub part_id: Option<String>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// Message record as returned by `users/me/messages/{id}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub payload: MessagePart,
}

impl MailMessage {
    /// First header value matching `name` (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Whether the label set contains `label`
    pub fn has_label(&self, label: &str) -> bool {
        self.label_ids.iter().any(|l| l == label)
    }
}

/// Request body for `users/me/messages/send`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Base64url-encoded RFC 822 message
    pub raw: String,
    pub thread_id: String,
}

/// Mailbox acknowledgement of a sent message
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendConfirmation {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// How much of a message the mailbox should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat<'a> {
    /// Headers listed in the slice plus labels and thread id
    Metadata(&'a [&'a str]),
    /// Headers and the full MIME body tree
    Full,
}

/// Three-level urgency label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
}

impl Urgency {
    /// Classify free-form completion text
    ///
    /// Case-insensitive substring match: "high" wins over "low", anything
    /// else is `Medium`.
    pub fn from_completion(text: &str) -> Self {
        let lowered = text.trim().to_lowercase();
        if lowered.contains("high") {
            Self::High
        } else if lowered.contains("low") {
            Self::Low
        } else {
            Self::Medium
        }
    }

    /// Exact label match (case-insensitive), `None` for anything else
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-level sentiment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    /// Exact label match (case-insensitive), `None` for anything else
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }
}

/// One row of the inbox listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    pub id: String,
    pub subject: String,
    /// Raw From header, display name included
    pub from: String,
    pub urgency: Urgency,
}

/// JSON body of `GET /api/inbox`
#[derive(Debug, Clone, Serialize)]
pub struct InboxResponse {
    pub messages: Vec<MessageSummary>,
}

/// Query string of `GET /analyze/{msg_id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeParams {
    #[serde(default)]
    pub lang: Option<String>,
}

/// JSON body of `GET /analyze/{msg_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageDetail {
    pub subject: String,
    pub from: String,
    /// Normalized body, truncated for display
    pub body: String,
    pub urgency: Urgency,
    pub sentiment: Sentiment,
    /// Greeting, drafted reply, and signature
    pub reply: String,
}

/// JSON body of `POST /send_reply`
///
/// Both fields are optional at the serde level so a missing field reaches
/// validation as `InvalidInput` instead of an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendReplyRequest {
    #[serde(default)]
    pub msg_id: Option<String>,
    #[serde(default)]
    pub reply: Option<String>,
}

/// JSON body returned after a reply was submitted
#[derive(Debug, Clone, Serialize)]
pub struct SendReplyResponse {
    pub status: &'static str,
}
