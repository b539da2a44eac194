//! Reply composition and threading envelope
//!
//! Per-language greeting/signature lookup, cleanup of model-drafted reply
//! text, and construction of the minimal RFC 822 message used to answer a
//! thread.

use std::fmt::Write as _;
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use mailparse::MailAddr;
use regex::Regex;

static ECHOED_SIGNATURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)best regards.*").expect("static regex"));

/// Languages with dedicated greeting/signature templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    Hindi,
    Telugu,
    Kannada,
    Malayalam,
}

/// Greeting and signature for one language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTemplate {
    pub greeting: &'static str,
    pub signature: &'static str,
}

impl Language {
    /// Match a language name exactly as the query string carries it
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "English" => Some(Self::English),
            "Hindi" => Some(Self::Hindi),
            "Telugu" => Some(Self::Telugu),
            "Kannada" => Some(Self::Kannada),
            "Malayalam" => Some(Self::Malayalam),
            _ => None,
        }
    }

    pub fn template(self) -> ReplyTemplate {
        let (greeting, signature) = match self {
            Self::English => ("Hi,", "Best regards,\nSai"),
            Self::Hindi => ("नमस्ते,", "सादर,\nSai"),
            Self::Telugu => ("హాయ్,", "శుభాకాంక్షలతో,\nSai"),
            Self::Kannada => ("ನಮಸ್ಕಾರ,", "ಶುಭಾಶಯಗಳೊಂದಿಗೆ,\nSai"),
            Self::Malayalam => ("നമസ്കാരം,", "ആശംസകളോടെ,\nSai"),
        };
        ReplyTemplate {
            greeting,
            signature,
        }
    }
}

/// Template for a requested language name; unknown names get English
pub fn template_for(name: &str) -> ReplyTemplate {
    Language::from_name(name).unwrap_or_default().template()
}

/// Drop everything from the first "Best regards" (any case) onward, then trim
pub fn strip_echoed_signature(reply: &str) -> String {
    ECHOED_SIGNATURE.replace(reply, "").trim().to_owned()
}

/// `<greeting>\n\n<reply>\n\n<signature>`
pub fn compose_reply(template: ReplyTemplate, cleaned_reply: &str) -> String {
    format!(
        "{}\n\n{}\n\n{}",
        template.greeting, cleaned_reply, template.signature
    )
}

/// Prefix with `Re: ` unless already prefixed (case-insensitive)
pub fn reply_subject(subject: &str) -> String {
    let already = subject
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("re:"));
    if already {
        subject.to_owned()
    } else {
        format!("Re: {subject}")
    }
}

/// Address portion of a From-style header, display name discarded
pub fn sender_address(raw: &str) -> Option<String> {
    let parsed = mailparse::addrparse(raw).ok()?;
    let first = parsed.iter().next()?;
    let addr = match first {
        MailAddr::Single(single) => single.addr.clone(),
        MailAddr::Group(group) => group.addrs.first()?.addr.clone(),
    };
    let addr = addr.trim().to_owned();
    (!addr.is_empty()).then_some(addr)
}

/// Ephemeral reply message, built for one send and discarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEnvelope {
    pub to: String,
    pub subject: String,
    /// Message-ID of the original, used for In-Reply-To and References
    pub in_reply_to: Option<String>,
    pub body: String,
}

impl ReplyEnvelope {
    /// Render as a plain-text RFC 822 message with CRLF line endings
    pub fn to_rfc822(&self) -> String {
        let mut message = String::new();
        let _ = write!(message, "To: {}\r\n", self.to);
        let _ = write!(message, "Subject: {}\r\n", self.subject);
        if let Some(message_id) = &self.in_reply_to {
            let _ = write!(message, "In-Reply-To: {message_id}\r\n");
            let _ = write!(message, "References: {message_id}\r\n");
        }
        message.push_str("Content-Type: text/plain; charset=UTF-8\r\n");
        message.push_str("\r\n");
        message.push_str(&self.body);
        message
    }

    /// Base64url form expected by the mailbox send call
    pub fn encode(&self) -> String {
        URL_SAFE.encode(self.to_rfc822().as_bytes())
    }
}
