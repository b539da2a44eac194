//! Prompts and defensive parsing of completion output
//!
//! The completion backend gives no schema guarantee, so everything read back
//! from it is coerced into the closed `Urgency`/`Sentiment` sets. Failures
//! degrade to defaults and are never propagated.

use serde::Deserialize;
use tracing::warn;

use crate::completion::Completion;
use crate::models::{Sentiment, Urgency};

/// Prompt asking for a one-word urgency label for `subject`
pub fn urgency_prompt(subject: &str) -> String {
    format!(
        "\nReturn ONLY one word: Low, Medium, or High.\n\nEmail subject:\n{subject}\n"
    )
}

/// Prompt asking for the structured urgency/sentiment/reply object
pub fn analysis_prompt(language: &str, body: &str) -> String {
    format!(
        r#"
Return JSON:

{{
 "urgency":"Low/Medium/High",
 "sentiment":"Positive/Neutral/Negative",
 "reply":"plain text reply only"
}}

Rules:
- Reply in {language}
- No greeting
- No signature

EMAIL:
{body}
"#
    )
}

/// Classify a subject line; any completion failure yields `Medium`
pub async fn classify_urgency(completion: &dyn Completion, subject: &str) -> Urgency {
    match completion.complete(&urgency_prompt(subject)).await {
        Ok(text) => Urgency::from_completion(&text),
        Err(e) => {
            warn!("urgency classification unavailable, defaulting to Medium: {e}");
            Urgency::default()
        }
    }
}

/// Structured analysis as read back from the completion backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub urgency: Urgency,
    pub sentiment: Sentiment,
    /// Drafted reply, not yet stripped of echoed signatures
    pub reply: String,
}

impl Analysis {
    /// Medium / Neutral with the given reply text
    pub fn fallback(reply: impl Into<String>) -> Self {
        Self {
            urgency: Urgency::default(),
            sentiment: Sentiment::default(),
            reply: reply.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    urgency: Option<serde_json::Value>,
    #[serde(default)]
    sentiment: Option<serde_json::Value>,
    reply: String,
}

/// Strict parse first, well-typed default on any failure
pub fn parse_or_default<T, E>(attempt: Result<T, E>, default: impl FnOnce(E) -> T) -> T {
    attempt.unwrap_or_else(default)
}

/// Parse completion text into an [`Analysis`]
///
/// Markdown code fences are removed before parsing. If the text is not a
/// JSON object with a string `reply`, the fallback carries the trimmed raw
/// text as the reply. Unknown urgency/sentiment labels become the defaults.
pub fn parse_analysis(raw: &str) -> Analysis {
    let trimmed = raw.trim();
    let unfenced = trimmed.replace("```json", "").replace("```", "");
    let parsed = serde_json::from_str::<RawAnalysis>(unfenced.trim()).map(|raw_analysis| Analysis {
        urgency: label(raw_analysis.urgency.as_ref())
            .and_then(Urgency::from_label)
            .unwrap_or_default(),
        sentiment: label(raw_analysis.sentiment.as_ref())
            .and_then(Sentiment::from_label)
            .unwrap_or_default(),
        reply: raw_analysis.reply,
    });
    parse_or_default(parsed, |e| {
        warn!("completion did not return the expected JSON object: {e}");
        Analysis::fallback(trimmed)
    })
}

fn label(value: Option<&serde_json::Value>) -> Option<&str> {
    value.and_then(serde_json::Value::as_str)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::{Analysis, analysis_prompt, classify_urgency, parse_analysis, urgency_prompt};
    use crate::completion::Completion;
    use crate::errors::{AppError, AppResult};
    use crate::models::{Sentiment, Urgency};

    struct Canned(AppResult<&'static str>);

    #[async_trait]
    impl Completion for Canned {
        async fn complete(&self, _prompt: &str) -> AppResult<String> {
            match &self.0 {
                Ok(text) => Ok((*text).to_owned()),
                Err(e) => Err(AppError::Completion(e.to_string())),
            }
        }
    }

    #[test]
    fn prompts_embed_inputs() {
        assert!(urgency_prompt("Server down").contains("Email subject:\nServer down"));
        let prompt = analysis_prompt("Telugu", "Body text");
        assert!(prompt.contains("- Reply in Telugu"));
        assert!(prompt.contains("EMAIL:\nBody text"));
        assert!(prompt.contains("\"urgency\":\"Low/Medium/High\""));
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"urgency\":\"High\",\"sentiment\":\"Negative\",\"reply\":\"On it.\"}\n```";
        assert_eq!(
            parse_analysis(raw),
            Analysis {
                urgency: Urgency::High,
                sentiment: Sentiment::Negative,
                reply: "On it.".to_owned(),
            }
        );
    }

    #[test]
    fn garbage_falls_back_to_raw_text() {
        let analysis = parse_analysis("  Sure! Here is a reply: thanks.  ");
        assert_eq!(analysis, Analysis::fallback("Sure! Here is a reply: thanks."));
    }

    #[test]
    fn missing_reply_falls_back() {
        let analysis = parse_analysis("{\"urgency\":\"Low\"}");
        assert_eq!(analysis.urgency, Urgency::Medium);
        assert_eq!(analysis.reply, "{\"urgency\":\"Low\"}");
    }

    #[test]
    fn unknown_labels_are_coerced_to_defaults() {
        let analysis =
            parse_analysis("{\"urgency\":\"Critical\",\"sentiment\":42,\"reply\":\"ok\"}");
        assert_eq!(analysis.urgency, Urgency::Medium);
        assert_eq!(analysis.sentiment, Sentiment::Neutral);
        assert_eq!(analysis.reply, "ok");

        let analysis = parse_analysis("{\"urgency\":\"low\",\"reply\":\"ok\"}");
        assert_eq!(analysis.urgency, Urgency::Low);
        assert_eq!(analysis.sentiment, Sentiment::Neutral);
    }

    #[tokio::test]
    async fn classification_degrades_to_medium() {
        assert_eq!(
            classify_urgency(&Canned(Ok("HIGH")), "x").await,
            Urgency::High
        );
        assert_eq!(classify_urgency(&Canned(Ok("")), "x").await, Urgency::Medium);
        assert_eq!(
            classify_urgency(&Canned(Err(AppError::Completion("down".to_owned()))), "x").await,
            Urgency::Medium
        );
    }
}
