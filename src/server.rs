//! HTTP server implementation with request handlers
//!
//! Builds the axum router and implements the inbox listing, message analysis,
//! and reply sending flows on top of the injected [`Mailbox`] and
//! [`Completion`] adapters. No state survives between requests.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::Html;
use axum::routing::{get, post};
use futures::StreamExt;
use serde_json::json;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::completion::Completion;
use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::gmail::Mailbox;
use crate::message_id::MessageId;
use crate::models::{
    AnalyzeParams, InboxResponse, MailMessage, MessageDetail, MessageFormat, MessageSummary,
    SendReplyRequest, SendReplyResponse,
};
use crate::reply::ReplyEnvelope;
use crate::triage::Analysis;
use crate::{mime, page, reply, triage};

/// Placeholder when the Subject header is absent
const NO_SUBJECT: &str = "No Subject";
/// Placeholder when the From header is absent
const UNKNOWN_SENDER: &str = "Unknown";
/// Reply language when the request names none
const DEFAULT_LANGUAGE: &str = "English";
/// Label the mailbox attaches to messages sent by the account
const SENT_LABEL: &str = "SENT";
/// Headers fetched for each listing row
const LISTING_HEADERS: &[&str] = &["Subject", "From"];
/// Headers fetched to thread a reply
const REPLY_HEADERS: &[&str] = &["From", "Subject", "Message-ID"];

/// Handler-facing subset of the server configuration
#[derive(Debug, Clone)]
pub struct TriageSettings {
    /// Own address; looked up from the mailbox profile when `None`
    pub account_address: Option<String>,
    pub inbox_limit: u32,
    pub body_max_chars: usize,
    pub classify_concurrency: usize,
}

impl From<&ServerConfig> for TriageSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            account_address: config.account_address.clone(),
            inbox_limit: config.inbox_limit,
            body_max_chars: config.body_max_chars,
            classify_concurrency: config.classify_concurrency,
        }
    }
}

/// Inbox triage server
///
/// Holds the adapters constructed once at startup; cloned into every
/// request via axum state.
#[derive(Clone)]
pub struct TriageServer {
    settings: Arc<TriageSettings>,
    mailbox: Arc<dyn Mailbox>,
    completion: Arc<dyn Completion>,
}

impl TriageServer {
    pub fn new(
        settings: TriageSettings,
        mailbox: Arc<dyn Mailbox>,
        completion: Arc<dyn Completion>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            mailbox,
            completion,
        }
    }

    /// Build the HTTP router
    ///
    /// - `GET /` rendered inbox
    /// - `GET /api/inbox` inbox as JSON
    /// - `GET /analyze/{msg_id}?lang=` analysis and drafted reply
    /// - `POST /send_reply` threaded reply submission
    /// - `GET /healthz` liveness
    pub fn router(self) -> Router {
        Router::new()
            .route("/", get(home))
            .route("/api/inbox", get(inbox_json))
            .route("/analyze/{msg_id}", get(analyze))
            .route("/send_reply", post(send_reply))
            .route("/healthz", get(healthz))
            .with_state(self)
    }

    /// List, filter, and classify the most recent messages
    ///
    /// Mailbox order is preserved. Self-sent messages are skipped before any
    /// completion call is made for them.
    async fn list_inbox_impl(&self) -> AppResult<Vec<MessageSummary>> {
        let own_address = self.own_address().await?;
        let refs = self.mailbox.list_recent(self.settings.inbox_limit).await?;

        let mut candidates = Vec::with_capacity(refs.len());
        for stub in refs {
            let id = MessageId::parse(&stub.id).map_err(|e| {
                AppError::Mailbox(format!("mailbox listed an unusable message id: {e}"))
            })?;
            let message = self
                .mailbox
                .get(&id, MessageFormat::Metadata(LISTING_HEADERS))
                .await?;
            let subject = message.header("Subject").unwrap_or(NO_SUBJECT).to_owned();
            let from = message.header("From").unwrap_or(UNKNOWN_SENDER).to_owned();

            if is_self_sent(&message, &from, &own_address) {
                debug!(id = %id, "skipping self-sent message");
                continue;
            }
            candidates.push((id, subject, from));
        }

        let completion = self.completion.as_ref();
        let summaries = futures::stream::iter(candidates)
            .map(|(id, subject, from)| async move {
                let urgency = triage::classify_urgency(completion, &subject).await;
                MessageSummary {
                    id: id.to_string(),
                    subject,
                    from,
                    urgency,
                }
            })
            .buffered(self.settings.classify_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        info!(count = summaries.len(), "inbox listed");
        Ok(summaries)
    }

    /// Fetch one message, extract its body, and draft a reply
    async fn analyze_impl(&self, raw_id: &str, lang: Option<String>) -> AppResult<MessageDetail> {
        let id = MessageId::parse(raw_id)?;
        let language = lang
            .map(|l| l.trim().to_owned())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_owned());

        let message = self.mailbox.get(&id, MessageFormat::Full).await?;
        let subject = message.header("Subject").unwrap_or(NO_SUBJECT).to_owned();
        let from = message.header("From").unwrap_or(UNKNOWN_SENDER).to_owned();
        let body = mime::extract_body(&message.payload);

        let prompt = triage::analysis_prompt(&language, &body);
        let analysis = match self.completion.complete(&prompt).await {
            Ok(text) => triage::parse_analysis(&text),
            Err(e) => {
                warn!(id = %id, "analysis completion failed, using fallback: {e}");
                Analysis::fallback("")
            }
        };

        let cleaned = reply::strip_echoed_signature(&analysis.reply);
        let composed = reply::compose_reply(reply::template_for(&language), &cleaned);

        info!(id = %id, language = %language, urgency = %analysis.urgency, "message analyzed");
        Ok(MessageDetail {
            subject,
            from,
            body: mime::truncate_chars(body, self.settings.body_max_chars),
            urgency: analysis.urgency,
            sentiment: analysis.sentiment,
            reply: composed,
        })
    }

    /// Validate input, rebuild threading headers, and submit the reply
    async fn send_reply_impl(&self, input: SendReplyRequest) -> AppResult<SendReplyResponse> {
        let raw_id = non_blank(input.msg_id).ok_or_else(|| AppError::invalid("msg_id is required"))?;
        let body = non_blank(input.reply).ok_or_else(|| AppError::invalid("reply is required"))?;
        let id = MessageId::parse(&raw_id)?;

        let original = self
            .mailbox
            .get(&id, MessageFormat::Metadata(REPLY_HEADERS))
            .await
            .map_err(AppError::into_send)?;

        let from = original
            .header("From")
            .ok_or_else(|| AppError::Send("original message has no From header".to_owned()))?;
        let to = reply::sender_address(from).ok_or_else(|| {
            AppError::Send(format!("cannot parse sender address from '{from}'"))
        })?;
        if original.thread_id.is_empty() {
            return Err(AppError::Send(
                "original message has no thread id".to_owned(),
            ));
        }

        let envelope = ReplyEnvelope {
            to,
            subject: reply::reply_subject(original.header("Subject").unwrap_or(NO_SUBJECT)),
            in_reply_to: original.header("Message-ID").map(str::to_owned),
            body,
        };

        let confirmation = self
            .mailbox
            .send(&original.thread_id, &envelope.encode())
            .await
            .map_err(AppError::into_send)?;

        info!(
            id = %id,
            thread_id = %original.thread_id,
            sent_id = %confirmation.id,
            "reply sent"
        );
        Ok(SendReplyResponse { status: "sent" })
    }

    async fn own_address(&self) -> AppResult<String> {
        match &self.settings.account_address {
            Some(address) => Ok(address.clone()),
            None => self.mailbox.account_address().await,
        }
    }
}

/// Sent by the account itself: SENT label, or sender equals own address
fn is_self_sent(message: &MailMessage, from: &str, own_address: &str) -> bool {
    message.has_label(SENT_LABEL)
        || reply::sender_address(from).is_some_and(|addr| addr.eq_ignore_ascii_case(own_address))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn request_span(route: &'static str) -> tracing::Span {
    info_span!("request", route, request_id = %Uuid::new_v4())
}

async fn home(State(server): State<TriageServer>) -> AppResult<Html<String>> {
    let messages = server
        .list_inbox_impl()
        .instrument(request_span("home"))
        .await?;
    Ok(Html(page::render_inbox(&messages)))
}

async fn inbox_json(State(server): State<TriageServer>) -> AppResult<Json<InboxResponse>> {
    let messages = server
        .list_inbox_impl()
        .instrument(request_span("inbox"))
        .await?;
    Ok(Json(InboxResponse { messages }))
}

async fn analyze(
    State(server): State<TriageServer>,
    Path(msg_id): Path<String>,
    Query(params): Query<AnalyzeParams>,
) -> AppResult<Json<MessageDetail>> {
    let detail = server
        .analyze_impl(&msg_id, params.lang)
        .instrument(request_span("analyze"))
        .await?;
    Ok(Json(detail))
}

async fn send_reply(
    State(server): State<TriageServer>,
    payload: Result<Json<SendReplyRequest>, JsonRejection>,
) -> AppResult<Json<SendReplyResponse>> {
    let Json(input) = payload.map_err(|rejection| AppError::invalid(rejection.body_text()))?;
    let response = server
        .send_reply_impl(input)
        .instrument(request_span("send_reply"))
        .await?;
    Ok(Json(response))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
