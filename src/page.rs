//! Server-rendered inbox page
//!
//! Plain string templating; every message-derived value is HTML-escaped and
//! message ids are URL-encoded before they reach an attribute.

use std::fmt::Write as _;

use chrono::Utc;
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::models::MessageSummary;

const LANGUAGES: [&str; 5] = ["English", "Hindi", "Telugu", "Kannada", "Malayalam"];

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Inbox triage</title>
<style>
body { font-family: system-ui, sans-serif; margin: 2rem; max-width: 60rem; }
table { border-collapse: collapse; width: 100%; }
td, th { padding: .4rem .6rem; border-bottom: 1px solid #ddd; text-align: left; }
.urgency-High { color: #b00020; font-weight: bold; }
.urgency-Medium { color: #a06000; }
.urgency-Low { color: #2e7d32; }
#draft { width: 100%; min-height: 12rem; }
</style>
</head>
<body>
<h1>Inbox</h1>
"#;

const PAGE_SCRIPT: &str = r#"<section id="panel" hidden>
<h2 id="panel-subject"></h2>
<p>Urgency: <span id="panel-urgency"></span> &middot; Sentiment: <span id="panel-sentiment"></span></p>
<pre id="panel-body"></pre>
<textarea id="draft"></textarea>
<p><button id="send">Send reply</button> <span id="status"></span></p>
</section>
<script>
let current = null;
document.querySelectorAll("a.analyze").forEach((link) => {
  link.addEventListener("click", async (ev) => {
    ev.preventDefault();
    const lang = document.getElementById("lang").value;
    const res = await fetch(link.getAttribute("href") + "?lang=" + encodeURIComponent(lang));
    const data = await res.json();
    if (!res.ok) { document.getElementById("status").textContent = data.error; return; }
    current = link.dataset.id;
    document.getElementById("panel").hidden = false;
    document.getElementById("panel-subject").textContent = data.subject;
    document.getElementById("panel-urgency").textContent = data.urgency;
    document.getElementById("panel-sentiment").textContent = data.sentiment;
    document.getElementById("panel-body").textContent = data.body;
    document.getElementById("draft").value = data.reply;
    document.getElementById("status").textContent = "";
  });
});
document.getElementById("send").addEventListener("click", async () => {
  const res = await fetch("/send_reply", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({ msg_id: current, reply: document.getElementById("draft").value }),
  });
  const data = await res.json();
  document.getElementById("status").textContent = res.ok ? "Sent" : data.error;
});
</script>
</body>
</html>
"#;

/// Render the inbox listing page
pub fn render_inbox(messages: &[MessageSummary]) -> String {
    let mut html = String::from(PAGE_HEAD);
    let _ = writeln!(
        html,
        "<p>Refreshed {} &middot; {} message(s)</p>",
        Utc::now().format("%Y-%m-%d %H:%M UTC"),
        messages.len()
    );

    html.push_str("<label>Reply language <select id=\"lang\">");
    for lang in LANGUAGES {
        let _ = write!(html, "<option>{lang}</option>");
    }
    html.push_str("</select></label>\n");

    if messages.is_empty() {
        html.push_str("<p>Nothing to triage.</p>\n");
    } else {
        html.push_str(
            "<table>\n<tr><th>Urgency</th><th>From</th><th>Subject</th><th></th></tr>\n",
        );
        for message in messages {
            push_row(&mut html, message);
        }
        html.push_str("</table>\n");
    }

    html.push_str(PAGE_SCRIPT);
    html
}

fn push_row(html: &mut String, message: &MessageSummary) {
    let href = format!("/analyze/{}", urlencoding::encode(&message.id));
    let _ = writeln!(
        html,
        "<tr><td class=\"urgency-{urgency}\">{urgency}</td><td>{from}</td><td>{subject}</td>\
         <td><a class=\"analyze\" data-id=\"{id}\" href=\"{href}\">Analyze</a></td></tr>",
        urgency = message.urgency.as_str(),
        from = encode_text(&message.from),
        subject = encode_text(&message.subject),
        id = encode_double_quoted_attribute(&message.id),
        href = encode_double_quoted_attribute(&href),
    );
}
