//! Confirmation email templates.
//!
//! Three templates (failed, missing data, success) share one header and one
//! footer. The renderer is pure: dates arrive pre-formatted in an
//! [`EventSummary`].

use std::fmt::Write;

use chrono_tz::Tz;
use url::Url;

use super::classification::Outcome;
use crate::domain::time::format_long;
use crate::domain::{AccessId, EventRegistration, FieldKey};

const NOT_SPECIFIED: &str = "Nicht angegeben";

const DISCLAIMER: &str = "Diese Angaben wurden automatisch aus deiner E-Mail ausgelesen und \
    können fehlerhaft sein. Du kannst sie nur so lange bearbeiten, bis das Technik-Team die \
    Veranstaltung angenommen hat.";

/// Display values of the registration fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSummary {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl EventSummary {
    /// Builds display values, formatting dates as long German strings in `tz`.
    pub fn from_registration(registration: &EventRegistration, tz: Tz) -> Self {
        Self {
            title: registration.title.clone(),
            description: registration.description.clone(),
            location: registration.location.clone(),
            start: registration.start.map(|start| format_long(start, tz)),
            end: registration.end.map(|end| format_long(end, tz)),
        }
    }

    fn value(&self, key: FieldKey) -> &str {
        let value = match key {
            FieldKey::Title => &self.title,
            FieldKey::Description => &self.description,
            FieldKey::Location => &self.location,
            FieldKey::Start => &self.start,
            FieldKey::End => &self.end,
        };
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(NOT_SPECIFIED)
    }
}

/// A rendered confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Renders confirmation emails with links into the public site.
#[derive(Debug, Clone)]
pub struct ConfirmationRenderer {
    site_url: Url,
}

impl ConfirmationRenderer {
    pub fn new(site_url: Url) -> Self {
        Self { site_url }
    }

    /// Public page where the registration can be viewed and edited.
    pub fn access_url(&self, access_id: &AccessId) -> String {
        format!(
            "{}/email-event/{}",
            self.site_url.as_str().trim_end_matches('/'),
            access_id
        )
    }

    pub fn render(
        &self,
        outcome: &Outcome,
        summary: &EventSummary,
        access_id: &AccessId,
    ) -> RenderedEmail {
        let link = self.access_url(access_id);
        let (html_body, text_body) = match outcome {
            Outcome::Failed { reason } => failed_body(reason, &link),
            Outcome::MissingData { missing } => missing_data_body(summary, missing, &link),
            Outcome::Success => success_body(summary, &link),
        };

        RenderedEmail {
            subject: outcome.subject().to_string(),
            html: layout(&html_body),
            text: format!("{text_body}\n\n--\n{DISCLAIMER}\n"),
        }
    }
}

fn layout(body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="de">
<head><meta charset="utf-8"><title>Veranstaltungen</title></head>
<body style="margin:0;padding:0;background:#f4f4f5;font-family:Arial,Helvetica,sans-serif;color:#18181b;">
<table role="presentation" width="100%" cellpadding="0" cellspacing="0">
<tr><td align="center" style="padding:24px;">
<table role="presentation" width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;">
<tr><td style="padding:24px;background:#1e3a8a;color:#ffffff;border-radius:8px 8px 0 0;font-size:20px;font-weight:bold;">Veranstaltungen</td></tr>
<tr><td style="padding:24px;">
{body}
</td></tr>
<tr><td style="padding:16px 24px;font-size:12px;color:#71717a;border-top:1px solid #e4e4e7;">{DISCLAIMER}</td></tr>
</table>
</td></tr>
</table>
</body>
</html>
"#
    )
}

fn button(link: &str, label: &str) -> String {
    format!(
        r#"<p style="margin:24px 0;"><a href="{}" style="display:inline-block;padding:12px 20px;background:#1e3a8a;color:#ffffff;text-decoration:none;border-radius:6px;">{}</a></p>"#,
        escape_html(link),
        label
    )
}

fn field_table(summary: &EventSummary) -> (String, String) {
    let mut html = String::from(
        r#"<table role="presentation" cellpadding="6" cellspacing="0" style="border-collapse:collapse;width:100%;">"#,
    );
    let mut text = String::new();

    for key in FieldKey::REQUIRED {
        let value = summary.value(key);
        let _ = write!(
            html,
            r#"<tr><td style="font-weight:bold;width:140px;vertical-align:top;">{}</td><td>{}</td></tr>"#,
            key.label(),
            escape_html(value)
        );
        let _ = writeln!(text, "{}: {}", key.label(), value);
    }
    html.push_str("</table>");

    (html, text)
}

fn failed_body(reason: &str, link: &str) -> (String, String) {
    let html = format!(
        r#"<h1 style="font-size:22px;margin:0 0 16px;">Verarbeitung fehlgeschlagen</h1>
<p>Deine E-Mail konnte leider nicht automatisch in eine Veranstaltung umgewandelt werden.</p>
<div style="padding:12px 16px;background:#fef2f2;border-left:4px solid #dc2626;color:#991b1b;">{}</div>
<p>Bitte trage die Veranstaltung manuell ein:</p>
{}"#,
        escape_html(reason),
        button(link, "Veranstaltung manuell eingeben")
    );
    let text = format!(
        "Verarbeitung fehlgeschlagen\n\n\
         Deine E-Mail konnte leider nicht automatisch in eine Veranstaltung umgewandelt werden.\n\
         Grund: {reason}\n\n\
         Bitte trage die Veranstaltung manuell ein: {link}"
    );
    (html, text)
}

fn missing_data_body(summary: &EventSummary, missing: &[FieldKey], link: &str) -> (String, String) {
    let (table_html, table_text) = field_table(summary);
    let labels: Vec<&str> = missing.iter().map(|key| key.label()).collect();
    let items: String = labels
        .iter()
        .map(|label| format!("<li>{label}</li>"))
        .collect();

    let html = format!(
        r#"<h1 style="font-size:22px;margin:0 0 16px;">Veranstaltung hinzugefügt, aber unvollständig</h1>
<p>Wir haben deine Veranstaltung angelegt. Einige Angaben fehlen noch:</p>
<div style="padding:12px 16px;background:#fffbeb;border-left:4px solid #f59e0b;"><ul style="margin:0;padding-left:20px;">{items}</ul></div>
<h2 style="font-size:16px;margin:24px 0 8px;">Erkannte Angaben</h2>
{table_html}
{}"#,
        button(link, "Angaben ergänzen")
    );
    let text = format!(
        "Veranstaltung hinzugefügt, aber unvollständig\n\n\
         Fehlende Angaben: {}\n\n\
         {table_text}\n\
         Angaben ergänzen: {link}",
        labels.join(", ")
    );
    (html, text)
}

fn success_body(summary: &EventSummary, link: &str) -> (String, String) {
    let (table_html, table_text) = field_table(summary);
    let html = format!(
        r#"<h1 style="font-size:22px;margin:0 0 16px;">Veranstaltung erfolgreich erstellt</h1>
<p>Deine Veranstaltung wurde mit folgenden Angaben angelegt:</p>
{table_html}
{}"#,
        button(link, "Veranstaltung ansehen")
    );
    let text = format!(
        "Veranstaltung erfolgreich erstellt\n\n\
         {table_text}\n\
         Veranstaltung ansehen: {link}"
    );
    (html, text)
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
