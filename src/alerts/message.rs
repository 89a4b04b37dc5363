//! Alert payloads and their rendering as Telegram HTML messages.

use std::borrow::Cow;
use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset};

/// Longest user agent shown in an alert.
pub const MAX_USER_AGENT_CHARS: usize = 40;
/// Longest parameter value shown in an alert.
pub const MAX_PARAM_CHARS: usize = 30;
/// Longest error or detail text shown in an alert.
pub const MAX_ERROR_CHARS: usize = 100;
/// Parameters beyond this many are summarized as a count.
pub const MAX_PARAMS: usize = 10;

/// What happened to the request an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Refused by the admission gate.
    Blocked,
    /// The client exhausted its spam window.
    SpamAlert,
    /// A handler accepted the request and started working on it.
    Processing,
    Success,
    Error,
}

impl EventKind {
    fn title(self) -> &'static str {
        match self {
            EventKind::Blocked => "🚫 BLOCKED REQUEST",
            EventKind::SpamAlert => "🚫 SPAM ALERT",
            EventKind::Processing | EventKind::Success | EventKind::Error => {
                "📊 API Request Report"
            }
        }
    }

    fn label(self) -> &'static str {
        match self {
            EventKind::Blocked => "⛔ Blocked",
            EventKind::SpamAlert => "⛔ Spam",
            EventKind::Processing => "⏳ Processing",
            EventKind::Success => "✅ Success",
            EventKind::Error => "❌ Error",
        }
    }
}

/// Status tag handlers attach to their own reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    Processing,
    Success,
    Error,
}

impl From<ReportStatus> for EventKind {
    fn from(status: ReportStatus) -> Self {
        match status {
            ReportStatus::Processing => EventKind::Processing,
            ReportStatus::Success => EventKind::Success,
            ReportStatus::Error => EventKind::Error,
        }
    }
}

/// Request metadata carried into alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub method: String,
    pub path: String,
    pub client_id: String,
    pub user_agent: String,
}

/// One alert waiting to be rendered.
#[derive(Debug, Clone)]
pub struct Alert {
    pub kind: EventKind,
    pub endpoint: String,
    pub meta: RequestMeta,
    pub params: Vec<(String, String)>,
    pub detail: Option<String>,
    pub error: Option<String>,
}

impl Alert {
    pub fn new(kind: EventKind, endpoint: &str, meta: RequestMeta) -> Self {
        Self {
            kind,
            endpoint: endpoint.to_string(),
            meta,
            params: Vec::new(),
            detail: None,
            error: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Render as a Telegram HTML message. All request-derived text is escaped.
    pub fn render(&self, at: DateTime<FixedOffset>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "<b>{}</b>\n", self.kind.title());
        let _ = writeln!(out, "<b>🔧 Endpoint:</b> <code>{}</code>", escape_html(&self.endpoint));
        let _ = writeln!(out, "<b>⚡ Method:</b> {}", escape_html(&self.meta.method));
        let _ = writeln!(out, "<b>📅 Time:</b> {}", format_timestamp(at));
        let _ = writeln!(out, "<b>🌐 IP:</b> <code>{}</code>", escape_html(&self.meta.client_id));
        let _ = writeln!(
            out,
            "<b>📱 Agent:</b> {}",
            escape_html(&truncate(&self.meta.user_agent, MAX_USER_AGENT_CHARS))
        );
        let _ = writeln!(out, "<b>📌 Status:</b> {}", self.kind.label());

        if let Some(detail) = &self.detail {
            let _ = writeln!(
                out,
                "<b>📝 Detail:</b> {}",
                escape_html(&truncate(detail, MAX_ERROR_CHARS))
            );
        }

        if !self.params.is_empty() {
            out.push_str("\n<b>📋 Parameters:</b>\n");
            for (key, value) in self.params.iter().take(MAX_PARAMS) {
                let _ = writeln!(
                    out,
                    "• <b>{}:</b> <code>{}</code>",
                    escape_html(&truncate(key, MAX_PARAM_CHARS)),
                    escape_html(&truncate(value, MAX_PARAM_CHARS))
                );
            }
            if self.params.len() > MAX_PARAMS {
                let _ = writeln!(out, "• … {} more", self.params.len() - MAX_PARAMS);
            }
        }

        if self.kind == EventKind::Error {
            if let Some(error) = &self.error {
                let _ = writeln!(
                    out,
                    "\n<b>❌ Error:</b> {}",
                    escape_html(&truncate(error, MAX_ERROR_CHARS))
                );
            }
        }

        out.truncate(out.trim_end().len());
        out
    }
}

/// Cut `s` to at most `max` characters, appending `...` when shortened.
pub fn truncate(s: &str, max: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max) {
        Some((idx, _)) => Cow::Owned(format!("{}...", &s[..idx])),
        None => Cow::Borrowed(s),
    }
}

/// Escape the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(s: &str) -> Cow<'_, str> {
    if !s.contains(['<', '>', '&']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Local wall-clock time as shown in alerts, e.g. `16 Oct 2026, 21:04:05 (UTC+07:00)`.
pub fn format_timestamp(at: DateTime<FixedOffset>) -> String {
    at.format("%d %b %Y, %H:%M:%S (UTC%:z)").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn meta() -> RequestMeta {
        RequestMeta {
            method: "POST".into(),
            path: "/api/ai/chat".into(),
            client_id: "1.2.3.4".into(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)".into(),
        }
    }

    fn at() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 16, 21, 4, 5)
            .unwrap()
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly-10", 10), "exactly-10");
        assert_eq!(truncate("abcdefghijk", 10), "abcdefghij...");
        // Multi-byte characters are counted, not bytes.
        assert_eq!(truncate("ééééé", 3), "ééé...");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("plain"), "plain");
        assert_eq!(escape_html("<b>&</b>"), "&lt;b&gt;&amp;&lt;/b&gt;");
    }

    #[test]
    fn test_timestamp_uses_offset() {
        assert_eq!(format_timestamp(at()), "16 Oct 2026, 21:04:05 (UTC+07:00)");
    }

    #[test]
    fn test_render_report() {
        let text = Alert::new(EventKind::Success, "/api/ai/chat", meta())
            .with_param("prompt", "You are a helpful assistant that answers briefly")
            .with_param("text", "<script>")
            .render(at());

        assert!(text.starts_with("<b>📊 API Request Report</b>"));
        assert!(text.contains("<code>/api/ai/chat</code>"));
        assert!(text.contains("<b>⚡ Method:</b> POST"));
        assert!(text.contains("<code>1.2.3.4</code>"));
        assert!(text.contains("Mozilla/5.0 (X11; Linux x86_64) AppleWeb..."));
        assert!(text.contains("<code>You are a helpful assistant th...</code>"));
        assert!(text.contains("<code>&lt;script&gt;</code>"));
        assert!(text.contains("✅ Success"));
        assert!(!text.contains("Error:"));
    }

    #[test]
    fn test_render_error_includes_truncated_error() {
        let long = "x".repeat(150);
        let text = Alert::new(EventKind::Error, "/api/ai/chat", meta())
            .with_error(long)
            .render(at());

        let expected = format!("<b>❌ Error:</b> {}...", "x".repeat(100));
        assert!(text.ends_with(&expected));
    }

    #[test]
    fn test_error_text_ignored_for_other_kinds() {
        let text = Alert::new(EventKind::Success, "/x", meta())
            .with_error("boom")
            .render(at());
        assert!(!text.contains("boom"));
    }

    #[test]
    fn test_params_are_bounded() {
        let params = (0..13).map(|i| (format!("k{i}"), i));
        let text = Alert::new(EventKind::Processing, "/x", meta())
            .with_params(params)
            .render(at());

        assert!(text.contains("<b>k9:</b>"));
        assert!(!text.contains("<b>k10:</b>"));
        assert!(text.contains("• … 3 more"));
    }

    #[test]
    fn test_render_blocked() {
        let text = Alert::new(EventKind::Blocked, "/api/ai/chat", meta())
            .with_param("reason", "rate_limit")
            .with_detail("Please wait 2 seconds")
            .render(at());

        assert!(text.starts_with("<b>🚫 BLOCKED REQUEST</b>"));
        assert!(text.contains("<b>📝 Detail:</b> Please wait 2 seconds"));
        assert!(text.contains("<code>rate_limit</code>"));
    }
}
