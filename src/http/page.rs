//! HTML rendering of a [`StatusSnapshot`].

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::core::StatusSnapshot;

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn ts(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn uptime(secs: u64) -> String {
    let (d, rem) = (secs / 86_400, secs % 86_400);
    let (h, rem) = (rem / 3_600, rem % 3_600);
    let (m, s) = (rem / 60, rem % 60);
    if d > 0 {
        format!("{d}d {h}h {m}m {s}s")
    } else {
        format!("{h}h {m}m {s}s")
    }
}

/// Renders the status page. Every value comes from the snapshot, which only
/// carries masked credentials and masked error text.
pub(crate) fn render(s: &StatusSnapshot, now: DateTime<Utc>) -> String {
    let mut html = String::with_capacity(1024 + s.handles.len() * 256);
    html.push_str("<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>linkvisor</title></head><body>\n");
    let _ = writeln!(
        html,
        "<h1>Your account is alive!</h1>\n<p>{}</p>",
        now.format("%a %b %d %Y %H:%M:%S UTC")
    );
    let _ = writeln!(
        html,
        "<p>mode: <b>{}</b> &middot; uptime: {} &middot; accounts: {} ({} connected) &middot; sweeps: {}</p>",
        s.mode,
        uptime(s.uptime_secs),
        s.handle_count,
        s.connected,
        s.sweeps
    );

    html.push_str("<table border=\"1\" cellpadding=\"4\">\n<tr><th>#</th><th>account</th><th>state</th><th>errors</th><th>consecutive</th><th>last error</th><th>backoff</th><th>last reconnect</th><th>next reconnect</th><th>token</th></tr>\n");
    for h in &s.handles {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}s</td><td>{}</td><td>{}</td><td><code>{}</code></td></tr>",
            h.id,
            escape(&h.display_name()),
            h.state,
            h.error_count,
            h.consecutive_errors,
            escape(h.last_error.as_deref().unwrap_or("-")),
            h.backoff_ms / 1000,
            ts(h.last_reconnect_at),
            ts(h.next_reconnect_at),
            escape(&h.credential),
        );
    }
    html.push_str("</table>\n</body></html>\n");
    html
}
