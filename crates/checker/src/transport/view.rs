// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded HTML views. Placeholders are `{{name}}`; every value is escaped.

use crate::callback::PayloadShape;

const INDEX_HTML: &str = include_str!("../web/index.html");
const AUTH_HTML: &str = include_str!("../web/auth.html");
const ERROR_HTML: &str = include_str!("../web/error.html");

/// Escape text for use in HTML element content and quoted attributes.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Substitute `{{name}}` placeholders in one pass so inserted values are
/// never re-scanned. Unknown placeholders are left as-is.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            rest = &rest[start..];
            break;
        };
        let name = &after[..end];
        match values.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + end + 4]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

pub fn index_page(authorize_url: &str, flashes: &[String], expires_at: Option<&str>) -> String {
    let flashes: String = flashes
        .iter()
        .map(|msg| format!("<li class=\"flash\">{}</li>\n", escape_html(msg)))
        .collect();
    let token_status = match expires_at {
        Some(at) => format!("current token expires at {}", escape_html(at)),
        None => "no valid token is stored".to_owned(),
    };
    render(
        INDEX_HTML,
        &[
            ("flashes", &flashes),
            ("token_status", &token_status),
            ("authorize_url", &escape_html(authorize_url)),
        ],
    )
}

pub fn auth_page(shape: PayloadShape) -> String {
    render(AUTH_HTML, &[("shape", &shape.to_string())])
}

pub fn error_page(message: &str) -> String {
    render(ERROR_HTML, &[("message", &escape_html(message))])
}

#[cfg(test)]
#[path = "view_tests.rs"]
mod tests;
