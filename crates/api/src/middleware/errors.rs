//! Content negotiation for error responses.
//!
//! Handlers produce errors as JSON by default. This layer re-renders them
//! according to the request's `Accept` header -- JSON envelope, plain HTML
//! error page, or text -- and widens the payload with diagnostics when the
//! deployment is development/test. A request that accepts none of those
//! gets HTTP 406.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;

use crate::error::ErrorPayload;
use crate::state::AppState;

/// Body formats we can negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Html,
    Text,
}

pub async fn negotiate_errors(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let accept = request
        .headers()
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let response = next.run(request).await;
    let Some(payload) = response.extensions().get::<ErrorPayload>().cloned() else {
        return response;
    };

    let expose_internals = state.config.environment.expose_internals();
    match preferred_format(accept.as_deref()) {
        Some(ResponseFormat::Json) => {
            (payload.status, Json(payload.to_json(expose_internals))).into_response()
        }
        Some(ResponseFormat::Html) => {
            let body = if expose_internals {
                &payload.dev
            } else {
                &payload.public
            };
            (payload.status, Html(error_page(&body.message))).into_response()
        }
        Some(ResponseFormat::Text) => {
            (payload.status, format!("ERROR: {}", payload.public.message)).into_response()
        }
        None => (StatusCode::NOT_ACCEPTABLE, "Not Acceptable").into_response(),
    }
}

/// First acceptable format in the header's order. A missing header means
/// the caller takes anything, which for an API defaults to JSON.
pub fn preferred_format(accept: Option<&str>) -> Option<ResponseFormat> {
    let Some(accept) = accept else {
        return Some(ResponseFormat::Json);
    };
    for entry in accept.split(',') {
        let mime = entry.split(';').next().unwrap_or("").trim();
        match mime {
            "application/json" | "application/*" | "*/*" => return Some(ResponseFormat::Json),
            "text/html" => return Some(ResponseFormat::Html),
            "text/plain" | "text/*" => return Some(ResponseFormat::Text),
            _ => {}
        }
    }
    None
}

fn error_page(message: &str) -> String {
    format!(
        "<!doctype html>\n<html><head><title>Error</title></head>\
         <body><h1>Something went wrong</h1><p>{}</p></body></html>",
        escape_html(message)
    )
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_accept_defaults_to_json() {
        assert_eq!(preferred_format(None), Some(ResponseFormat::Json));
        assert_eq!(preferred_format(Some("*/*")), Some(ResponseFormat::Json));
    }

    #[test]
    fn header_order_wins() {
        assert_eq!(
            preferred_format(Some("text/html,application/json")),
            Some(ResponseFormat::Html)
        );
        assert_eq!(
            preferred_format(Some("application/json, text/html")),
            Some(ResponseFormat::Json)
        );
        assert_eq!(
            preferred_format(Some("text/plain;q=0.9")),
            Some(ResponseFormat::Text)
        );
    }

    #[test]
    fn unacceptable_types_negotiate_to_406() {
        assert_eq!(preferred_format(Some("application/xml")), None);
        assert_eq!(preferred_format(Some("image/png, application/pdf")), None);
    }

    #[test]
    fn error_pages_escape_markup() {
        let page = error_page("<script>alert(1)</script>");
        assert!(!page.contains("<script>alert"));
        assert!(page.contains("&lt;script&gt;"));
    }
}
