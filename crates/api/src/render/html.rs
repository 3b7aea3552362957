//! HTML document shell with the embedded hydration payload.

use serde_json::Value;

/// Render the full document: the page markup inside `#root`, then the data
/// cache assigned to `window.__INIT_DATA__` for client-side hydration.
///
/// The serialized payload must never contain a raw `<`: a value holding
/// `</script>` would otherwise terminate the inline script element and
/// inject markup into the page.
pub fn render_document(title: &str, markup: &str, data: &Value, pretty: bool) -> String {
    let json = if pretty {
        serde_json::to_string_pretty(data)
    } else {
        serde_json::to_string(data)
    }
    .unwrap_or_else(|_| "null".to_string());
    let json = escape_script_payload(&json);

    format!(
        "<!doctype html>\n\
         <html lang=\"en\">\n\
         <head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>\n\
         <div id=\"root\">{markup}</div>\n\
         <script type=\"text/javascript\">\n  window.__INIT_DATA__ = {json}\n</script>\n\
         </body>\n\
         </html>\n",
        title = escape_text(title),
    )
}

fn escape_script_payload(json: &str) -> String {
    json.replace('<', "\\u003c")
}

/// Escape text interpolated into markup.
pub fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_cannot_break_out_of_the_script_element() {
        let data = serde_json::json!({
            "currentUser": { "name": "</script><script>alert(1)</script>" }
        });
        let html = render_document("Home", "<p>hi</p>", &data, false);

        assert!(!html.contains("</script><script>alert"));
        assert!(html.contains("\\u003c/script>"));
        // The document still has exactly one closing script tag.
        assert_eq!(html.matches("</script>").count(), 1);
    }

    #[test]
    fn markup_and_data_are_embedded() {
        let data = serde_json::json!({ "currentUser": null });
        let html = render_document("Home", "<p>hello</p>", &data, false);

        assert!(html.contains("<div id=\"root\"><p>hello</p></div>"));
        assert!(html.contains("window.__INIT_DATA__ = {\"currentUser\":null}"));
    }

    #[test]
    fn pretty_mode_indents_the_payload() {
        let data = serde_json::json!({ "a": 1 });
        let html = render_document("Home", "", &data, true);
        assert!(html.contains("{\n  \"a\": 1\n}"));
    }

    #[test]
    fn titles_are_escaped() {
        let html = render_document("<nope>", "", &serde_json::json!({}), false);
        assert!(html.contains("<title>&lt;nope&gt;</title>"));
    }
}
