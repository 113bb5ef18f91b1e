//! Server-rendered HTML.
//!
//! Paste content is always escaped before it reaches markup.

use axum::response::Html;

use crate::paste::{PasteView, MAX_CONTENT_BYTES};

const STYLE: &str = r#"<style>
body { font-family: system-ui, sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }
pre { background: #f4f4f4; padding: 1rem; white-space: pre-wrap; word-break: break-word; }
.meta { color: #666; font-size: 0.9rem; }
textarea { width: 100%; min-height: 16rem; font-family: monospace; }
label { display: block; margin-top: 0.75rem; }
#result { margin-top: 1rem; }
</style>"#;

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n{}\n</head>\n<body>\n{}\n</body>\n</html>\n",
        html_escape::encode_text(title),
        STYLE,
        body
    )
}

pub fn paste_page(view: &PasteView) -> String {
    let mut meta = Vec::new();
    if let Some(remaining) = view.remaining_views {
        meta.push(format!("Views remaining: {}", remaining));
    }
    if let Some(expires_at) = &view.expires_at {
        meta.push(format!(
            "Expires at: <time datetime=\"{0}\">{0}</time>",
            html_escape::encode_double_quoted_attribute(expires_at)
        ));
    }

    let meta = if meta.is_empty() {
        String::new()
    } else {
        format!("<p class=\"meta\">{}</p>\n", meta.join(" &middot; "))
    };

    layout(
        "Paste",
        &format!(
            "<h1>Paste</h1>\n{}<pre>{}</pre>\n<p><a href=\"/\">Create a new paste</a></p>",
            meta,
            html_escape::encode_safe(&view.content)
        ),
    )
}

pub fn not_found_page() -> String {
    layout(
        "Paste not found",
        "<h1>404 - Paste not found</h1>\n\
         <p>This paste does not exist or is no longer available.</p>\n\
         <p><a href=\"/\">Create a new paste</a></p>",
    )
}

const INDEX_BODY: &str = r#"<h1>New paste</h1>
<form id="paste-form">
<label for="content">Content</label>
<textarea id="content" name="content" required></textarea>
<label for="ttl">Expire after (seconds, optional)</label>
<input id="ttl" name="ttl_seconds" type="number" min="1" step="1">
<label for="views">Maximum views (optional)</label>
<input id="views" name="max_views" type="number" min="1" step="1">
<p><button type="submit">Create paste</button></p>
</form>
<div id="result"></div>
<script>
document.getElementById("paste-form").addEventListener("submit", async (event) => {
  event.preventDefault();
  const result = document.getElementById("result");
  const body = { content: document.getElementById("content").value };
  const ttl = document.getElementById("ttl").value;
  const views = document.getElementById("views").value;
  if (ttl !== "") body.ttl_seconds = Number(ttl);
  if (views !== "") body.max_views = Number(views);
  result.textContent = "";
  try {
    const res = await fetch("/api/pastes", {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify(body),
    });
    const data = await res.json();
    if (!res.ok) {
      result.textContent = data.error || "Request failed";
      return;
    }
    const link = document.createElement("a");
    link.href = data.url;
    link.textContent = data.url;
    result.append("Share this link: ", link);
  } catch (err) {
    result.textContent = "Request failed";
  }
});
</script>"#;

/// `GET /`
pub async fn index() -> Html<String> {
    let limit = format!(
        "<p class=\"meta\">Up to {} KB of text.</p>\n",
        MAX_CONTENT_BYTES / 1024
    );
    Html(layout("New paste", &format!("{}{}", limit, INDEX_BODY)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paste_page_escapes_content() {
        let view = PasteView {
            content: "<script>alert('x')</script> & \"q\"".into(),
            remaining_views: Some(2),
            expires_at: Some("2024-01-01T00:01:00.000Z".into()),
        };
        let html = paste_page(&view);

        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;alert("));
        assert!(html.contains("&amp;"));
        assert!(!html.contains("\"q\""));
        assert!(html.contains("Views remaining: 2"));
        assert!(html.contains("2024-01-01T00:01:00.000Z"));
    }

    #[test]
    fn test_paste_page_without_limits_has_no_meta() {
        let view = PasteView {
            content: "plain".into(),
            remaining_views: None,
            expires_at: None,
        };
        let html = paste_page(&view);
        assert!(html.contains("<pre>plain</pre>"));
        assert!(!html.contains("class=\"meta\""));
    }

    #[test]
    fn test_not_found_page() {
        let html = not_found_page();
        assert!(html.contains("Paste not found"));
        assert!(html.contains("no longer available"));
    }
}
