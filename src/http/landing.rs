//! Static landing page.

use axum::extract::State;
use axum::response::Html;

use crate::http::server::AppState;

pub async fn landing_page(State(state): State<AppState>) -> Html<String> {
    Html(render(&state.config.identity.public_name))
}

fn render(name: &str) -> String {
    let name = escape(name);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{name}</title>
    <style>
        body {{ font-family: sans-serif; max-width: 720px; margin: 40px auto; padding: 20px; }}
        code {{ background: #f2f2f2; padding: 3px 7px; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>{name}</h1>
    <h2>Getting Started</h2>
    <p>Send requests with your access token:</p>
    <code>Authorization: Bearer &lt;your token&gt;</code>
    <p>Add <code>"stream": true</code> to a request body to receive server-sent events.</p>
    <p>Available models: <code>GET /v1/models</code></p>
</body>
</html>
"#
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_gateway_without_token() {
        let page = render("Relay <Gateway>");
        assert!(page.contains("<h1>Relay &lt;Gateway&gt;</h1>"));
        assert!(page.contains("Bearer &lt;your token&gt;"));
    }
}
