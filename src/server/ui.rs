//! Static welcome page served at `/`. The browser frontend is deployed
//! separately and talks to `/api/*`.

use axum::response::Html;

const ROOT_INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>GreenWeb</title>
  <style>
    *, *::before, *::after { box-sizing: border-box; margin: 0; padding: 0; }
    body {
      font-family: system-ui, -apple-system, sans-serif;
      background: #f3f8f4; color: #1d3b2a;
      display: flex; align-items: center; justify-content: center;
      height: 100vh;
    }
    .card {
      text-align: center; padding: 2rem 3rem;
      border: 1px solid #cfe3d5; border-radius: 12px;
      background: #ffffff;
    }
    h1 { font-size: 1.5rem; margin-bottom: 0.5rem; }
    p  { font-size: 0.9rem; color: #5b7a66; margin-bottom: 1rem; }
    a {
      display: inline-block; padding: 0.5rem 1.5rem;
      border-radius: 8px; background: #2f855a; color: #ffffff;
      text-decoration: none; font-size: 0.9rem;
      transition: background 0.15s;
    }
    a:hover { background: #276749; }
  </style>
</head>
<body>
  <div class="card">
    <h1>GreenWeb</h1>
    <p>Sustainability API is running.</p>
    <a href="/api/health">Health &rarr;</a>
  </div>
</body>
</html>
"#;

/// GET / — welcome page.
pub(super) async fn root() -> Html<&'static str> {
    Html(ROOT_INDEX_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn root_links_to_health() {
        let Html(body) = root().await;
        assert!(body.contains("<title>GreenWeb</title>"));
        assert!(body.contains("/api/health"));
    }
}
