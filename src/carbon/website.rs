//! Footprint of a website from its measured page weight and monthly views.

use reqwest::header;
use serde::Serialize;
use tracing::{debug, warn};

use super::round_to;

/// kg CO2e per GB transferred.
pub const DATA_TRANSFER_FACTOR: f64 = 0.81;
/// kg CO2e per kWh of server energy.
pub const SERVER_ENERGY_FACTOR: f64 = 0.475;
/// kWh of server energy per GB served.
pub const SERVER_KWH_PER_GB: f64 = 0.2;
pub const DEFAULT_PAGE_SIZE_MB: f64 = 2.0;
pub const DEFAULT_MONTHLY_VIEWS: u64 = 10_000;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WebsiteFootprint {
    pub website_size_mb: f64,
    /// Grams CO2e per page view.
    pub carbon_per_visit: f64,
    /// kg CO2e.
    pub monthly_carbon: f64,
    /// kg CO2e.
    pub annual_carbon: f64,
    pub monthly_views: u64,
}

/// Prefix `http://` when `url` carries no scheme.
pub fn with_scheme(url: &str) -> String {
    if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

/// Fetch `url` and return its size in MB; [`DEFAULT_PAGE_SIZE_MB`] on any
/// failure. The request timeout is whatever `client` was built with.
pub async fn measure_page_size_mb(client: &reqwest::Client, url: &str) -> f64 {
    match fetch_size_bytes(client, &with_scheme(url)).await {
        Ok(bytes) => {
            let size_mb = bytes as f64 / BYTES_PER_MB;
            debug!(url, size_mb, "page measured");
            size_mb
        }
        Err(e) => {
            warn!(url, error = %e, "page fetch failed; using default size");
            DEFAULT_PAGE_SIZE_MB
        }
    }
}

async fn fetch_size_bytes(client: &reqwest::Client, url: &str) -> Result<u64, reqwest::Error> {
    let mut resp = client.get(url).send().await?.error_for_status()?;
    let declared = resp
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    if let Some(len) = declared {
        return Ok(len);
    }

    // Count the body as it streams; nothing is buffered.
    let mut total = 0u64;
    while let Some(chunk) = resp.chunk().await? {
        total += chunk.len() as u64;
    }
    Ok(total)
}

/// Footprint for a page of `size_mb` viewed `monthly_views` times a month.
/// Missing or zero views use [`DEFAULT_MONTHLY_VIEWS`].
pub fn website_footprint(size_mb: f64, monthly_views: Option<u64>) -> WebsiteFootprint {
    let views = monthly_views.filter(|v| *v > 0).unwrap_or(DEFAULT_MONTHLY_VIEWS);
    let size_gb = size_mb / 1024.0;
    let data = size_gb * DATA_TRANSFER_FACTOR;
    let server = size_gb * SERVER_KWH_PER_GB * SERVER_ENERGY_FACTOR;
    let per_visit = data + server;
    let monthly = per_visit * views as f64;

    WebsiteFootprint {
        website_size_mb: round_to(size_mb, 2),
        carbon_per_visit: round_to(per_visit * 1000.0, 2),
        monthly_carbon: round_to(monthly, 2),
        annual_carbon: round_to(monthly * 12.0, 2),
        monthly_views: views,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, routing::get};

    #[test]
    fn footprint_for_default_page() {
        let f = website_footprint(DEFAULT_PAGE_SIZE_MB, None);
        // (2/1024) × (0.81 + 0.095) = 0.0017675… kg per visit
        assert_eq!(f.carbon_per_visit, 1.77);
        assert_eq!(f.monthly_carbon, 17.68);
        assert_eq!(f.annual_carbon, 212.11);
        assert_eq!(f.monthly_views, 10_000);
    }

    #[test]
    fn zero_views_use_default() {
        assert_eq!(website_footprint(1.0, Some(0)).monthly_views, DEFAULT_MONTHLY_VIEWS);
        assert_eq!(website_footprint(1.0, Some(500)).monthly_views, 500);
    }

    #[test]
    fn scheme_is_added_when_missing() {
        assert_eq!(with_scheme("example.com"), "http://example.com");
        assert_eq!(with_scheme("https://example.com"), "https://example.com");
    }

    #[tokio::test]
    async fn measures_served_page() {
        let body = "x".repeat(512 * 1024);
        let app = Router::new().route("/", get(move || async move { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let size = measure_page_size_mb(&reqwest::Client::new(), &format!("127.0.0.1:{}", addr.port())).await;
        assert_eq!(size, 0.5);
    }

    #[tokio::test]
    async fn measures_chunked_page_without_length() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut req = [0u8; 1024];
            let _ = sock.read(&mut req).await.unwrap();
            sock.write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            let chunk = vec![b'x'; 256 * 1024];
            for _ in 0..4 {
                sock.write_all(format!("{:x}\r\n", chunk.len()).as_bytes()).await.unwrap();
                sock.write_all(&chunk).await.unwrap();
                sock.write_all(b"\r\n").await.unwrap();
            }
            sock.write_all(b"0\r\n\r\n").await.unwrap();
        });

        let size = measure_page_size_mb(&reqwest::Client::new(), &format!("http://{addr}/")).await;
        assert_eq!(size, 1.0);
    }

    #[tokio::test]
    async fn unreachable_page_uses_default() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let size = measure_page_size_mb(&reqwest::Client::new(), &format!("http://127.0.0.1:{port}/")).await;
        assert_eq!(size, DEFAULT_PAGE_SIZE_MB);
    }
}
