//! Website sustainability analysis.
//!
//! The formula path is deterministic: hosting and traffic lookups scale a
//! per-megabyte footprint, and three 0–100 scores are derived from a hash of
//! the URL. The LLM path asks the configured provider for the same metrics
//! as JSON and falls back to the formula on any failure.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::round_to;
use crate::config::AnalysisMode;
use crate::llm::{LlmProvider, json_object_slice};

/// Hosting providers and their carbon efficiency scores (0–100).
pub const HOSTING_PROVIDERS: &[(&str, u32)] = &[
    ("Green Hosting Co.", 95),
    ("AWS", 70),
    ("Google Cloud", 75),
    ("Azure", 65),
    ("Digital Ocean", 60),
    ("Linode", 55),
    ("GoDaddy", 40),
    ("Other", 50),
];

pub const GREEN_HOSTING_PROVIDER: &str = "Green Hosting Co.";

/// Monthly traffic bands and their impact multipliers.
pub const TRAFFIC_LEVELS: &[(&str, f64)] = &[
    ("1-1,000 visitors", 1.0),
    ("1,001-10,000 visitors", 2.5),
    ("10,001-100,000 visitors", 5.0),
    ("100,001+ visitors", 10.0),
];

/// kg CO2e per MB for an average page.
const BASE_CARBON_PER_MB: f64 = 0.2;
const OTHER_HOSTING_SCORE: u32 = 50;
/// Share of the footprint the recommendations are expected to save.
const SAVINGS_SHARE: f64 = 0.3;
const MAX_LLM_RECOMMENDATIONS: usize = 5;

pub fn hosting_score(provider: &str) -> u32 {
    HOSTING_PROVIDERS
        .iter()
        .find(|(name, _)| *name == provider)
        .map(|(_, score)| *score)
        .unwrap_or(OTHER_HOSTING_SCORE)
}

pub fn traffic_multiplier(traffic: &str) -> f64 {
    TRAFFIC_LEVELS
        .iter()
        .find(|(band, _)| *band == traffic)
        .map(|(_, m)| *m)
        .unwrap_or(1.0)
}

/// Monthly footprint in kg CO2e, one decimal place.
pub fn carbon_footprint(hosting_provider: &str, monthly_traffic: &str, page_size_mb: f64) -> f64 {
    let hosting_factor = (100 - hosting_score(hosting_provider)) as f64 / 100.0;
    round_to(
        page_size_mb * BASE_CARBON_PER_MB * hosting_factor * traffic_multiplier(monthly_traffic),
        1,
    )
}

/// Sum over code points of each one's first UTF-16 unit.
pub fn url_hash(url: &str) -> u64 {
    url.chars()
        .map(|c| {
            let mut buf = [0u16; 2];
            c.encode_utf16(&mut buf)[0] as u64
        })
        .sum()
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationScores {
    pub server_efficiency: i64,
    pub asset_optimization: i64,
    pub green_hosting: i64,
    pub recommendations: Vec<String>,
}

pub fn optimization_scores(url: &str) -> OptimizationScores {
    let h = url_hash(url);
    let server_efficiency = (60 + (h % 40) as i64).clamp(30, 100);
    let asset_optimization = (50 + (h.wrapping_mul(2) % 50) as i64).clamp(20, 100);
    let green_hosting = (70 + (h.wrapping_mul(3) % 30) as i64).clamp(40, 100);

    let mut recommendations = Vec::new();
    if server_efficiency < 70 {
        recommendations.push("Enable HTTP/2 to reduce connection overhead");
        recommendations.push("Implement proper browser caching for static resources");
    }
    if asset_optimization < 60 {
        recommendations.push("Compress and optimize images using WebP format");
        recommendations.push("Minify and bundle CSS and JavaScript files");
        recommendations.push("Remove unused CSS and JavaScript code");
    }
    if green_hosting < 80 {
        recommendations.push("Consider switching to a green hosting provider that uses renewable energy");
        recommendations.push("Choose a data center location closer to your primary audience");
    }

    OptimizationScores {
        server_efficiency,
        asset_optimization,
        green_hosting,
        recommendations: recommendations.into_iter().map(String::from).collect(),
    }
}

/// Weighted 0–100 score: 30% server, 40% assets, 30% hosting.
pub fn sustainability_score(server_efficiency: i64, asset_optimization: i64, green_hosting: i64) -> i64 {
    (server_efficiency as f64 * 0.3 + asset_optimization as f64 * 0.4 + green_hosting as f64 * 0.3)
        .round() as i64
}

/// Potential monthly saving (kg CO2e) if the recommendations are applied.
pub fn carbon_saved(footprint: f64, sustainability: i64) -> f64 {
    round_to(footprint * sustainability as f64 / 100.0 * SAVINGS_SHARE, 1)
}

/// Inputs to one analysis.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub url: &'a str,
    pub hosting_provider: &'a str,
    pub monthly_traffic: &'a str,
    pub page_size_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub carbon_footprint: f64,
    pub sustainability_score: i64,
    pub server_efficiency: i64,
    pub asset_optimization: i64,
    pub green_hosting: i64,
    pub carbon_saved: f64,
    pub recommendations: Vec<String>,
}

/// Where an [`Analysis`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisSource {
    Formula,
    Llm,
}

/// The deterministic lookup-table analysis.
pub fn analyze(req: AnalysisRequest<'_>) -> Analysis {
    let footprint = carbon_footprint(req.hosting_provider, req.monthly_traffic, req.page_size_mb);
    let scores = optimization_scores(req.url);
    let sustainability = sustainability_score(
        scores.server_efficiency,
        scores.asset_optimization,
        scores.green_hosting,
    );
    Analysis {
        carbon_footprint: footprint,
        sustainability_score: sustainability,
        server_efficiency: scores.server_efficiency,
        asset_optimization: scores.asset_optimization,
        green_hosting: scores.green_hosting,
        carbon_saved: carbon_saved(footprint, sustainability),
        recommendations: scores.recommendations,
    }
}

const ANALYSIS_SYSTEM_PROMPT: &str = "You are an expert in web sustainability analysis. \
Given the URL, hosting provider, monthly traffic and page weight of a website, estimate its \
carbon footprint and sustainability metrics. You cannot access the website, so base your \
estimates on the information given. Respond with a single JSON object with exactly these keys: \
\"carbonFootprint\" (kg CO2e per month), \"sustainabilityScore\" (0-100), \
\"serverEfficiency\" (0-100), \"assetOptimization\" (0-100), \"greenHosting\" (0-100), \
\"carbonSaved\" (kg CO2e per month saved by following your advice) and \
\"recommendations\" (3 to 5 specific, actionable strings).";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmAnalysis {
    carbon_footprint: f64,
    sustainability_score: f64,
    server_efficiency: f64,
    asset_optimization: f64,
    green_hosting: f64,
    #[serde(default)]
    carbon_saved: Option<f64>,
    #[serde(default)]
    recommendations: Vec<String>,
}

fn score(v: f64) -> i64 {
    v.round().clamp(0.0, 100.0) as i64
}

/// Parse an LLM reply into an [`Analysis`]; `None` when it is unusable.
pub(crate) fn parse_llm_analysis(text: &str) -> Option<Analysis> {
    let raw: LlmAnalysis = serde_json::from_str(json_object_slice(text)?).ok()?;
    let finite = [
        raw.carbon_footprint,
        raw.sustainability_score,
        raw.server_efficiency,
        raw.asset_optimization,
        raw.green_hosting,
    ]
    .iter()
    .all(|v| v.is_finite());
    if !finite || raw.carbon_footprint < 0.0 {
        return None;
    }
    let footprint = round_to(raw.carbon_footprint, 2);
    let sustainability = score(raw.sustainability_score);
    let saved = raw
        .carbon_saved
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| round_to(v, 2))
        .unwrap_or_else(|| carbon_saved(footprint, sustainability));
    let recommendations: Vec<String> = raw
        .recommendations
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .take(MAX_LLM_RECOMMENDATIONS)
        .collect();

    Some(Analysis {
        carbon_footprint: footprint,
        sustainability_score: sustainability,
        server_efficiency: score(raw.server_efficiency),
        asset_optimization: score(raw.asset_optimization),
        green_hosting: score(raw.green_hosting),
        carbon_saved: saved,
        recommendations,
    })
}

/// Run the analysis selected by `mode`. The LLM path falls back to the
/// formula when there is no provider, the request fails, or the reply does
/// not parse.
pub async fn run_analysis(
    mode: AnalysisMode,
    llm: Option<&LlmProvider>,
    req: AnalysisRequest<'_>,
) -> (Analysis, AnalysisSource) {
    let (AnalysisMode::Llm, Some(llm)) = (mode, llm) else {
        return (analyze(req), AnalysisSource::Formula);
    };

    let prompt = format!(
        "Please analyze the sustainability of this website:\nURL: {}\nHosting Provider: {}\n\
         Monthly Traffic: {}\nPage Size: {} MB",
        req.url, req.hosting_provider, req.monthly_traffic, req.page_size_mb
    );
    match llm.complete(&prompt, Some(ANALYSIS_SYSTEM_PROMPT), true).await {
        Ok(reply) => match parse_llm_analysis(&reply.text) {
            Some(analysis) => {
                debug!(url = %req.url, provider = llm.name(), "llm analysis accepted");
                (analysis, AnalysisSource::Llm)
            }
            None => {
                warn!(url = %req.url, "llm analysis reply unusable; using formula");
                (analyze(req), AnalysisSource::Formula)
            }
        },
        Err(e) => {
            warn!(url = %req.url, error = %e, "llm analysis failed; using formula");
            (analyze(req), AnalysisSource::Formula)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::dummy::DummyProvider;

    fn req(url: &str) -> AnalysisRequest<'_> {
        AnalysisRequest {
            url,
            hosting_provider: "AWS",
            monthly_traffic: "100,001+ visitors",
            page_size_mb: 2.0,
        }
    }

    #[test]
    fn lookups_fall_back_for_unknown_values() {
        assert_eq!(hosting_score("Green Hosting Co."), 95);
        assert_eq!(hosting_score("My Basement"), 50);
        assert_eq!(traffic_multiplier("10,001-100,000 visitors"), 5.0);
        assert_eq!(traffic_multiplier("lots"), 1.0);
    }

    #[test]
    fn footprint_formula() {
        // 2.0 MB × 0.2 × 0.3 × 10
        assert_eq!(carbon_footprint("AWS", "100,001+ visitors", 2.0), 1.2);
        // unknown host and traffic → Other (50) × 1
        assert_eq!(carbon_footprint("?", "?", 1.0), 0.1);
    }

    #[test]
    fn url_hash_sums_code_units() {
        assert_eq!(url_hash("a"), 97);
        assert_eq!(url_hash("https://example.com"), 1828);
        // astral characters contribute their high surrogate
        assert_eq!(url_hash("😀"), 0xD83D);
    }

    #[test]
    fn scores_for_example_com() {
        let s = optimization_scores("https://example.com");
        assert_eq!((s.server_efficiency, s.asset_optimization, s.green_hosting), (88, 56, 94));
        assert_eq!(s.recommendations.len(), 3);
        assert!(s.recommendations[0].contains("WebP"));
    }

    #[test]
    fn low_server_and_asset_scores_add_five_recommendations() {
        let s = optimization_scores("https://greenweb.dev");
        assert_eq!((s.server_efficiency, s.asset_optimization, s.green_hosting), (67, 54, 91));
        assert_eq!(s.recommendations.len(), 5);
        assert!(s.recommendations[0].contains("HTTP/2"));
    }

    #[test]
    fn weighted_sustainability_score() {
        assert_eq!(sustainability_score(88, 56, 94), 77);
        assert_eq!(sustainability_score(100, 100, 100), 100);
    }

    #[test]
    fn formula_analysis_is_deterministic() {
        let a = analyze(req("https://example.com"));
        assert_eq!(a, analyze(req("https://example.com")));
        assert_eq!(a.carbon_footprint, 1.2);
        assert_eq!(a.sustainability_score, 77);
        assert_eq!(a.carbon_saved, carbon_saved(1.2, 77));
    }

    #[test]
    fn parse_llm_analysis_clamps_scores() {
        let text = r#"Sure! ```json
        {"carbonFootprint": 12.345, "sustainabilityScore": 140, "serverEfficiency": 70.4,
         "assetOptimization": -5, "greenHosting": 80, "carbonSaved": 3.1,
         "recommendations": ["Use a CDN", "  ", "Lazy-load images"]}
        ```"#;
        let a = parse_llm_analysis(text).unwrap();
        assert_eq!(a.carbon_footprint, 12.35);
        assert_eq!(a.sustainability_score, 100);
        assert_eq!(a.server_efficiency, 70);
        assert_eq!(a.asset_optimization, 0);
        assert_eq!(a.recommendations, vec!["Use a CDN", "Lazy-load images"]);
    }

    #[test]
    fn parse_llm_analysis_rejects_garbage() {
        assert!(parse_llm_analysis("no json here").is_none());
        assert!(parse_llm_analysis(r#"{"carbonFootprint": 1}"#).is_none());
    }

    #[tokio::test]
    async fn formula_mode_ignores_llm() {
        let llm = LlmProvider::Dummy(DummyProvider::echo());
        let (_, source) = run_analysis(AnalysisMode::Formula, Some(&llm), req("https://a.example")).await;
        assert_eq!(source, AnalysisSource::Formula);
    }

    #[tokio::test]
    async fn llm_mode_uses_parsed_reply() {
        let llm = LlmProvider::Dummy(DummyProvider::scripted(
            r#"{"carbonFootprint": 5, "sustainabilityScore": 81, "serverEfficiency": 80,
                "assetOptimization": 75, "greenHosting": 90, "recommendations": ["Use a CDN"]}"#,
        ));
        let (a, source) = run_analysis(AnalysisMode::Llm, Some(&llm), req("https://a.example")).await;
        assert_eq!(source, AnalysisSource::Llm);
        assert_eq!(a.sustainability_score, 81);
        assert_eq!(a.carbon_saved, carbon_saved(5.0, 81));
    }

    #[tokio::test]
    async fn llm_mode_falls_back_on_unusable_reply() {
        let llm = LlmProvider::Dummy(DummyProvider::echo());
        let (a, source) = run_analysis(AnalysisMode::Llm, Some(&llm), req("https://example.com")).await;
        assert_eq!(source, AnalysisSource::Formula);
        assert_eq!(a, analyze(req("https://example.com")));
    }

    #[tokio::test]
    async fn llm_mode_without_provider_uses_formula() {
        let (_, source) = run_analysis(AnalysisMode::Llm, None, req("https://a.example")).await;
        assert_eq!(source, AnalysisSource::Formula);
    }
}
