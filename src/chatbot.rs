//! Sustainability assistant: LLM-backed insights with canned fallbacks,
//! reply formatting, and the tip of the day.

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::{LlmProvider, json_object_slice};

const INSIGHTS_SYSTEM_PROMPT: &str = "You are a sustainability expert for web development. \
Provide insights on how to make websites more eco-friendly, reduce carbon footprint, and \
optimize for sustainability. Focus on practical, actionable advice. Return your response in \
JSON format with the following structure: {\"insights\": \"Brief insights about the user's \
query\", \"recommendations\": [\"1-3 specific, actionable recommendations\"], \
\"additional_resources\": [{\"title\": \"Resource name\", \"url\": \"URL to resource\"}]}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub insights: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub additional_resources: Vec<Resource>,
}

// ── Fallback answers ──────────────────────────────────────────────────────────

fn canned(insights: &str, recommendations: [&str; 3], resources: [(&str, &str); 2]) -> Insights {
    Insights {
        insights: insights.to_string(),
        recommendations: recommendations.iter().map(|r| r.to_string()).collect(),
        additional_resources: resources
            .iter()
            .map(|(title, url)| Resource { title: title.to_string(), url: url.to_string() })
            .collect(),
    }
}

fn images_answer() -> Insights {
    canned(
        "Optimizing image sizes is crucial for reducing the carbon footprint of your website. \
         Large, uncompressed images can significantly increase page load times and energy consumption.",
        [
            "Use modern image formats like WebP or AVIF that offer better compression",
            "Implement responsive images with srcset to deliver appropriate sizes",
            "Consider using an image CDN with automatic optimization",
        ],
        [
            ("Sustainable Web Design", "https://sustainablewebdesign.org"),
            ("Website Carbon Calculator", "https://www.websitecarbon.com"),
        ],
    )
}

fn hosting_answer() -> Insights {
    canned(
        "Server efficiency is a key factor in web sustainability. The hosting provider and server \
         configuration can make a significant difference in your website's carbon footprint.",
        [
            "Choose a hosting provider powered by renewable energy",
            "Implement efficient caching strategies",
            "Optimize database queries to reduce server load",
        ],
        [
            ("Green Web Foundation", "https://www.thegreenwebfoundation.org"),
            ("Sustainable Web Manifesto", "https://www.sustainablewebmanifesto.com"),
        ],
    )
}

fn javascript_answer() -> Insights {
    canned(
        "JavaScript execution consumes significant CPU resources on user devices. Optimizing your \
         JavaScript can reduce energy consumption and improve user experience.",
        [
            "Minimize JavaScript bundle sizes with code splitting",
            "Use performance monitoring to identify inefficient code",
            "Consider server-side rendering for content-heavy sites",
        ],
        [
            ("Web.dev Performance", "https://web.dev/performance"),
            ("Mozilla Web Performance", "https://developer.mozilla.org/en-US/docs/Web/Performance"),
        ],
    )
}

/// Keyword-matched canned answer.
pub fn fallback_insights(query: &str) -> Insights {
    let q = query.to_lowercase();
    if q.contains("server") || q.contains("hosting") {
        hosting_answer()
    } else if q.contains("javascript") || q.contains("code") {
        javascript_answer()
    } else {
        images_answer()
    }
}

fn parse_insights(text: &str) -> Option<Insights> {
    let parsed: Insights = serde_json::from_str(json_object_slice(text)?).ok()?;
    (!parsed.insights.trim().is_empty()).then_some(parsed)
}

/// Answer `query`, asking the LLM when one is configured.
pub async fn insights(llm: Option<&LlmProvider>, query: &str) -> Insights {
    let Some(llm) = llm else {
        return fallback_insights(query);
    };
    match llm.complete(query, Some(INSIGHTS_SYSTEM_PROMPT), true).await {
        Ok(reply) => match parse_insights(&reply.text) {
            Some(insights) => {
                debug!(provider = llm.name(), "llm insights accepted");
                insights
            }
            None => {
                warn!(provider = llm.name(), "llm insights reply unusable; using fallback");
                fallback_insights(query)
            }
        },
        Err(e) => {
            warn!(error = %e, "llm insights failed; using fallback");
            fallback_insights(query)
        }
    }
}

/// Render insights as the assistant's plain-text chat reply.
pub fn format_response(insights: &Insights) -> String {
    let mut out = format!("{}\n\n", insights.insights);
    if !insights.recommendations.is_empty() {
        out.push_str("Recommendations:\n");
        for (i, rec) in insights.recommendations.iter().enumerate() {
            out.push_str(&format!("{}. {rec}\n", i + 1));
        }
        out.push('\n');
    }
    if !insights.additional_resources.is_empty() {
        out.push_str("Additional Resources:\n");
        for r in &insights.additional_resources {
            out.push_str(&format!("- {}: {}\n", r.title, r.url));
        }
    }
    out
}

// ── Tips ──────────────────────────────────────────────────────────────────────

pub const TIPS: [&str; 10] = [
    "Use system fonts instead of custom web fonts to reduce page weight and carbon emissions.",
    "Optimize your images before uploading them to reduce file size and bandwidth usage.",
    "Consider using dark mode to reduce energy consumption on OLED displays.",
    "Implement lazy loading for images and videos to reduce initial page load size.",
    "Choose a green web hosting provider that uses renewable energy for their data centers.",
    "Use CSS instead of JavaScript for animations when possible to reduce CPU usage.",
    "Minify your CSS, JavaScript, and HTML files to reduce file sizes.",
    "Implement proper caching strategies to reduce repeat downloads and server requests.",
    "Consider a static site if your content doesn't need to be dynamic.",
    "Regularly audit your website's performance and make optimizations.",
];

pub fn random_tip() -> &'static str {
    TIPS[OsRng.next_u32() as usize % TIPS.len()]
}
