//! Records persisted by the store and returned by the API.
//!
//! JSON field names are camelCase to match what the browser client expects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Timestamp = DateTime<Utc>;

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

pub const STATUS_NEW: &str = "new";
pub const STATUS_ANALYZED: &str = "analyzed";

// ── Users ─────────────────────────────────────────────────────────────────────

/// A registered account. The password hash never leaves the server; use
/// [`User::public`] for anything serialised to a client.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub name: Option<String>,
    pub profile_picture: Option<String>,
    pub role: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            profile_picture: self.profile_picture.clone(),
            role: self.role.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub profile_picture: Option<String>,
    pub role: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub name: Option<String>,
    pub profile_picture: Option<String>,
}

/// Partial profile update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub profile_picture: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.profile_picture.is_none()
    }
}

// ── Projects ──────────────────────────────────────────────────────────────────

/// A website tracked by one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub hosting_provider: Option<String>,
    pub monthly_traffic: Option<String>,
    /// kg CO2e per month.
    pub carbon_footprint: Option<f64>,
    pub sustainability_score: Option<i64>,
    pub carbon_saved: f64,
    pub server_efficiency: Option<i64>,
    pub asset_optimization: Option<i64>,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub user_id: i64,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub hosting_provider: Option<String>,
    pub monthly_traffic: Option<String>,
    pub carbon_footprint: Option<f64>,
    pub sustainability_score: Option<i64>,
    pub carbon_saved: f64,
    pub server_efficiency: Option<i64>,
    pub asset_optimization: Option<i64>,
    pub status: String,
}

/// Partial project update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub hosting_provider: Option<String>,
    pub monthly_traffic: Option<String>,
    pub carbon_footprint: Option<f64>,
    pub sustainability_score: Option<i64>,
    pub carbon_saved: Option<f64>,
    pub server_efficiency: Option<i64>,
    pub asset_optimization: Option<i64>,
    pub status: Option<String>,
}

impl Project {
    pub(crate) fn apply(&mut self, u: ProjectUpdate, now: Timestamp) {
        if let Some(v) = u.name {
            self.name = v;
        }
        if let Some(v) = u.description {
            self.description = Some(v);
        }
        if let Some(v) = u.hosting_provider {
            self.hosting_provider = Some(v);
        }
        if let Some(v) = u.monthly_traffic {
            self.monthly_traffic = Some(v);
        }
        if let Some(v) = u.carbon_footprint {
            self.carbon_footprint = Some(v);
        }
        if let Some(v) = u.sustainability_score {
            self.sustainability_score = Some(v);
        }
        if let Some(v) = u.carbon_saved {
            self.carbon_saved = v;
        }
        if let Some(v) = u.server_efficiency {
            self.server_efficiency = Some(v);
        }
        if let Some(v) = u.asset_optimization {
            self.asset_optimization = Some(v);
        }
        if let Some(v) = u.status {
            self.status = v;
        }
        self.updated_at = now;
    }
}

// ── Badges ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: String,
    pub points: i64,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct NewBadge {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: String,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserBadge {
    pub id: i64,
    pub user_id: i64,
    pub badge_id: i64,
    pub achieved_at: Timestamp,
}

// ── Optimizations ─────────────────────────────────────────────────────────────

/// One analysis run's score and recommendations for a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Optimization {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub impact: String,
    pub status: String,
    pub score: i64,
    pub recommendations: Option<Vec<String>>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct NewOptimization {
    pub project_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub impact: String,
    pub status: String,
    pub score: i64,
    pub recommendations: Option<Vec<String>>,
}

impl NewOptimization {
    /// Defaults: category `general`, impact `medium`, status `pending`, score 0.
    pub fn new(project_id: i64, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            description: description.into(),
            category: "general".into(),
            impact: "medium".into(),
            status: "pending".into(),
            score: 0,
            recommendations: None,
        }
    }
}

/// The most recent optimization: greatest `created_at`, ties broken by id.
pub fn latest_optimization(optimizations: &[Optimization]) -> Option<&Optimization> {
    optimizations
        .iter()
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
}

// ── Chat ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub role: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub user_id: i64,
    pub content: String,
    pub role: String,
}
