//! Badges, leaderboard and per-user sustainability stats.

use std::cmp::Reverse;

use serde::Serialize;
use tracing::info;

use crate::carbon::estimator::GREEN_HOSTING_PROVIDER;
use crate::carbon::round_to;
use crate::error::AppError;
use crate::models::{Badge, Project, latest_optimization};
use crate::storage::{CARBON_REDUCER, GREEN_HOST_PIONEER, SPEED_OPTIMIZER, Store};

const CARBON_REDUCER_MIN_SCORE: i64 = 80;
const SPEED_OPTIMIZER_MIN_SCORE: i64 = 75;
/// Upper bound on the carbon a single project is credited with saving (kg).
const MAX_SAVING_PER_PROJECT_KG: f64 = 20.0;
const RECENT_PROJECTS: usize = 3;

// ── Badge checks ──────────────────────────────────────────────────────────────

/// Award every badge `project_id` now qualifies its owner for and return the
/// newly earned ones. Badges already held are skipped; a project the user
/// does not own earns nothing.
pub fn check_and_assign(store: &dyn Store, user_id: i64, project_id: i64) -> Result<Vec<Badge>, AppError> {
    let projects = store.projects_by_user(user_id)?;
    let Some(project) = projects.iter().find(|p| p.id == project_id) else {
        return Ok(Vec::new());
    };

    let catalogue = store.all_badges()?;
    let held: Vec<i64> = store.user_badges(user_id)?.iter().map(|b| b.id).collect();
    let available = |name: &str| catalogue.iter().find(|b| b.name == name && !held.contains(&b.id));

    let mut candidates = Vec::new();
    if project.hosting_provider.as_deref() == Some(GREEN_HOSTING_PROVIDER) {
        candidates.extend(available(GREEN_HOST_PIONEER));
    }
    if project.sustainability_score.is_some_and(|s| s >= CARBON_REDUCER_MIN_SCORE) {
        candidates.extend(available(CARBON_REDUCER));
    }
    let optimizations = store.optimizations_by_project(project_id)?;
    let speedy = latest_optimization(&optimizations)
        .is_some_and(|o| o.recommendations.is_some() && o.score >= SPEED_OPTIMIZER_MIN_SCORE);
    if speedy {
        candidates.extend(available(SPEED_OPTIMIZER));
    }

    let mut earned = Vec::with_capacity(candidates.len());
    for badge in candidates {
        store.assign_badge(user_id, badge.id)?;
        info!(user_id, badge = %badge.name, "badge awarded");
        earned.push(badge.clone());
    }
    Ok(earned)
}

// ── Leaderboard ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub username: String,
    pub name: Option<String>,
    pub badge_count: usize,
    pub points: i64,
    pub project_count: usize,
    pub sustainability_score: i64,
}

fn total_points(badges: &[Badge]) -> i64 {
    badges.iter().map(|b| b.points).sum()
}

/// Rounded mean sustainability score; unscored projects count as 0.
fn mean_sustainability(projects: &[Project]) -> i64 {
    if projects.is_empty() {
        return 0;
    }
    let total: i64 = projects.iter().map(|p| p.sustainability_score.unwrap_or(0)).sum();
    (total as f64 / projects.len() as f64).round() as i64
}

/// Every user ranked by badge points, highest first; ties by user id.
pub fn leaderboard(store: &dyn Store) -> Result<Vec<LeaderboardEntry>, AppError> {
    let mut entries = Vec::new();
    for user in store.list_users()? {
        let badges = store.user_badges(user.id)?;
        let projects = store.projects_by_user(user.id)?;
        entries.push(LeaderboardEntry {
            user_id: user.id,
            username: user.username,
            name: user.name,
            badge_count: badges.len(),
            points: total_points(&badges),
            project_count: projects.len(),
            sustainability_score: mean_sustainability(&projects),
        });
    }
    entries.sort_by_key(|e| (Reverse(e.points), e.user_id));
    Ok(entries)
}

// ── Stats ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub user_id: i64,
    pub badge_count: usize,
    pub project_count: usize,
    pub total_carbon_saved: f64,
    pub total_points: i64,
    pub sustainability_score: i64,
    pub badges: Vec<Badge>,
    pub recent_projects: Vec<Project>,
}

pub fn stats(store: &dyn Store, user_id: i64) -> Result<UserStats, AppError> {
    let badges = store.user_badges(user_id)?;
    let mut projects = store.projects_by_user(user_id)?;

    let carbon_saved: f64 = projects
        .iter()
        .filter_map(|p| p.sustainability_score)
        .map(|s| s as f64 / 100.0 * MAX_SAVING_PER_PROJECT_KG)
        .sum();
    let sustainability_score = mean_sustainability(&projects);
    let project_count = projects.len();

    projects.sort_by_key(|p| Reverse(p.updated_at));
    projects.truncate(RECENT_PROJECTS);

    Ok(UserStats {
        user_id,
        badge_count: badges.len(),
        project_count,
        total_carbon_saved: round_to(carbon_saved, 1),
        total_points: total_points(&badges),
        sustainability_score,
        badges,
        recent_projects: projects,
    })
}
