use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::Utc;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{body, present};
use crate::carbon::estimator::{Analysis, AnalysisRequest, AnalysisSource, run_analysis};
use crate::carbon::personal::{self, PersonalFootprint, PersonalInput};
use crate::carbon::tips::reduction_tips;
use crate::carbon::website::{self, WebsiteFootprint, with_scheme};
use crate::error::ApiError;
use crate::models::{
    NewOptimization, NewProject, Optimization, Project, ProjectUpdate, STATUS_ANALYZED, User,
    latest_optimization,
};
use crate::server::{AppState, CurrentUser};
use crate::storage::Store;

// ── Request / response types ──────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::server) struct AnalyzeRequest {
    url: Option<String>,
    hosting_provider: Option<String>,
    monthly_traffic: Option<String>,
    page_size: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::server) struct AnalyzeResponse {
    project_id: i64,
    #[serde(flatten)]
    analysis: Analysis,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::server) struct ProjectDetail {
    project: Project,
    optimizations: Option<Vec<Optimization>>,
    latest_optimization: Option<Optimization>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::server) struct CalculateRequest {
    #[serde(default)]
    electricity: f64,
    #[serde(default, alias = "transport_type")]
    transport_type: String,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    diet: String,
}

#[derive(Serialize)]
pub(in crate::server) struct CalculateResponse {
    success: bool,
    result: PersonalFootprint,
    tips: Vec<&'static str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::server) struct WebsiteRequest {
    url: Option<String>,
    #[serde(alias = "monthly_views")]
    monthly_views: Option<i64>,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Load `raw_id` and check it belongs to `user`.
fn owned_project(store: &dyn Store, user: &User, raw_id: &str) -> Result<Project, ApiError> {
    let id: i64 = raw_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid project ID".into()))?;
    let project = store
        .get_project(id)?
        .ok_or_else(|| ApiError::NotFound("Project not found".into()))?;
    if project.user_id != user.id {
        return Err(ApiError::Forbidden("You don't have access to this project".into()));
    }
    Ok(project)
}

/// Upsert the user's project for `url` with the analysis results.
fn record_analysis(
    store: &dyn Store,
    user_id: i64,
    url: &str,
    host: &str,
    req: AnalysisRequest<'_>,
    analysis: &Analysis,
) -> Result<Project, ApiError> {
    let existing = store
        .projects_by_user(user_id)?
        .into_iter()
        .find(|p| p.url.eq_ignore_ascii_case(url));

    let project = match existing {
        Some(p) => store
            .update_project(
                p.id,
                ProjectUpdate {
                    hosting_provider: Some(req.hosting_provider.to_string()),
                    monthly_traffic: Some(req.monthly_traffic.to_string()),
                    carbon_footprint: Some(analysis.carbon_footprint),
                    sustainability_score: Some(analysis.sustainability_score),
                    carbon_saved: Some(analysis.carbon_saved),
                    server_efficiency: Some(analysis.server_efficiency),
                    asset_optimization: Some(analysis.asset_optimization),
                    status: Some(STATUS_ANALYZED.to_string()),
                    ..ProjectUpdate::default()
                },
            )?
            .ok_or_else(|| ApiError::NotFound("Project not found".into()))?,
        None => store.create_project(NewProject {
            user_id,
            name: host.to_string(),
            url: url.to_string(),
            description: Some(format!("Website at {url}")),
            hosting_provider: Some(req.hosting_provider.to_string()),
            monthly_traffic: Some(req.monthly_traffic.to_string()),
            carbon_footprint: Some(analysis.carbon_footprint),
            sustainability_score: Some(analysis.sustainability_score),
            carbon_saved: analysis.carbon_saved,
            server_efficiency: Some(analysis.server_efficiency),
            asset_optimization: Some(analysis.asset_optimization),
            status: STATUS_ANALYZED.to_string(),
        })?,
    };

    let mut optimization = NewOptimization::new(
        project.id,
        "Sustainability analysis",
        format!("Sustainability analysis of {url} on {}", Utc::now().format("%Y-%m-%d")),
    );
    optimization.category = "analysis".into();
    optimization.score = analysis.sustainability_score;
    optimization.recommendations = Some(analysis.recommendations.clone());
    store.create_optimization(optimization)?;

    Ok(project)
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// POST /api/carbon/analyze
pub(in crate::server) async fn analyze(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let req = body(payload)?;
    let (Some(raw_url), Some(hosting_provider), Some(monthly_traffic)) =
        (present(req.url), present(req.hosting_provider), present(req.monthly_traffic))
    else {
        return Err(ApiError::BadRequest(
            "URL, hosting provider, and monthly traffic are required".into(),
        ));
    };

    let url = with_scheme(&raw_url);
    let host = Url::parse(&url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid URL: {raw_url}")))?;

    let page_size_mb = req.page_size.unwrap_or(state.config.carbon.default_page_size_mb);
    if !page_size_mb.is_finite() || page_size_mb <= 0.0 {
        return Err(ApiError::BadRequest("Page size must be a positive number".into()));
    }

    let analysis_req = AnalysisRequest {
        url: &url,
        hosting_provider: &hosting_provider,
        monthly_traffic: &monthly_traffic,
        page_size_mb,
    };
    let (analysis, source) =
        run_analysis(state.config.carbon.analysis, state.llm.as_ref(), analysis_req).await;

    let project = record_analysis(state.store.as_ref(), user.id, &url, &host, analysis_req, &analysis)?;
    info!(
        user_id = user.id,
        project_id = project.id,
        score = analysis.sustainability_score,
        llm = source == AnalysisSource::Llm,
        "website analyzed"
    );

    Ok(Json(AnalyzeResponse { project_id: project.id, analysis }))
}

/// GET /api/carbon/projects
pub(in crate::server) async fn projects(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.store.projects_by_user(user.id)?))
}

/// GET /api/carbon/project/{id}
pub(in crate::server) async fn project_detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ProjectDetail>, ApiError> {
    let project = owned_project(state.store.as_ref(), &user, &id)?;
    let optimizations = state.store.optimizations_by_project(project.id)?;
    let latest = latest_optimization(&optimizations).cloned();

    Ok(Json(ProjectDetail {
        project,
        optimizations: (!optimizations.is_empty()).then_some(optimizations),
        latest_optimization: latest,
    }))
}

/// DELETE /api/carbon/project/{id}
pub(in crate::server) async fn delete_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let project = owned_project(state.store.as_ref(), &user, &id)?;
    state.store.delete_project(project.id)?;
    info!(user_id = user.id, project_id = project.id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/carbon/calculate — personal daily footprint (public).
pub(in crate::server) async fn calculate(
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<Json<CalculateResponse>, ApiError> {
    let req = body(payload)?;
    for (field, value) in [("electricity", req.electricity), ("distance", req.distance)] {
        if !value.is_finite() || value < 0.0 {
            return Err(ApiError::BadRequest(format!("{field} must be a non-negative number")));
        }
    }

    let result = personal::calculate(PersonalInput {
        electricity_kwh: req.electricity,
        transport_type: &req.transport_type,
        distance_km: req.distance,
        diet: &req.diet,
    });
    Ok(Json(CalculateResponse { success: true, result, tips: reduction_tips(result.total) }))
}

/// POST /api/carbon/website — footprint from the measured page weight (public).
pub(in crate::server) async fn website(
    State(state): State<AppState>,
    payload: Result<Json<WebsiteRequest>, JsonRejection>,
) -> Result<Json<WebsiteFootprint>, ApiError> {
    let req = body(payload)?;
    let url = present(req.url).ok_or_else(|| ApiError::BadRequest("URL is required".into()))?;
    let views = req.monthly_views.and_then(|v| u64::try_from(v).ok());

    let size_mb = website::measure_page_size_mb(&state.http, &url).await;
    let footprint = website::website_footprint(size_mb, views);
    info!(%url, monthly_kg = footprint.monthly_carbon, "website footprint calculated");
    Ok(Json(footprint))
}
