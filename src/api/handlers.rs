//! CRM API request handlers.
//!
//! Handlers authenticate the caller, then hand the request to the matching
//! service with the resulting [`Principal`].

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::extract::{Json, Path, Query};
use super::AppState;
use crate::access::{OwnerPair, Principal};
use crate::auth::token_from_headers;
use crate::error::{Result, ServerError};
use crate::services::{
    activities::{self, ActivityFilter, NewActivity},
    categories::{self, CategoryPatch, NewCategory},
    client_companies::{self, ClientCompanyFilter, ClientCompanyPatch, NewClientCompany},
    contacts::{self, ContactFilter, ContactPatch, NewContact},
    metrics::{self, MetricsWindow},
    opportunities::{self, NewOpportunity, OpportunityFilter, OpportunityPatch},
    users::{self, NewUser, TeamFilter, UserFilter, UserPatch, UserView},
};

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolve the session on the request, or fail with 401
async fn require_principal(state: &AppState, headers: &HeaderMap) -> Result<Principal> {
    let token = token_from_headers(headers, state.auth.cookie_name()).ok_or(ServerError::Unauthenticated)?;
    state.auth.authenticate(&token).await
}

fn created<T: Serialize>(body: T) -> Response {
    (StatusCode::CREATED, Json(body)).into_response()
}

// ============================================================================
// Health & Authentication
// ============================================================================

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserView,
}

/// POST /api/auth/register
pub async fn register(State(state): State<Arc<AppState>>, Json(input): Json<NewUser>) -> Result<Response> {
    let user = state.auth.register(input).await?;
    Ok(created(user))
}

/// POST /api/auth/login - sets the session cookie and returns the token
pub async fn login(State(state): State<Arc<AppState>>, Json(req): Json<LoginRequest>) -> Result<Response> {
    let outcome = state.auth.login(&req.email, &req.password).await?;
    let cookie = state.auth.session_cookie(&outcome.token);
    let body = LoginResponse {
        token: outcome.token,
        user: outcome.user,
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response> {
    if let Some(token) = token_from_headers(&headers, state.auth.cookie_name()) {
        state.auth.logout(&token).await?;
    }
    Ok(([(header::SET_COOKIE, state.auth.clear_cookie())], StatusCode::NO_CONTENT).into_response())
}

/// GET /api/auth/me
pub async fn me(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Json<UserView>> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(users::get_profile(&state.db, &principal).await?))
}

// ============================================================================
// Directory
// ============================================================================

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(filter): Query<UserFilter>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(users::list_users(&state.db, &principal, &filter).await?).into_response())
}

/// POST /api/admin/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<NewUser>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(created(users::create_user(&state.db, &principal, input).await?))
}

/// PATCH /api/admin/users/:id
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<UserView>> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(users::update_user(&state.db, &principal, id, patch).await?))
}

/// GET /api/users/team
pub async fn list_team(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(filter): Query<TeamFilter>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(users::list_team(&state.db, &principal, &filter).await?).into_response())
}

// ============================================================================
// Owner Reassignment (admin)
// ============================================================================

/// PATCH /api/admin/reassign/client-companies/:id
pub async fn reassign_client_company(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(owners): Json<OwnerPair>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(client_companies::reassign_owners(&state.db, &principal, id, owners).await?).into_response())
}

/// PATCH /api/admin/reassign/contacts/:id
pub async fn reassign_contact(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(owners): Json<OwnerPair>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(contacts::reassign_owners(&state.db, &principal, id, owners).await?).into_response())
}

/// PATCH /api/admin/reassign/opportunities/:id
pub async fn reassign_opportunity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(owners): Json<OwnerPair>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(opportunities::reassign_owners(&state.db, &principal, id, owners).await?).into_response())
}

// ============================================================================
// Client Categories
// ============================================================================

/// GET /api/client-categories
pub async fn list_categories(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(categories::list(&state.db, &principal).await?).into_response())
}

/// POST /api/client-categories
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<NewCategory>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(created(categories::create(&state.db, &principal, input).await?))
}

/// PATCH /api/client-categories/:id
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(patch): Json<CategoryPatch>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(categories::update(&state.db, &principal, id, patch).await?).into_response())
}

// ============================================================================
// Client Companies
// ============================================================================

/// GET /api/client-companies
pub async fn list_client_companies(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(filter): Query<ClientCompanyFilter>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(client_companies::list(&state.db, &principal, &filter).await?).into_response())
}

/// GET /api/client-companies/:id
pub async fn get_client_company(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(client_companies::get_by_id(&state.db, &principal, id).await?).into_response())
}

/// POST /api/client-companies
pub async fn create_client_company(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<NewClientCompany>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(created(client_companies::create(&state.db, &principal, input).await?))
}

/// PATCH /api/client-companies/:id
pub async fn update_client_company(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(patch): Json<ClientCompanyPatch>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(client_companies::update(&state.db, &principal, id, patch).await?).into_response())
}

// ============================================================================
// Contacts
// ============================================================================

/// GET /api/contacts
pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(filter): Query<ContactFilter>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(contacts::list(&state.db, &principal, &filter).await?).into_response())
}

/// GET /api/contacts/:id
pub async fn get_contact(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(contacts::get_by_id(&state.db, &principal, id).await?).into_response())
}

/// POST /api/contacts
pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<NewContact>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(created(contacts::create(&state.db, &principal, input).await?))
}

/// PATCH /api/contacts/:id
pub async fn update_contact(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(patch): Json<ContactPatch>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(contacts::update(&state.db, &principal, id, patch).await?).into_response())
}

// ============================================================================
// Opportunities
// ============================================================================

/// GET /api/opportunities
pub async fn list_opportunities(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(filter): Query<OpportunityFilter>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(opportunities::list(&state.db, &principal, &filter).await?).into_response())
}

/// GET /api/opportunities/:id
pub async fn get_opportunity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(opportunities::get_by_id(&state.db, &principal, id).await?).into_response())
}

/// POST /api/opportunities
pub async fn create_opportunity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<NewOpportunity>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(created(opportunities::create(&state.db, &principal, input).await?))
}

/// PATCH /api/opportunities/:id
pub async fn update_opportunity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(patch): Json<OpportunityPatch>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(opportunities::update(&state.db, &principal, id, patch).await?).into_response())
}

// ============================================================================
// Activities & Metrics
// ============================================================================

/// GET /api/activities
pub async fn list_activities(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(filter): Query<ActivityFilter>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(activities::list(&state.db, &principal, &filter).await?).into_response())
}

/// GET /api/activities/:id
pub async fn get_activity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(activities::get_by_id(&state.db, &principal, id).await?).into_response())
}

/// POST /api/activities
pub async fn create_activity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<NewActivity>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(created(activities::create(&state.db, &principal, input).await?))
}

/// GET /api/metrics/team
pub async fn team_metrics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(window): Query<MetricsWindow>,
) -> Result<Response> {
    let principal = require_principal(&state, &headers).await?;
    Ok(Json(metrics::team_metrics(&state.db, &principal, &window).await?).into_response())
}
