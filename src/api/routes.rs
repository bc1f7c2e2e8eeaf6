//! CRM API route definitions.

use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};

use super::handlers;
use super::AppState;

/// Build the full API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // ================================================================
        // Authentication
        // ================================================================
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/me", get(handlers::me))
        // ================================================================
        // Directory (admin) and team (sales manager)
        // ================================================================
        .route("/api/admin/users", get(handlers::list_users).post(handlers::create_user))
        .route("/api/admin/users/:id", patch(handlers::update_user))
        .route(
            "/api/admin/reassign/client-companies/:id",
            patch(handlers::reassign_client_company),
        )
        .route("/api/admin/reassign/contacts/:id", patch(handlers::reassign_contact))
        .route(
            "/api/admin/reassign/opportunities/:id",
            patch(handlers::reassign_opportunity),
        )
        .route("/api/users/team", get(handlers::list_team))
        // ================================================================
        // CRM records
        // ================================================================
        .route(
            "/api/client-categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/api/client-categories/:id", patch(handlers::update_category))
        .route(
            "/api/client-companies",
            get(handlers::list_client_companies).post(handlers::create_client_company),
        )
        .route(
            "/api/client-companies/:id",
            get(handlers::get_client_company).patch(handlers::update_client_company),
        )
        .route("/api/contacts", get(handlers::list_contacts).post(handlers::create_contact))
        .route(
            "/api/contacts/:id",
            get(handlers::get_contact).patch(handlers::update_contact),
        )
        .route(
            "/api/opportunities",
            get(handlers::list_opportunities).post(handlers::create_opportunity),
        )
        .route(
            "/api/opportunities/:id",
            get(handlers::get_opportunity).patch(handlers::update_opportunity),
        )
        .route(
            "/api/activities",
            get(handlers::list_activities).post(handlers::create_activity),
        )
        .route("/api/activities/:id", get(handlers::get_activity))
        .route("/api/metrics/team", get(handlers::team_metrics))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::db;
    use crate::services::users::{self, NewUser};
    use crate::test_support::{insert_company, insert_contact, seed_team, Team};
    use crate::db::entities::user::Role;
    use axum::{
        body::Body,
        http::{header, HeaderMap, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_app() -> (Router, Arc<AppState>, Team) {
        let db = db::connect_in_memory().await.unwrap();
        let team = seed_team(&db).await;
        let state = Arc::new(AppState::new(db, &ServerConfig::default()));
        (router(state.clone()), state, team)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, headers, json)
    }

    #[tokio::test]
    async fn test_health_and_unauthenticated() {
        let (app, _, _) = test_app().await;

        let (status, _, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, _, body) = send(&app, Method::GET, "/api/client-companies", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Authentication required");

        let (status, _, _) = send(&app, Method::GET, "/api/contacts", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_cookie_me_logout() {
        let (app, state, t) = test_app().await;
        users::create_account(
            &state.db,
            NewUser {
                name: "Filip".into(),
                email: "filip@crm.test".into(),
                password: "secret-pass".into(),
                role: Role::FreelanceConsultant,
                manager_id: Some(t.m.id),
            },
        )
        .await
        .unwrap();

        let creds = json!({ "email": "filip@crm.test", "password": "secret-pass" });
        let (status, headers, body) = send(&app, Method::POST, "/api/auth/login", None, Some(creds)).await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();
        assert_eq!(body["user"]["role"], "freelance_consultant");
        assert!(body["user"].get("passwordHash").is_none());
        let cookie = headers[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with(&format!("crm_session={};", token)));

        // Cookie transport
        let request = Request::builder()
            .uri("/api/auth/me")
            .header(header::COOKIE, format!("crm_session={}", token))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, _, body) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "filip@crm.test");
        assert_eq!(body["managerId"], t.m.id);

        let (status, _, _) = send(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _, _) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let wrong = json!({ "email": "filip@crm.test", "password": "nope-nope" });
        let (status, _, _) = send(&app, Method::POST, "/api/auth/login", None, Some(wrong)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_not_found_vs_forbidden_over_http() {
        let (app, state, t) = test_app().await;
        let foreign = insert_company(&state.db, "Foreign", t.category.id, t.other.id, t.f2.id).await;
        let token = state.auth.start_session(t.f1.id).await.unwrap();

        let uri = format!("/api/client-companies/{}", foreign.id);
        let (status, _, _) = send(&app, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let uri = format!("/api/client-companies/{}", foreign.id + 1);
        let (status, _, body) = send(&app, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Client company not found");
    }

    #[tokio::test]
    async fn test_create_contact_and_opportunity() {
        let (app, state, t) = test_app().await;
        let company = insert_company(&state.db, "Acme", t.category.id, t.m.id, t.f1.id).await;
        let token = state.auth.start_session(t.f1.id).await.unwrap();

        let contact = json!({
            "name": "Ana",
            "email": "ana@acme.example",
            "clientCompanyId": company.id,
            "salesManagerId": t.m.id,
            "freelanceConsultantId": t.f1.id,
        });
        let (status, _, body) = send(&app, Method::POST, "/api/contacts", Some(&token), Some(contact)).await;
        assert_eq!(status, StatusCode::CREATED);
        let contact_id = body["id"].as_i64().unwrap();
        assert_eq!(body["clientCompanyId"], company.id);

        let mut opportunity = json!({
            "title": "Licences",
            "stage": "proposal",
            "status": "open",
            "estimatedValue": -5.0,
            "currency": "EUR",
            "probability": 0.5,
            "contactId": contact_id,
            "salesManagerId": t.m.id,
            "freelanceConsultantId": t.f1.id,
        });
        let (status, _, _) =
            send(&app, Method::POST, "/api/opportunities", Some(&token), Some(opportunity.clone())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        opportunity["estimatedValue"] = json!(2500.0);
        let (status, _, body) =
            send(&app, Method::POST, "/api/opportunities", Some(&token), Some(opportunity)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["clientCompanyId"], company.id);

        let activity = json!({
            "entityType": "opportunity",
            "entityId": body["id"],
            "type": "call",
            "description": "Discussed pricing",
        });
        let (status, _, body) = send(&app, Method::POST, "/api/activities", Some(&token), Some(activity)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["type"], "call");
        assert_eq!(body["userId"], t.f1.id);
    }

    #[tokio::test]
    async fn test_pagination_query_parameters() {
        let (app, state, t) = test_app().await;
        let company = insert_company(&state.db, "Acme", t.category.id, t.m.id, t.f1.id).await;
        for i in 0..3 {
            insert_contact(&state.db, &format!("Contact {}", i), &company).await;
        }
        let token = state.auth.start_session(t.m.id).await.unwrap();

        let (status, _, body) =
            send(&app, Method::GET, "/api/contacts?page=0&pageSize=500", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page"], 1);
        assert_eq!(body["pageSize"], 50);
        assert_eq!(body["total"], 3);

        let (_, _, body) = send(&app, Method::GET, "/api/contacts?page=2&pageSize=2&q=", Some(&token), None).await;
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_requests_answer_with_message() {
        let (app, state, t) = test_app().await;
        let token = state.auth.start_session(t.f1.id).await.unwrap();

        let (status, headers, body) =
            send(&app, Method::POST, "/api/contacts", Some(&token), Some(json!({ "name": "Ana" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert!(body["message"].as_str().unwrap().contains("clientCompanyId"));

        let (status, _, body) = send(&app, Method::GET, "/api/contacts?page=abc", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["message"].is_string());

        let (status, _, body) = send(&app, Method::GET, "/api/contacts/abc", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["message"].is_string());

        let uri = format!("/api/contacts?page={}", i64::MAX);
        let (status, _, body) = send(&app, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_reassign_requires_admin() {
        let (app, state, t) = test_app().await;
        let company = insert_company(&state.db, "Acme", t.category.id, t.m.id, t.f1.id).await;
        let owners = json!({ "salesManagerId": t.other.id, "freelanceConsultantId": t.f2.id });
        let uri = format!("/api/admin/reassign/client-companies/{}", company.id);

        let manager = state.auth.start_session(t.m.id).await.unwrap();
        let (status, _, _) = send(&app, Method::PATCH, &uri, Some(&manager), Some(owners.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = state.auth.start_session(t.admin.id).await.unwrap();
        let (status, _, body) = send(&app, Method::PATCH, &uri, Some(&admin), Some(owners)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["salesManagerId"], t.other.id);
        assert_eq!(body["freelanceConsultantId"], t.f2.id);
    }
}
