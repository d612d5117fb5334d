use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{
    addresses, admin, appointments, attachments, auth, clients, lawyers, reviews, search, time_slots,
};
use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/social/signup", post(auth::social_signup))
        .route("/auth/social/login", post(auth::social_login))
        .route("/auth/me", get(auth::me))
        .route("/verify/admin", get(auth::verify_admin))
        .route("/verify/lawyer", get(auth::verify_lawyer))
        .route("/verify/client", get(auth::verify_client))
        .route("/addresses", get(addresses::list).post(addresses::create))
        .route(
            "/addresses/{id}",
            get(addresses::retrieve)
                .put(addresses::update)
                .patch(addresses::update)
                .delete(addresses::destroy),
        )
        .route("/time-slots", get(time_slots::list).post(time_slots::create))
        .route(
            "/time-slots/{id}",
            get(time_slots::retrieve)
                .put(time_slots::update)
                .patch(time_slots::update)
                .delete(time_slots::destroy),
        )
        .route("/lawyers", get(lawyers::list).post(lawyers::create))
        .route(
            "/lawyers/{lawyer_id}",
            get(lawyers::retrieve)
                .put(lawyers::update)
                .patch(lawyers::update)
                .delete(lawyers::destroy),
        )
        .route(
            "/lawyers/{lawyer_id}/images",
            get(attachments::list_images).post(attachments::create_image),
        )
        .route(
            "/lawyers/{lawyer_id}/images/{id}",
            get(attachments::retrieve_image)
                .put(attachments::update_image)
                .patch(attachments::update_image)
                .delete(attachments::destroy_image),
        )
        .route(
            "/lawyers/{lawyer_id}/documents",
            get(attachments::list_documents).post(attachments::create_document),
        )
        .route(
            "/lawyers/{lawyer_id}/documents/{id}",
            get(attachments::retrieve_document)
                .put(attachments::update_document)
                .patch(attachments::update_document)
                .delete(attachments::destroy_document),
        )
        .route(
            "/lawyers/{lawyer_id}/appointments",
            get(appointments::client_list).post(appointments::client_create),
        )
        .route(
            "/lawyers/{lawyer_id}/reviews",
            get(reviews::list).post(reviews::create),
        )
        .route("/clients", get(clients::list).post(clients::create))
        .route(
            "/clients/{id}",
            get(clients::retrieve)
                .put(clients::update)
                .patch(clients::update)
                .delete(clients::destroy),
        )
        .route("/appointments", get(appointments::lawyer_list))
        .route("/appointments/requests", get(appointments::requests))
        .route("/appointments/accepted", get(appointments::accepted))
        .route(
            "/appointments/{id}",
            get(appointments::lawyer_retrieve).delete(appointments::lawyer_destroy),
        )
        .route("/appointments/{id}/accept", post(appointments::accept))
        .route("/appointments/{id}/refuse", post(appointments::refuse))
        .route("/search/lawyers", get(search::search_lawyers))
        .route("/search/lawyers/category", get(search::search_by_category))
        .route("/search/profiles", get(search::search_profiles))
        .route("/admin/lawyers", get(admin::list).post(admin::create))
        .route(
            "/admin/lawyers/{id}",
            get(admin::retrieve)
                .put(admin::update)
                .patch(admin::update)
                .delete(admin::destroy),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;

    // The pool never connects; every request below is answered before a query runs.
    fn app() -> Router {
        let config = Config::from_lookup(|name| match name {
            "DATABASE_URL" => Some("postgres://lawbook@localhost/unused".to_string()),
            _ => None,
        })
        .unwrap();
        let pool = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
        router(AppState { pool, config: Arc::new(config) })
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn profile_endpoints_need_a_token() {
        for uri in ["/lawyers", "/clients", "/addresses", "/time-slots", "/auth/me", "/appointments"] {
            let (status, body) = send(get_request(uri)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
            assert_eq!(body, json!({ "detail": "Authentication credentials were not provided." }));
        }
    }

    #[tokio::test]
    async fn admin_dashboard_refuses_creation() {
        let request = Request::builder()
            .method("POST")
            .uri("/admin/lawyers")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, json!({ "error": "Method Not Allowed" }));
    }

    #[tokio::test]
    async fn admin_listing_needs_a_token() {
        let (status, _) = send(get_request("/admin/lawyers")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn empty_verify_token_is_invalid() {
        for uri in ["/verify/admin?token=", "/verify/lawyer", "/verify/client?token=%20"] {
            let (status, body) = send(get_request(uri)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({ "success": false, "message": "Token is invalid." }));
        }
    }

    #[tokio::test]
    async fn lawyer_dashboard_reports_missing_token_in_envelope() {
        for uri in ["/appointments/requests", "/appointments/accepted"] {
            let (status, body) = send(get_request(uri)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(
                body,
                json!({ "success": false, "message": "Access denied. Token not provided." })
            );
        }
    }

    #[tokio::test]
    async fn profile_search_rejects_bad_rating() {
        let (status, body) = send(get_request("/search/profiles?rating=five")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "rating": ["A valid number is required."] }));
    }

    #[tokio::test]
    async fn profile_search_rejects_page_zero() {
        let (status, body) = send(get_request("/search/profiles?page=0")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "detail": "Invalid page." }));
    }

    fn json_post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn malformed_bodies_are_field_errors() {
        let (status, body) = send(json_post("/auth/social/signup", json!({ "id": "1", "email": "x@y.z" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "provider": ["This field is required."] }));

        let (status, body) = send(json_post(
            "/auth/social/login",
            json!({ "provider": "google", "id": 7, "email": "x@y.z" }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("id").is_some(), "{}", body);
    }

    #[tokio::test]
    async fn body_without_json_content_type_is_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/auth/social/signup")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "non_field_errors": ["Expected a JSON request body."] }));
    }

    #[tokio::test]
    async fn non_numeric_ids_are_404() {
        let (status, body) = send(get_request("/lawyers/abc/reviews")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "detail": "Not found." }));
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let (status, _) = send(get_request("/lawyers/1/unknown")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
