//! Router assembly: REST endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod activities;
pub mod courses;
pub mod http;
pub mod users;

/// Build the application router with:
/// - `/health` (no auth)
/// - activities and courses under `/rest/...`
/// - identity-backed user endpoints under `/users/...`
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::http_health))
        // Activities
        .route(
            "/rest/activities",
            get(activities::list_activities).post(activities::create_activity),
        )
        .route(
            "/rest/activities/:id",
            get(activities::get_activity)
                .put(activities::update_activity)
                .delete(activities::delete_activity),
        )
        .route("/rest/activities/:id/check", post(activities::check_activity_answer))
        .route("/rest/activities/:id/viewed", post(activities::mark_activity_viewed))
        // Courses
        .route("/rest/courses", get(courses::list_courses).post(courses::create_course))
        .route(
            "/rest/courses/:id",
            get(courses::get_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        .route("/rest/courses/:id/activities", get(courses::get_course_activities))
        .route(
            "/rest/courses/:course_id/activities/:activity_id",
            post(courses::add_course_activity).delete(courses::remove_course_activity),
        )
        // Users
        .route("/users/roles", get(users::get_roles))
        .route("/users/update-nickname", patch(users::update_nickname))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
