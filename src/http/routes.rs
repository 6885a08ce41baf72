use axum::{routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn users() -> Router<AppState> {
    Router::new()
        // `me` routes are registered as static segments and win over `:handle`.
        .route(
            "/users/me",
            get(handlers::get_own_profile).patch(handlers::update_own_profile),
        )
        .route(
            "/users/me/pin/:post_id",
            post(handlers::pin_post).delete(handlers::unpin_post),
        )
        .route("/users/me/follow-requests", get(handlers::list_follow_requests))
        .route("/users/:handle", get(handlers::get_profile))
        .route(
            "/users/:handle/follow",
            post(handlers::follow_user).delete(handlers::unfollow_user),
        )
        .route("/users/:handle/follow-request", post(handlers::send_follow_request))
        .route("/users/:handle/follow-accept", post(handlers::accept_follow_request))
        .route("/users/:handle/follow-reject", post(handlers::reject_follow_request))
        .route("/users/:handle/followers", get(handlers::list_followers))
        .route("/users/:handle/following", get(handlers::list_following))
}

pub fn feed() -> Router<AppState> {
    Router::new()
        .route("/feed", get(handlers::personal_feed))
        .route("/feed/global", get(handlers::global_feed))
}
