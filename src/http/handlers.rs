use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::error::ServiceError;
use crate::app::feed::GLOBAL_FEED_MAX_LIMIT;
use crate::domain::post::Post;
use crate::domain::profile::{is_valid_handle, Profile, ProfileChanges, PublicProfile};
use crate::domain::social_graph::{FollowRequest, PendingFollowRequest, SocialUserEdge};
use crate::http::{AppError, AuthUser};
use crate::AppState;

const DEFAULT_PAGE_LIMIT: i64 = 30;
const MAX_PAGE_LIMIT: i64 = 200;
const MAX_DISPLAY_NAME_LEN: usize = 64;
const MAX_BIO_LEN: usize = 280;
const MAX_AVATAR_URL_LEN: usize = 2048;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, Uuid)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let mut parts = cursor.splitn(2, '/');
    let timestamp = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;
    let id = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, Uuid)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

fn page_limit(limit: Option<i64>) -> Result<i64, AppError> {
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    Ok(limit)
}

fn validate_handle(handle: &str) -> Result<(), AppError> {
    if !is_valid_handle(handle) {
        return Err(AppError::bad_request("invalid handle"));
    }
    Ok(())
}

/// Maps a core failure to its HTTP form, logging store failures with context.
fn service_error<'a>(
    operation: &'static str,
    actor_id: Option<Uuid>,
    target_handle: Option<&'a str>,
) -> impl FnOnce(ServiceError) -> AppError + 'a {
    move |err| {
        if matches!(err, ServiceError::Store(_) | ServiceError::Unavailable(_)) {
            tracing::error!(
                error = ?err,
                operation,
                actor_id = ?actor_id,
                target_handle = ?target_handle,
                "request failed"
            );
        }
        AppError::from(err)
    }
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ProfileResponse {
    pub profile: PublicProfile,
    pub pinned_posts: Vec<Post>,
}

pub async fn get_profile(
    Path(handle): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ProfileResponse>, AppError> {
    validate_handle(&handle)?;

    let profile = state
        .profiles()
        .resolve_by_handle(&handle)
        .await
        .map_err(service_error("get_profile", None, Some(&handle)))?;

    let social = state.social();
    let posts = state.posts();
    let (stats, pinned_posts) =
        futures::try_join!(social.stats(profile.id), posts.list_pinned(profile.id))
            .map_err(service_error("get_profile", None, Some(&handle)))?;

    Ok(Json(ProfileResponse {
        profile: PublicProfile { profile, stats },
        pinned_posts,
    }))
}

#[derive(Serialize)]
pub struct OwnProfileResponse {
    pub profile: PublicProfile,
    pub posts: Vec<Post>,
}

pub async fn get_own_profile(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<OwnProfileResponse>, AppError> {
    let profile = state
        .profiles()
        .get_by_id(auth.user_id)
        .await
        .map_err(service_error("get_own_profile", Some(auth.user_id), None))?;

    let social = state.social();
    let posts = state.posts();
    let (stats, posts) =
        futures::try_join!(social.stats(profile.id), posts.list_by_owner(profile.id))
            .map_err(service_error("get_own_profile", Some(auth.user_id), None))?;

    Ok(Json(OwnProfileResponse {
        profile: PublicProfile { profile, stats },
        posts,
    }))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub handle: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl UpdateProfileRequest {
    fn validate(self) -> Result<ProfileChanges, AppError> {
        if self.handle.is_none()
            && self.display_name.is_none()
            && self.bio.is_none()
            && self.avatar_url.is_none()
        {
            return Err(AppError::bad_request("no profile fields to update"));
        }
        if let Some(handle) = &self.handle {
            validate_handle(handle)?;
        }
        if let Some(display_name) = &self.display_name {
            if display_name.trim().is_empty() {
                return Err(AppError::bad_request("display_name cannot be empty"));
            }
            if display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
                return Err(AppError::bad_request("display_name must be at most 64 characters"));
            }
        }
        if let Some(bio) = &self.bio {
            if bio.chars().count() > MAX_BIO_LEN {
                return Err(AppError::bad_request("bio must be at most 280 characters"));
            }
        }
        if let Some(avatar_url) = &self.avatar_url {
            if avatar_url.len() > MAX_AVATAR_URL_LEN {
                return Err(AppError::bad_request("avatar_url is too long"));
            }
        }

        Ok(ProfileChanges {
            handle: self.handle,
            display_name: self.display_name,
            bio: self.bio,
            avatar_url: self.avatar_url,
        })
    }
}

pub async fn update_own_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    let changes = payload.validate()?;

    let profile = state
        .profiles()
        .update_profile(auth.user_id, changes)
        .await
        .map_err(service_error("update_profile", Some(auth.user_id), None))?;

    Ok(Json(profile))
}

pub async fn pin_post(
    Path(post_id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .posts()
        .set_pinned(auth.user_id, post_id, true)
        .await
        .map_err(service_error("pin_post", Some(auth.user_id), None))?;

    Ok(Json(MessageResponse {
        message: "post pinned",
    }))
}

pub async fn unpin_post(
    Path(post_id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .posts()
        .set_pinned(auth.user_id, post_id, false)
        .await
        .map_err(service_error("unpin_post", Some(auth.user_id), None))?;

    Ok(Json(MessageResponse {
        message: "post unpinned",
    }))
}

// ---------------------------------------------------------------------------
// Social graph
// ---------------------------------------------------------------------------

pub async fn follow_user(
    Path(handle): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_handle(&handle)?;

    state
        .social()
        .follow(auth.user_id, &handle)
        .await
        .map_err(service_error("follow", Some(auth.user_id), Some(&handle)))?;

    Ok(Json(MessageResponse {
        message: "followed successfully",
    }))
}

#[derive(Serialize)]
pub struct UnfollowResponse {
    pub message: &'static str,
    pub unfollowed: bool,
}

pub async fn unfollow_user(
    Path(handle): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnfollowResponse>, AppError> {
    validate_handle(&handle)?;

    let unfollowed = state
        .social()
        .unfollow(auth.user_id, &handle)
        .await
        .map_err(service_error("unfollow", Some(auth.user_id), Some(&handle)))?;

    Ok(Json(UnfollowResponse {
        message: "unfollowed successfully",
        unfollowed,
    }))
}

#[derive(Serialize)]
pub struct FollowRequestResponse {
    pub message: &'static str,
    pub request: FollowRequest,
}

pub async fn send_follow_request(
    Path(handle): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowRequestResponse>, AppError> {
    validate_handle(&handle)?;

    let request = state
        .social()
        .send_follow_request(auth.user_id, &handle)
        .await
        .map_err(service_error("send_follow_request", Some(auth.user_id), Some(&handle)))?;

    Ok(Json(FollowRequestResponse {
        message: "follow request sent",
        request,
    }))
}

pub async fn list_follow_requests(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PendingFollowRequest>>, AppError> {
    let requests = state
        .social()
        .list_pending_requests(auth.user_id)
        .await
        .map_err(service_error("list_follow_requests", Some(auth.user_id), None))?;

    Ok(Json(requests))
}

pub async fn accept_follow_request(
    Path(handle): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_handle(&handle)?;

    state
        .social()
        .accept_follow_request(auth.user_id, &handle)
        .await
        .map_err(service_error("accept_follow_request", Some(auth.user_id), Some(&handle)))?;

    Ok(Json(MessageResponse {
        message: "follow request accepted",
    }))
}

pub async fn reject_follow_request(
    Path(handle): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_handle(&handle)?;

    state
        .social()
        .reject_follow_request(auth.user_id, &handle)
        .await
        .map_err(service_error("reject_follow_request", Some(auth.user_id), Some(&handle)))?;

    Ok(Json(MessageResponse {
        message: "follow request rejected",
    }))
}

pub async fn list_followers(
    Path(handle): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<SocialUserEdge>>, AppError> {
    validate_handle(&handle)?;
    let limit = page_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let mut followers = state
        .social()
        .list_followers(&handle, cursor, limit + 1)
        .await
        .map_err(service_error("list_followers", None, Some(&handle)))?;

    let next_cursor = if followers.len() > limit as usize {
        followers.pop();
        followers.last().map(|last| (last.followed_at, last.user.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: followers,
        next_cursor: encode_cursor(next_cursor),
    }))
}

pub async fn list_following(
    Path(handle): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<SocialUserEdge>>, AppError> {
    validate_handle(&handle)?;
    let limit = page_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let mut following = state
        .social()
        .list_following(&handle, cursor, limit + 1)
        .await
        .map_err(service_error("list_following", None, Some(&handle)))?;

    let next_cursor = if following.len() > limit as usize {
        following.pop();
        following.last().map(|last| (last.followed_at, last.user.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: following,
        next_cursor: encode_cursor(next_cursor),
    }))
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

pub async fn personal_feed(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Post>>, AppError> {
    let limit = page_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let (posts, next_cursor) = state
        .feed()
        .personal_feed(auth.user_id, state.feed_window, cursor, limit)
        .await
        .map_err(service_error("personal_feed", Some(auth.user_id), None))?;

    Ok(Json(ListResponse {
        items: posts,
        next_cursor: encode_cursor(next_cursor),
    }))
}

#[derive(Deserialize)]
pub struct GlobalFeedQuery {
    pub limit: Option<i64>,
}

pub async fn global_feed(
    State(state): State<AppState>,
    Query(query): Query<GlobalFeedQuery>,
) -> Result<Json<Vec<Post>>, AppError> {
    let limit = query.limit.unwrap_or(state.global_feed_default_limit);
    if !(1..=GLOBAL_FEED_MAX_LIMIT).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 100"));
    }

    let posts = state
        .feed()
        .global_feed(limit, state.feed_window)
        .await
        .map_err(service_error("global_feed", None, None))?;

    Ok(Json(posts))
}
