//! Feed Tests
//!
//! Personal feed (followees, newest first) and the global trending feed.

mod common;

use axum::http::StatusCode;
use common::app;
use time::Duration;
use uuid::Uuid;

fn item_ids(body: &serde_json::Value) -> Vec<Uuid> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|p| Uuid::parse_str(p["id"].as_str().unwrap()).unwrap())
        .collect()
}

// ===========================================================================
// Personal feed
// ===========================================================================

#[tokio::test]
async fn personal_feed_shows_followee_posts_newest_first() {
    let app = app().await;
    let reader = app.create_user("feed_p_reader").await;
    let author_b = app.create_user("feed_p_b").await;
    let author_c = app.create_user("feed_p_c").await;
    let stranger = app.create_user("feed_p_stranger").await;

    for author in [&author_b, &author_c] {
        app.post(
            &format!("/users/{}/follow", author.handle),
            Some(&reader.access_token),
        )
        .await;
    }

    // Only B posts; C is followed but silent
    let older = app.create_post(author_b.id, 0, Duration::hours(3)).await;
    let newer = app.create_post(author_b.id, 0, Duration::hours(1)).await;
    app.create_post(stranger.id, 50, Duration::minutes(10)).await;

    let resp = app.get("/feed", Some(&reader.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(item_ids(&body["items"]), vec![newer, older]);
    assert_eq!(body["items"][0]["owner_handle"], author_b.handle.as_str());
    assert!(body["next_cursor"].is_null());
}

#[tokio::test]
async fn personal_feed_empty_without_followees() {
    let app = app().await;
    let reader = app.create_user("feed_empty_reader").await;
    let author = app.create_user("feed_empty_author").await;
    app.create_post(author.id, 10, Duration::minutes(5)).await;

    let resp = app.get("/feed", Some(&reader.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert!(body["items"].as_array().unwrap().is_empty());
    assert!(body["next_cursor"].is_null());
}

#[tokio::test]
async fn personal_feed_excludes_posts_outside_window() {
    let app = app().await;
    let reader = app.create_user("feed_win_reader").await;
    let author = app.create_user("feed_win_author").await;
    app.post(
        &format!("/users/{}/follow", author.handle),
        Some(&reader.access_token),
    )
    .await;

    let fresh = app.create_post(author.id, 0, Duration::hours(2)).await;
    app.create_post(author.id, 0, Duration::hours(25)).await;

    let body = app.get("/feed", Some(&reader.access_token)).await.json();
    assert_eq!(item_ids(&body["items"]), vec![fresh]);
}

#[tokio::test]
async fn personal_feed_drops_unfollowed_authors() {
    let app = app().await;
    let reader = app.create_user("feed_unf_reader").await;
    let author = app.create_user("feed_unf_author").await;
    let path = format!("/users/{}/follow", author.handle);

    app.post(&path, Some(&reader.access_token)).await;
    app.create_post(author.id, 0, Duration::minutes(30)).await;

    let body = app.get("/feed", Some(&reader.access_token)).await.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    app.delete(&path, Some(&reader.access_token)).await;
    let body = app.get("/feed", Some(&reader.access_token)).await.json();
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn personal_feed_paginates() {
    let app = app().await;
    let reader = app.create_user("feed_page_reader").await;
    let author = app.create_user("feed_page_author").await;
    app.post(
        &format!("/users/{}/follow", author.handle),
        Some(&reader.access_token),
    )
    .await;

    let mut expected = Vec::new();
    for minutes in [10, 20, 30, 40, 50] {
        expected.push(app.create_post(author.id, 0, Duration::minutes(minutes)).await);
    }

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0;
    loop {
        let path = match &cursor {
            Some(c) => format!("/feed?limit=2&cursor={}", c.replace('+', "%2B")),
            None => "/feed?limit=2".to_string(),
        };
        let resp = app.get(&path, Some(&reader.access_token)).await;
        assert_eq!(resp.status, StatusCode::OK);
        let body = resp.json();
        let page = item_ids(&body["items"]);
        assert!(page.len() <= 2);
        seen.extend(page);
        pages += 1;

        match body["next_cursor"].as_str() {
            Some(next) => cursor = Some(next.to_string()),
            None => break,
        }
        assert!(pages < 10, "pagination did not terminate");
    }

    assert_eq!(pages, 3);
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn personal_feed_rejects_bad_cursor() {
    let app = app().await;
    let reader = app.create_user("feed_badcur").await;

    let resp = app
        .get("/feed?cursor=not-a-cursor", Some(&reader.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "invalid cursor");
}

#[tokio::test]
async fn personal_feed_requires_auth() {
    let app = app().await;

    let resp = app.get("/feed", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Global feed
// ===========================================================================

#[tokio::test]
async fn global_feed_orders_by_reactions() {
    let app = app().await;
    let author = app.create_user("feed_g_author").await;

    // Counts high enough to outrank posts from other tests in this binary
    let low = app.create_post(author.id, 1_000_002, Duration::hours(1)).await;
    let high = app.create_post(author.id, 1_000_009, Duration::hours(2)).await;
    let mid = app.create_post(author.id, 1_000_005, Duration::hours(3)).await;

    let resp = app.get("/feed/global?limit=100", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let ids: Vec<Uuid> = item_ids(&resp.json())
        .into_iter()
        .filter(|id| [low, high, mid].contains(id))
        .collect();
    assert_eq!(ids, vec![high, mid, low]);
}

#[tokio::test]
async fn global_feed_breaks_ties_by_recency() {
    let app = app().await;
    let author = app.create_user("feed_g_tie").await;

    let older = app.create_post(author.id, 2_000_000, Duration::hours(5)).await;
    let newer = app.create_post(author.id, 2_000_000, Duration::hours(1)).await;

    let ids: Vec<Uuid> = item_ids(&app.get("/feed/global?limit=100", None).await.json())
        .into_iter()
        .filter(|id| *id == older || *id == newer)
        .collect();
    assert_eq!(ids, vec![newer, older]);
}

#[tokio::test]
async fn global_feed_excludes_old_posts() {
    let app = app().await;
    let author = app.create_user("feed_g_old").await;

    let stale = app.create_post(author.id, 3_000_000, Duration::hours(25)).await;
    let fresh = app.create_post(author.id, 5, Duration::hours(23)).await;

    let ids = item_ids(&app.get("/feed/global?limit=100", None).await.json());
    assert!(!ids.contains(&stale));
    assert!(ids.contains(&fresh));
}

#[tokio::test]
async fn global_feed_respects_limit() {
    let app = app().await;
    let author = app.create_user("feed_g_limit").await;
    for i in 0..3 {
        app.create_post(author.id, i, Duration::minutes(5)).await;
    }

    let resp = app.get("/feed/global?limit=2", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json().as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn global_feed_rejects_out_of_range_limit() {
    let app = app().await;

    for limit in ["0", "101", "-3"] {
        let resp = app
            .get(&format!("/feed/global?limit={}", limit), None)
            .await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.error_kind(), "validation");
    }
}
