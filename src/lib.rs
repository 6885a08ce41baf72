pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::sync::Arc;

use crate::app::auth::AuthVerifier;
use crate::app::feed::FeedService;
use crate::app::posts::PostService;
use crate::app::profiles::ProfileDirectory;
use crate::app::social::SocialService;
use crate::domain::feed::FeedWindow;
use crate::infra::{cache::RedisCache, db::Db};

/// Shared, cheaply clonable handles. Services are built per request from these.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub auth: Arc<dyn AuthVerifier>,
    pub feed_window: FeedWindow,
    pub global_feed_default_limit: i64,
    pub profile_cache_ttl_seconds: u64,
}

impl AppState {
    pub fn profiles(&self) -> ProfileDirectory {
        ProfileDirectory::new(
            self.db.clone(),
            self.cache.clone(),
            self.profile_cache_ttl_seconds,
        )
    }

    pub fn social(&self) -> SocialService {
        SocialService::new(self.db.clone(), self.profiles())
    }

    pub fn posts(&self) -> PostService {
        PostService::new(self.db.clone())
    }

    pub fn feed(&self) -> FeedService {
        FeedService::new(self.db.clone(), self.social())
    }
}
