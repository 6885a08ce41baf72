pub mod auth;
pub mod error;
pub mod feed;
pub mod posts;
pub mod profiles;
pub mod social;
