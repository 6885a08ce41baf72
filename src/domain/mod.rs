pub mod feed;
pub mod post;
pub mod profile;
pub mod social_graph;
