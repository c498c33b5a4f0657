//! Semantic search over indexed codebases

pub mod gateway;

pub use gateway::{SearchGateway, SearchRequest, SearchResponse, SearchResultItem};
