//! Search module
//!
//! The request model and the client that runs it through the pipeline.

mod builder;
mod client;
mod models;

pub use builder::ClientBuilder;
pub use client::{Client, ENGINES_PATH, SEARCH_PATH};
pub use models::{SearchRequest, SortOrder, DEFAULT_LIMIT, MAX_LIMIT, MIN_LIMIT};
