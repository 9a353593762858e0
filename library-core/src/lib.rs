//! library-core: shared infrastructure for the library catalog service.
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod usage;

pub use async_trait;
pub use axum;
pub use reqwest;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tower;
pub use tower_http;
pub use tracing;
pub use validator;
