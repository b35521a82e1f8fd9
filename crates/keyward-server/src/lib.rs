//! # keyward-server
//!
//! HTTP surface over the Keyward account service and access gate.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{AppConfig, load_config};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
