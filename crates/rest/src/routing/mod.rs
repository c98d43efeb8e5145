//! Route configuration for the HTTP API.

pub mod api_routes;

pub use api_routes::create_routes;
