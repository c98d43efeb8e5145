//! Custom Axum extractors.

pub mod tenant;

pub use tenant::CurrentTenant;
