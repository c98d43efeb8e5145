//! Database backend implementations.
//!
//! # Available Backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | PostgreSQL | Row-level security enforced tenant isolation over a deadpool pool |

pub mod postgres;
