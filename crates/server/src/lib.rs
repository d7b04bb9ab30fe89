//! HTTP upload server.
//!
//! This crate provides the HTTP surface:
//! - Chunked and simple upload endpoints with reassembly
//! - Upload deletion, including the POST method override
//! - Policy and REST request signing
//! - Post-hoc verification of uploads that bypassed this server

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
