//! Upload authorization signing for the stow upload server.
//!
//! This crate provides:
//! - Secret key handling
//! - Policy document validation and signing (legacy and v4 schemes)
//! - Canonical REST request signing for chunked uploads

pub mod error;
pub mod key;
pub mod signer;

pub use error::{SignerError, SignerResult};
pub use key::SecretKey;
pub use signer::{PolicySignature, SigningScheme, UploadSigner};
