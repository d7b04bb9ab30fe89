//! Core domain types and shared logic for the stow upload server.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Upload session identifiers and lifecycle
//! - Chunk metadata accompanying part uploads
//! - Upload policy documents and their tolerant parser
//! - Configuration types

pub mod config;
pub mod error;
pub mod policy;
pub mod upload;

pub use error::{Error, Result};
pub use policy::PolicyDocument;
pub use upload::{ChunkMeta, UploadId, UploadResponse, UploadSession, UploadState};

/// Default maximum accepted file size: 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum number of parts a single upload may declare.
pub const MAX_TOTAL_PARTS: u32 = 10_000;
