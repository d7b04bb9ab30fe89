//! Common test utilities.

pub mod server;

#[allow(unused_imports)]
pub use server::TestServer;
