//! Common test infrastructure
//!
//! Every test spawns its own server over a fresh database and talks to it
//! through [`TestClient`]. Tests should only import from this module.

#[allow(dead_code)]
mod client;
#[allow(dead_code)]
mod constants;
#[allow(dead_code)]
mod server;

pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;
