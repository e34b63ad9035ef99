mod admin_routes;
mod auth_routes;
mod collection_routes;
pub mod config;
pub mod error;
mod http_layers;
mod library_routes;
pub mod metrics;
pub mod ownership;
mod profile_routes;
pub mod server;
pub mod session;
pub mod state;
mod store_call;
#[cfg(test)]
mod test_store;
pub mod token;
pub mod validation;

pub use config::ServerConfig;
pub use error::{ApiError, AuthFailure};
pub use http_layers::*;
pub use server::{make_app, run_server};
pub use state::ServerState;
pub use token::TokenCodec;
