//! Bloret identity provider client.

pub mod api;
pub mod middleware;

pub use api::BloretApiClient;
