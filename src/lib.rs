// Library exports for the lost-and-found server
// This allows integration tests and the binary to share one module tree

pub mod auth;
pub mod chat;
pub mod claims;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod graphql;
pub mod items;
pub mod media;
pub mod routes;
pub mod state;
pub mod store;
