//! HTTP components and their shared wire types.

pub mod client;
pub mod pending;
pub mod server;
pub mod types;

pub use client::HttpClient;
pub use server::HttpServer;
