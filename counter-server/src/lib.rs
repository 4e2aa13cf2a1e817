pub mod config;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod response;
pub mod server;
pub mod service;
