//! wnrake Core Library
//! Proxy pool, solver client, disk cache and the fetch gateway

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod proxy;
pub mod server;
pub mod solver;
