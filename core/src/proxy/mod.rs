//! Proxy module - VPN-backed egress points
//! Written for gluetun containers running with HTTPPROXY=on

pub mod api;
pub mod auth;
pub mod cooldown;
pub mod endpoint;
pub mod pool;

pub use api::{GluetunApi, ProxyStatus};
pub use auth::Credentials;
pub use endpoint::{ProxyEndpoint, SolverProxy};
pub use pool::{ProxyInfo, ProxyPool};
