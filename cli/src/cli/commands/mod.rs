pub mod config;
pub mod fetch;
pub mod proxies;
pub mod serve;
pub mod session;
pub mod status;
