//! Challenge solver protocol (FlareSolverr v1 API)

pub mod client;
pub mod request;
pub mod response;

pub use client::SolverClient;
pub use request::{Cookie, Method, RequestBuilder, SolverRequest, WaitFor};
pub use response::{Solution, SolverResponse};
