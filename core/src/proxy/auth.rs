//! Credentials for proxies and the gluetun control server

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use std::fmt;

use crate::error::FetchError;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone, PartialEq)]
pub enum Credentials {
    Basic { username: String, password: String },
    ApiKey(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credentials::ApiKey(_) => f.write_str("ApiKey(***)"),
        }
    }
}

impl Credentials {
    pub fn basic(username: &str, password: &str) -> Self {
        Credentials::Basic {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn api_key(key: &str) -> Self {
        Credentials::ApiKey(key.to_string())
    }

    /// Headers authenticating a request with these credentials
    pub fn to_headers(&self) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();
        match self {
            Credentials::Basic { username, password } => {
                let token = STANDARD.encode(format!("{}:{}", username, password));
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Basic {}", token))
                        .map_err(|e| FetchError::ProxyApi(e.to_string()))?,
                );
            }
            Credentials::ApiKey(key) => {
                headers.insert(
                    HeaderName::from_static(API_KEY_HEADER),
                    HeaderValue::from_str(key).map_err(|e| FetchError::ProxyApi(e.to_string()))?,
                );
            }
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_header() {
        let headers = Credentials::basic("user", "pass").to_headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_api_key_header() {
        let headers = Credentials::api_key("secret").to_headers().unwrap();
        assert_eq!(headers[API_KEY_HEADER], "secret");
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_invalid_header_value() {
        assert!(Credentials::api_key("bad\nkey").to_headers().is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let debug = format!("{:?}", Credentials::basic("user", "hunter2"));
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(format!("{:?}", Credentials::api_key("k")), "ApiKey(***)");
    }
}
