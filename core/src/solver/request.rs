//! Solver request builder and wire commands

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::proxy::SolverProxy;

/// Element the solver waits for before returning the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum WaitFor {
    Id(String),
    #[serde(rename = "xpath")]
    XPath(String),
    Link(String),
    ExactLink(String),
    Name(String),
    Tag(String),
    Class(String),
    Selector(String),
}

impl WaitFor {
    pub fn type_name(&self) -> &'static str {
        match self {
            WaitFor::Id(_) => "id",
            WaitFor::XPath(_) => "xpath",
            WaitFor::Link(_) => "link",
            WaitFor::ExactLink(_) => "exact-link",
            WaitFor::Name(_) => "name",
            WaitFor::Tag(_) => "tag",
            WaitFor::Class(_) => "class",
            WaitFor::Selector(_) => "selector",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            WaitFor::Id(v)
            | WaitFor::XPath(v)
            | WaitFor::Link(v)
            | WaitFor::ExactLink(v)
            | WaitFor::Name(v)
            | WaitFor::Tag(v)
            | WaitFor::Class(v)
            | WaitFor::Selector(v) => v,
        }
    }

    /// Parses a `type` name as accepted by `type_name`
    pub fn from_parts(type_name: &str, value: &str) -> Option<Self> {
        let value = value.to_string();
        Some(match type_name {
            "id" => WaitFor::Id(value),
            "xpath" => WaitFor::XPath(value),
            "link" => WaitFor::Link(value),
            "exact-link" => WaitFor::ExactLink(value),
            "name" => WaitFor::Name(value),
            "tag" => WaitFor::Tag(value),
            "class" => WaitFor::Class(value),
            "selector" => WaitFor::Selector(value),
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverRequest {
    method: Method,
    url: String,
    wait_for: Option<WaitFor>,
    cookies: Vec<Cookie>,
    no_kill: bool,
    post_data: Option<String>,
    cache: bool,
}

impl SolverRequest {
    /// GET request, cached by default
    pub fn get(url: &str) -> RequestBuilder {
        RequestBuilder(SolverRequest {
            method: Method::Get,
            url: url.to_string(),
            wait_for: None,
            cookies: Vec::new(),
            no_kill: true,
            post_data: None,
            cache: true,
        })
    }

    /// POST request, not cached by default
    pub fn post(url: &str) -> RequestBuilder {
        RequestBuilder(SolverRequest {
            method: Method::Post,
            url: url.to_string(),
            wait_for: None,
            cookies: Vec::new(),
            no_kill: true,
            post_data: Some(String::new()),
            cache: false,
        })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn post_data(&self) -> Option<&str> {
        self.post_data.as_deref()
    }

    pub fn wait_for(&self) -> Option<&WaitFor> {
        self.wait_for.as_ref()
    }

    /// Only GET responses are cached, the key does not cover POST data
    pub fn uses_cache(&self) -> bool {
        self.cache && self.method == Method::Get
    }
}

#[derive(Debug, Clone)]
pub struct RequestBuilder(SolverRequest);

impl RequestBuilder {
    pub fn wait_for(mut self, wait_for: WaitFor) -> Self {
        self.0.wait_for = Some(wait_for);
        self
    }

    pub fn cookies(mut self, cookies: &[(&str, &str)]) -> Self {
        self.0.cookies = cookies
            .iter()
            .map(|(name, value)| Cookie {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect();
        self
    }

    /// Close the browser tab after the request
    pub fn with_kill(mut self) -> Self {
        self.0.no_kill = false;
        self
    }

    pub fn without_kill(mut self) -> Self {
        self.0.no_kill = true;
        self
    }

    /// Form body, url-encoded
    pub fn form<K: AsRef<str>, V: AsRef<str>>(mut self, pairs: &[(K, V)]) -> Self {
        let mut form = form_urlencoded::Serializer::new(String::new());
        for (k, v) in pairs {
            form.append_pair(k.as_ref(), v.as_ref());
        }
        self.0.post_data = Some(form.finish());
        self
    }

    pub fn enable_cache(mut self) -> Self {
        self.0.cache = true;
        self
    }

    pub fn disable_cache(mut self) -> Self {
        self.0.cache = false;
        self
    }

    pub fn build(self) -> SolverRequest {
        self.0
    }
}

/// Wire format of a solver command
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Command<'a> {
    cmd: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    proxy: Option<SolverProxy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cookies: Option<&'a [Cookie]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    no_kill: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_data: Option<&'a str>,
}

impl<'a> Command<'a> {
    fn empty(cmd: &'static str) -> Self {
        Self {
            cmd,
            url: None,
            max_timeout: None,
            session: None,
            proxy: None,
            wait_type: None,
            wait_for: None,
            cookies: None,
            no_kill: None,
            post_data: None,
        }
    }

    pub(crate) fn create_session(proxy: Option<SolverProxy>) -> Self {
        Self {
            proxy,
            ..Self::empty("sessions.create")
        }
    }

    pub(crate) fn destroy_session(session: &'a str) -> Self {
        Self {
            session: Some(session),
            ..Self::empty("sessions.destroy")
        }
    }

    pub(crate) fn list_sessions() -> Self {
        Self::empty("sessions.list")
    }

    pub(crate) fn request(
        request: &'a SolverRequest,
        session: Option<&'a str>,
        max_timeout_ms: u64,
    ) -> Self {
        let cmd = match request.method {
            Method::Get => "request.get",
            Method::Post => "request.post",
        };
        Self {
            url: Some(&request.url),
            max_timeout: Some(max_timeout_ms),
            session,
            wait_type: request.wait_for.as_ref().map(WaitFor::type_name),
            wait_for: request.wait_for.as_ref().map(WaitFor::value),
            cookies: if request.cookies.is_empty() {
                None
            } else {
                Some(request.cookies.as_slice())
            },
            no_kill: Some(request.no_kill),
            post_data: request.post_data.as_deref(),
            ..Self::empty(cmd)
        }
    }
}
