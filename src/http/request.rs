//! Concrete request produced from a template

use serde::{Deserialize, Serialize};

/// A fully rendered request ready to send
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzRequest {
    /// HTTP method
    pub method: String,

    /// Request URL
    pub url: String,

    /// Request headers, in template order
    pub headers: Vec<(String, String)>,

    /// Form or query parameters
    pub params: Vec<(String, String)>,

    /// Proxy to route this request through
    pub proxy: Option<String>,

    /// Per-request timeout in seconds
    pub timeout: Option<u64>,
}

impl FuzzRequest {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            url: url.to_string(),
            ..Default::default()
        }
    }

    /// Parameters go in the query string for these methods, in the form body otherwise
    pub fn params_in_query(&self) -> bool {
        matches!(self.method.as_str(), "GET" | "HEAD" | "DELETE" | "OPTIONS")
    }

    /// Host part of the URL, for error reports
    pub fn host(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_placement() {
        assert!(FuzzRequest::new("get", "http://x/").params_in_query());
        assert!(!FuzzRequest::new("POST", "http://x/").params_in_query());
    }

    #[test]
    fn test_host_falls_back_to_url() {
        assert_eq!(FuzzRequest::new("GET", "http://example.com:8080/a").host(), "example.com");
        assert_eq!(FuzzRequest::new("GET", "not a url").host(), "not a url");
    }
}
