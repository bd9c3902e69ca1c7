//! HTTP response as seen by the matcher

use std::collections::HashMap;
use std::time::Duration;

/// Response returned by a transport
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// HTTP status code
    pub status: u16,

    /// Response headers
    pub headers: HashMap<String, String>,

    /// Response body
    pub body: Vec<u8>,

    /// Time from send to full body
    pub elapsed: Duration,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            ..Default::default()
        }
    }

    /// Size of the response body in bytes
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Whitespace-delimited tokens in the body
    pub fn word_count(&self) -> usize {
        self.body_text().split_whitespace().count()
    }

    /// Newline bytes in the body
    pub fn line_count(&self) -> usize {
        self.body.iter().filter(|&&b| b == b'\n').count()
    }

    /// Get body as string
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Get a specific header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_metrics() {
        let response = Response::new(200, "hello  world\nsecond line\n");
        assert_eq!(response.size(), 25);
        assert_eq!(response.word_count(), 4);
        assert_eq!(response.line_count(), 2);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut response = Response::new(200, "");
        response.headers.insert("server".into(), "nginx".into());
        assert_eq!(response.header("Server"), Some("nginx"));
        assert_eq!(response.header("X-Powered-By"), None);
    }
}
