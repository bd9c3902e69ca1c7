//! HTTP transport implementation

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::request::FuzzRequest;
use super::response::Response;
use crate::error::TransportError;

/// Sends one rendered request
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &FuzzRequest) -> Result<Response, TransportError>;
}

/// Client settings shared by every request
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Whether to follow redirects
    pub follow_redirects: bool,
    /// Maximum redirect depth
    pub max_redirects: usize,
    /// User agent string
    pub user_agent: String,
    /// Proxies a request may be routed through
    pub proxies: Vec<String>,
    /// Accept invalid TLS certificates
    pub insecure: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            follow_redirects: false,
            max_redirects: 10,
            user_agent: format!("Intruder/{}", env!("CARGO_PKG_VERSION")),
            proxies: Vec::new(),
            insecure: false,
        }
    }
}

/// reqwest-backed transport, one client per proxy
pub struct ReqwestTransport {
    /// Client used when a request carries no proxy
    direct: reqwest::Client,

    /// Clients keyed by proxy URL
    proxied: HashMap<String, reqwest::Client>,

    /// Default timeout
    default_timeout: Duration,
}

impl ReqwestTransport {
    /// Build every client up front; an invalid proxy is a setup error
    pub fn new(settings: &TransportSettings) -> Result<Self, TransportError> {
        let direct = Self::builder(settings)
            .build()
            .map_err(|e| TransportError::RequestFailed(format!("Failed to create HTTP client: {}", e)))?;

        let mut proxied = HashMap::new();
        for proxy_url in &settings.proxies {
            Self::check_proxy_url(proxy_url)?;
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| TransportError::InvalidProxy(format!("{}: {}", proxy_url, e)))?;
            let client = Self::builder(settings)
                .proxy(proxy)
                .build()
                .map_err(|e| TransportError::InvalidProxy(format!("{}: {}", proxy_url, e)))?;
            proxied.insert(proxy_url.clone(), client);
        }

        Ok(Self {
            direct,
            proxied,
            default_timeout: Duration::from_secs(settings.timeout_secs),
        })
    }

    /// reqwest accepts any scheme here but can only tunnel through HTTP(S) proxies
    fn check_proxy_url(proxy_url: &str) -> Result<(), TransportError> {
        let parsed = url::Url::parse(proxy_url)
            .map_err(|e| TransportError::InvalidProxy(format!("{}: {}", proxy_url, e)))?;
        match parsed.scheme() {
            "http" | "https" if parsed.host_str().is_some() => Ok(()),
            "http" | "https" => Err(TransportError::InvalidProxy(format!("{}: missing host", proxy_url))),
            scheme => Err(TransportError::InvalidProxy(format!(
                "{}: unsupported scheme '{}', expected http or https",
                proxy_url, scheme
            ))),
        }
    }

    fn builder(settings: &TransportSettings) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .redirect(if settings.follow_redirects {
                reqwest::redirect::Policy::limited(settings.max_redirects)
            } else {
                reqwest::redirect::Policy::none()
            })
            .user_agent(&settings.user_agent)
            .cookie_store(true)
            .danger_accept_invalid_certs(settings.insecure)
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<&reqwest::Client, TransportError> {
        match proxy {
            None => Ok(&self.direct),
            Some(url) => self
                .proxied
                .get(url)
                .ok_or_else(|| TransportError::InvalidProxy(format!("{} was not configured", url))),
        }
    }

    fn classify(&self, err: reqwest::Error, timeout: Duration) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(timeout.as_millis() as u64)
        } else if err.is_builder() {
            TransportError::InvalidUrl(err.to_string())
        } else if err.is_connect() {
            let message = format!("{:?}", err);
            if message.contains("certificate") || message.to_lowercase().contains("tls") {
                TransportError::Tls(err.to_string())
            } else {
                TransportError::Connect(err.to_string())
            }
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::RequestFailed(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &FuzzRequest) -> Result<Response, TransportError> {
        let client = self.client_for(request.proxy.as_deref())?;
        let timeout = request
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportError::RequestFailed(format!("Invalid HTTP method: {}", request.method)))?;

        let mut builder = client.request(method, &request.url).timeout(timeout);

        let mut headers = HeaderMap::new();
        for (key, value) in &request.headers {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(val)) => {
                    headers.append(name, val);
                }
                _ => tracing::debug!(header = %key, "Skipping header that is not valid on the wire"),
            }
        }
        builder = builder.headers(headers);

        if !request.params.is_empty() {
            builder = if request.params_in_query() {
                builder.query(&request.params)
            } else {
                builder.form(&request.params)
            };
        }

        let start = Instant::now();
        let response = builder.send().await.map_err(|e| self.classify(e, timeout))?;

        let status = response.status().as_u16();
        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.as_str().to_string(), v.to_string());
            }
        }

        let body = response.bytes().await.map_err(|e| self.classify(e, timeout))?;

        Ok(Response {
            status,
            headers,
            body: body.to_vec(),
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(&TransportSettings {
            timeout_secs: 2,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_with_query_params_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "admin"))
            .and(header("x-token", "t-admin"))
            .respond_with(ResponseTemplate::new(200).set_body_string("one two\nthree\n"))
            .mount(&server)
            .await;

        let mut request = FuzzRequest::new("GET", &format!("{}/search", server.uri()));
        request.headers.push(("X-Token".into(), "t-admin".into()));
        request.params.push(("q".into(), "admin".into()));

        let response = transport().send(&request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.word_count(), 3);
        assert_eq!(response.line_count(), 2);
    }

    #[tokio::test]
    async fn test_post_sends_form_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_string("user=admin&submit=Login"))
            .respond_with(ResponseTemplate::new(302))
            .mount(&server)
            .await;

        let mut request = FuzzRequest::new("POST", &format!("{}/login", server.uri()));
        request.params.push(("user".into(), "admin".into()));
        request.params.push(("submit".into(), "Login".into()));

        let response = transport().send(&request).await.unwrap();
        assert_eq!(response.status, 302);
    }

    #[tokio::test]
    async fn test_timeout_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let mut request = FuzzRequest::new("GET", &server.uri());
        request.timeout = Some(1);

        let err = transport().send(&request).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(1000)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_an_error_not_a_panic() {
        let request = FuzzRequest::new("GET", "http://127.0.0.1:1/");
        let err = transport().send(&request).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)));
    }

    #[tokio::test]
    async fn test_unknown_proxy_is_rejected() {
        let mut request = FuzzRequest::new("GET", "http://127.0.0.1:1/");
        request.proxy = Some("http://127.0.0.1:3128".into());
        let err = transport().send(&request).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidProxy(_)));
    }

    #[test]
    fn test_invalid_proxy_fails_at_setup() {
        for proxy in ["ftp://proxy.invalid:21", "socks5://127.0.0.1:1080", "not a proxy"] {
            let settings = TransportSettings {
                proxies: vec![proxy.into()],
                ..Default::default()
            };
            assert!(
                matches!(ReqwestTransport::new(&settings), Err(TransportError::InvalidProxy(_))),
                "{}",
                proxy
            );
        }
    }

    #[test]
    fn test_http_proxies_are_accepted() {
        let settings = TransportSettings {
            proxies: vec!["http://127.0.0.1:8080".into(), "https://proxy.example:3128".into()],
            ..Default::default()
        };
        let transport = ReqwestTransport::new(&settings).unwrap();
        assert_eq!(transport.proxied.len(), 2);
    }
}
