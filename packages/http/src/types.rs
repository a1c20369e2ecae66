use std::time::Duration;

use bytes::Bytes;

use crate::url::parse_header_block;

/// A fully resolved HTTP request, ready for an [`HttpExecutor`].
///
/// [`HttpExecutor`]: crate::HttpExecutor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method as the guest spelled it (GET, POST, ...).
    pub method: String,

    /// Absolute URL including scheme, host, path and query.
    pub url: String,

    /// Request headers in the order given.
    pub headers: Vec<(String, String)>,

    pub body: Option<Bytes>,

    /// Per-request transport timeout. `None` uses the executor default.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    /// Build a request from the pieces a guest hands over.
    ///
    /// `headers` is a block of `Name:Value` lines separated by `\n`. A zero
    /// `timeout_ms` means no per-request timeout.
    pub fn from_parts(
        host: &str,
        secure: bool,
        method: &str,
        path: &str,
        headers: &str,
        body: Option<Bytes>,
        timeout_ms: u32,
    ) -> Self {
        let scheme = if secure { "https" } else { "http" };

        Self {
            method: method.to_string(),
            url: format!("{scheme}://{host}{path}"),
            headers: parse_header_block(headers),
            body,
            timeout: (timeout_ms > 0).then(|| Duration::from_millis(u64::from(timeout_ms))),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP response from a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,

    /// Raw response body
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Check if the response status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_builds_url_and_headers() {
        let request = HttpRequest::from_parts(
            "api.example.com:8443",
            true,
            "POST",
            "/v1/items?limit=5",
            "Content-Type: application/json\nX-Trace:abc\n",
            Some(Bytes::from_static(b"{}")),
            2500,
        );

        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "https://api.example.com:8443/v1/items?limit=5");
        assert_eq!(
            request.headers,
            vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Trace".to_string(), "abc".to_string()),
            ]
        );
        assert_eq!(request.body.as_deref(), Some(&b"{}"[..]));
        assert_eq!(request.timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn from_parts_plain_http_without_timeout() {
        let request = HttpRequest::from_parts("localhost", false, "GET", "/", "", None, 0);

        assert_eq!(request.url, "http://localhost/");
        assert!(request.headers.is_empty());
        assert!(request.body.is_none());
        assert!(request.timeout.is_none());
    }

    #[test]
    fn builders_chain() {
        let request = HttpRequest::post("http://h/p")
            .with_header("A", "1")
            .with_body("payload")
            .with_timeout(Duration::from_secs(1));

        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.body, Some(Bytes::from("payload")));
        assert_eq!(request.timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn success_range() {
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(404, "").is_success());
    }
}
