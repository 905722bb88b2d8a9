//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! middleware chain renders an `HttpRequest` and hands it to a `Transport`
//! supplied by the caller; the core never opens a socket itself. TLS, Unix
//! sockets, timeouts and retries all live behind `Transport`.
//!
//! Response bodies are delivered to the chain in chunks, in arrival order,
//! on the thread that issued the request. That is what lets streaming
//! endpoints (build output, events, export) hand each chunk to a caller hook
//! without buffering the whole body.

use url::form_urlencoded;

use crate::error::Result;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const USER_AGENT: &str = "User-Agent";
pub const JSON_MEDIA_TYPE: &str = "application/json";
pub const TAR_MEDIA_TYPE: &str = "application/tar";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// An HTTP request described as plain data.
///
/// Rendered by `Chain::prepare` after every request phase has run. `host`
/// is the engine URL from `ClientConfig` (for example `tcp://127.0.0.1:2375`
/// or `unix:///var/run/docker.sock`); the transport decides how to dial it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub host: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Path plus form-urlencoded query string.
    pub fn uri(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        format!("{}?{query}", self.path)
    }

    /// Absolute URL: host followed by `uri()`.
    pub fn url(&self) -> String {
        format!("{}{}", self.host.trim_end_matches('/'), self.uri())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header(&self.headers, name)
    }
}

/// Status line and headers of a response; the body travels separately
/// through the chunk callback given to `Transport::execute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

/// A complete HTTP response described as plain data.
///
/// Constructed by the chain from a `ResponseHead` and the buffered body, or
/// by a caller that executed an `HttpRequest` on its own and passes the
/// result to `Chain::finish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// The HTTP client the core talks through.
///
/// Implementations send `request`, then feed every body chunk to `on_chunk`
/// in arrival order before returning the head. Status codes are reported,
/// not raised: turning them into errors is the chain's job. Failures to
/// connect or read map to `ApiError::Connection` or `ApiError::Timeout`.
pub trait Transport {
    fn execute(
        &mut self,
        request: &HttpRequest,
        on_chunk: &mut dyn FnMut(&[u8]),
    ) -> Result<ResponseHead>;
}

/// Case-insensitive header lookup.
pub fn header<'h>(headers: &'h [(String, String)], name: &str) -> Option<&'h str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Replace an existing header (matched case-insensitively) or append it.
pub fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
        Some(entry) => entry.1 = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

/// True when the `Content-Type` header names the JSON media type.
/// Parameters such as `charset` are ignored.
pub fn is_json(headers: &[(String, String)]) -> bool {
    header(headers, CONTENT_TYPE)
        .and_then(|value| value.split(';').next())
        .map(|media| media.trim().eq_ignore_ascii_case(JSON_MEDIA_TYPE))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            host: "http://localhost:2375/".to_string(),
            path: "/v1.16/containers/json".to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[test]
    fn uri_without_query_is_path() {
        assert_eq!(request().uri(), "/v1.16/containers/json");
    }

    #[test]
    fn uri_encodes_query_pairs() {
        let mut req = request();
        req.query = vec![
            ("all".to_string(), "true".to_string()),
            ("filters".to_string(), "{\"status\":[\"running\"]}".to_string()),
        ];
        assert_eq!(
            req.uri(),
            "/v1.16/containers/json?all=true&filters=%7B%22status%22%3A%5B%22running%22%5D%7D"
        );
    }

    #[test]
    fn url_joins_host_without_double_slash() {
        assert_eq!(request().url(), "http://localhost:2375/v1.16/containers/json");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let headers = vec![("content-type".to_string(), "application/json".to_string())];
        assert_eq!(header(&headers, "Content-Type"), Some("application/json"));
        assert_eq!(header(&headers, "Accept"), None);
    }

    #[test]
    fn set_header_replaces_existing_entry() {
        let mut headers = vec![("user-agent".to_string(), "old".to_string())];
        set_header(&mut headers, USER_AGENT, "new");
        set_header(&mut headers, "Accept", "*/*");
        assert_eq!(
            headers,
            vec![
                ("user-agent".to_string(), "new".to_string()),
                ("Accept".to_string(), "*/*".to_string()),
            ]
        );
    }

    #[test]
    fn json_detection_ignores_parameters() {
        let headers = vec![(
            CONTENT_TYPE.to_string(),
            "application/json; charset=utf-8".to_string(),
        )];
        assert!(is_json(&headers));
        let headers = vec![(CONTENT_TYPE.to_string(), "text/plain".to_string())];
        assert!(!is_json(&headers));
        assert!(!is_json(&[]));
    }
}
