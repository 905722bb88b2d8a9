//! Request/response middleware around a `Transport`.
//!
//! # Overview
//! A `Datum` describes one in-flight request. A `Chain` runs it through an
//! ordered list of stages: every stage's request phase in declared order,
//! then the transport, then every stage's response phase in reverse order
//! (onion model). The stage declared last therefore sits next to the
//! transport.
//!
//! # Design
//! - Stages are plain objects behind `Arc<dyn Stage>`; composition is the
//!   order of the vector, there is no inheritance between stages.
//! - `prepare` and `finish` expose the two halves separately so a host that
//!   performs its own I/O can drive the chain without a `Transport`.
//! - A stage error aborts the chain immediately. Mutations already applied
//!   to the datum stay visible to the caller.

mod casing;
mod expects;
mod json;
mod version;

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

pub use casing::CasingStage;
pub use expects::ExpectsStage;
pub use json::JsonStage;
pub use version::VersionStage;

/// Request body as it travels through the request phases.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    Text(String),
    /// Structured body; `JsonStage` serializes it when the request is JSON.
    Json(Value),
}

impl Body {
    fn into_bytes(self) -> Result<Option<Vec<u8>>> {
        match self {
            Body::Empty => Ok(None),
            Body::Bytes(bytes) => Ok(Some(bytes)),
            Body::Text(text) => Ok(Some(text.into_bytes())),
            Body::Json(value) => serde_json::to_vec(&value)
                .map(Some)
                .map_err(|e| ApiError::Serialization(e.to_string())),
        }
    }
}

/// Handler fed with each response body chunk in arrival order.
pub type ChunkHook<'a> = Box<dyn FnMut(&[u8]) + 'a>;

/// Bytes of a streamed body retained for error reporting.
pub const ERROR_BODY_LIMIT: usize = 64 * 1024;

/// One in-flight request.
pub struct Datum<'a> {
    pub method: HttpMethod,
    pub host: String,
    pub path: String,
    pub query: Map<String, Value>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
    /// Status codes the caller accepts. `VersionStage` fills in 200..=204
    /// when left unset.
    pub expects: Option<Vec<u16>>,
    /// When set, the response body is streamed here instead of buffered.
    /// The first `ERROR_BODY_LIMIT` bytes are still kept aside so a status
    /// outside `expects` reports the engine's message.
    pub on_chunk: Option<ChunkHook<'a>>,
}

impl<'a> Datum<'a> {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            host: String::new(),
            path: path.into(),
            query: Map::new(),
            headers: Vec::new(),
            body: Body::Empty,
            expects: None,
            on_chunk: None,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn query(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.query.insert(key.to_string(), value.into());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        crate::http::set_header(&mut self.headers, name, value);
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn expects(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.expects = Some(statuses.into_iter().collect());
        self
    }

    pub fn on_chunk(mut self, hook: impl FnMut(&[u8]) + 'a) -> Self {
        self.on_chunk = Some(Box::new(hook));
        self
    }

    /// Render the datum as a plain request, leaving `Body::Empty` behind.
    fn render(&mut self) -> Result<HttpRequest> {
        let body = std::mem::replace(&mut self.body, Body::Empty).into_bytes()?;
        let query = self
            .query
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect();
        Ok(HttpRequest {
            method: self.method,
            host: self.host.clone(),
            path: self.path.clone(),
            query,
            headers: self.headers.clone(),
            body,
        })
    }
}

impl fmt::Debug for Datum<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datum")
            .field("method", &self.method)
            .field("host", &self.host)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("expects", &self.expects)
            .field("streaming", &self.on_chunk.is_some())
            .finish()
    }
}

/// Response body state. Decoding moves `Raw` to `Decoded` once.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Raw(Vec<u8>),
    /// `None` for an absent, empty or literal `null` body.
    Decoded(Option<Value>),
}

/// A response as it travels back through the response phases.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

impl Response {
    pub fn header(&self, name: &str) -> Option<&str> {
        crate::http::header(&self.headers, name)
    }

    /// Raw body as text, or the decoded value re-serialized.
    pub fn text(&self) -> String {
        match &self.body {
            ResponseBody::Raw(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            ResponseBody::Decoded(Some(value)) => value.to_string(),
            ResponseBody::Decoded(None) => String::new(),
        }
    }

    /// Decoded body, failing when the body was not decoded as JSON.
    pub fn json(&self) -> Result<Option<&Value>> {
        match &self.body {
            ResponseBody::Decoded(value) => Ok(value.as_ref()),
            ResponseBody::Raw(_) => Err(ApiError::UnexpectedResponse(format!(
                "expected a JSON body, got: {}",
                self.text()
            ))),
        }
    }

    /// Decoded body as a mapping.
    pub fn object(&self) -> Result<&Map<String, Value>> {
        match self.json()? {
            Some(Value::Object(map)) => Ok(map),
            other => Err(ApiError::UnexpectedResponse(format!(
                "expected a JSON object, got: {}",
                other.map(Value::to_string).unwrap_or_else(|| "nothing".to_string())
            ))),
        }
    }
}

impl From<HttpResponse> for Response {
    fn from(response: HttpResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: ResponseBody::Raw(response.body),
        }
    }
}

/// One unit of the chain.
pub trait Stage: Send + Sync {
    fn request_call(&self, _datum: &mut Datum<'_>) -> Result<()> {
        Ok(())
    }

    fn response_call(&self, _datum: &Datum<'_>, _response: &mut Response) -> Result<()> {
        Ok(())
    }
}

/// Ordered composition of stages. An empty chain passes requests and
/// responses through unchanged.
#[derive(Clone, Default)]
pub struct Chain {
    stages: Vec<Arc<dyn Stage>>,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("stages", &self.stages.len()).finish()
    }
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain used by `EngineClient`: casing/JSON, status expectations, then
    /// versioning next to the transport.
    pub fn standard(api_version: &str, user_agent: &str) -> Self {
        Self::new()
            .with(CasingStage::new())
            .with(ExpectsStage)
            .with(VersionStage::new(api_version, user_agent))
    }

    /// Append `stage`, placing it closer to the transport than the stages
    /// already present.
    pub fn with(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run the request phases and render the outgoing request.
    pub fn prepare(&self, datum: &mut Datum<'_>) -> Result<HttpRequest> {
        for stage in &self.stages {
            stage.request_call(datum)?;
        }
        datum.render()
    }

    /// Run the response phases, innermost stage first.
    pub fn finish(&self, datum: &Datum<'_>, response: HttpResponse) -> Result<Response> {
        let mut response = Response::from(response);
        for stage in self.stages.iter().rev() {
            stage.response_call(datum, &mut response)?;
        }
        Ok(response)
    }

    /// Prepare, send through `transport`, then finish.
    pub fn execute(&self, datum: &mut Datum<'_>, transport: &mut dyn Transport) -> Result<Response> {
        let request = self.prepare(datum)?;
        debug!(method = request.method.as_str(), uri = %request.uri(), "dispatching request");

        let mut buffered = Vec::new();
        let head = match datum.on_chunk.as_mut() {
            Some(hook) => transport.execute(&request, &mut |chunk: &[u8]| {
                hook(chunk);
                let room = ERROR_BODY_LIMIT.saturating_sub(buffered.len());
                buffered.extend_from_slice(&chunk[..chunk.len().min(room)]);
            })?,
            None => transport
                .execute(&request, &mut |chunk: &[u8]| buffered.extend_from_slice(chunk))?,
        };
        trace!(status = head.status, bytes = buffered.len(), "response received");

        let expected = datum
            .expects
            .as_ref()
            .map_or(true, |expects| expects.contains(&head.status));
        if datum.on_chunk.is_some() && expected {
            buffered.clear();
        }

        self.finish(
            datum,
            HttpResponse {
                status: head.status,
                headers: head.headers,
                body: buffered,
            },
        )
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use super::*;
    use crate::http::ResponseHead;

    /// Transport double that records requests and replays canned responses.
    #[derive(Default)]
    pub struct ScriptedTransport {
        pub requests: Vec<HttpRequest>,
        pub responses: VecDeque<HttpResponse>,
    }

    impl ScriptedTransport {
        pub fn replying(response: HttpResponse) -> Self {
            Self {
                requests: Vec::new(),
                responses: VecDeque::from([response]),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn execute(
            &mut self,
            request: &HttpRequest,
            on_chunk: &mut dyn FnMut(&[u8]),
        ) -> Result<ResponseHead> {
            self.requests.push(request.clone());
            let response = self
                .responses
                .pop_front()
                .ok_or_else(|| ApiError::Connection("no scripted response left".to_string()))?;
            for chunk in response.body.chunks(4) {
                on_chunk(chunk);
            }
            Ok(ResponseHead {
                status: response.status,
                headers: response.headers,
            })
        }
    }

    pub fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }
}
