//! Request builder and response parser for the container engine API.
//!
//! # Design
//! `EngineClient` holds only its `ClientConfig` and the middleware chain
//! derived from it, and carries no mutable state between calls. Each
//! operation is split into a `build_*` method that produces a `Datum` and a
//! `parse_*` method that consumes the `Response` the chain returns. `request`
//! runs a datum through the chain against a caller-supplied `Transport`, so
//! the I/O boundary stays explicit and the core stays deterministic.

use std::path::Path;

use serde_json::{Map, Value};

use crate::config::ClientConfig;
use crate::container::ContainerConfig;
use crate::context::{create_dir_tar, create_tar};
use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, Transport, CONTENT_TYPE, JSON_MEDIA_TYPE, TAR_MEDIA_TYPE};
use crate::middleware::{Body, Chain, Datum, Response};
use crate::types::{Container, Event, Image};

const BUILD_MARKER: &str = "Successfully built ";

/// Synchronous, stateless client for the engine API.
#[derive(Debug, Clone)]
pub struct EngineClient {
    config: ClientConfig,
    chain: Chain,
}

impl EngineClient {
    pub fn new(config: ClientConfig) -> Self {
        let chain = Chain::standard(&config.api_version, &config.user_agent);
        Self { config, chain }
    }

    /// Client for the engine named by `DOCKER_URL`/`DOCKER_HOST`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ClientConfig::from_env()?))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Run `datum` through the middleware chain and `transport`.
    pub fn request(&self, transport: &mut dyn Transport, mut datum: Datum<'_>) -> Result<Response> {
        self.chain.execute(&mut datum, transport)
    }

    fn datum<'a>(&self, method: HttpMethod, path: impl Into<String>) -> Datum<'a> {
        Datum::new(method, path).host(self.config.host())
    }

    fn json_datum<'a>(&self, method: HttpMethod, path: impl Into<String>, body: Value) -> Datum<'a> {
        self.datum(method, path)
            .header(CONTENT_TYPE, JSON_MEDIA_TYPE)
            .body(Body::Json(body))
    }

    pub fn build_create_container<'a>(&self, config: &ContainerConfig) -> Datum<'a> {
        let datum = self.json_datum(
            HttpMethod::Post,
            "/containers/create",
            Value::Object(config.document().clone()),
        );
        match config.name() {
            Some(name) => datum.query("name", name),
            None => datum,
        }
    }

    pub fn parse_create_container(&self, response: Response) -> Result<Container> {
        let body = response.object()?;
        let container: Container = serde_json::from_value(Value::Object(body.clone()))
            .map_err(|e| ApiError::UnexpectedResponse(format!("create container: {e}")))?;
        if container.id.is_empty() {
            return Err(ApiError::UnexpectedResponse(
                "create container returned an empty id".to_string(),
            ));
        }
        Ok(container)
    }

    pub fn build_start_container<'a>(&self, container: &Container) -> Result<Datum<'a>> {
        let id = created_id(container)?;
        Ok(self.datum(HttpMethod::Post, format!("/containers/{id}/start")))
    }

    pub fn build_stop_container<'a>(&self, container: &Container, timeout_secs: u32) -> Result<Datum<'a>> {
        let id = created_id(container)?;
        Ok(self
            .datum(HttpMethod::Post, format!("/containers/{id}/stop"))
            .query("t", timeout_secs))
    }

    pub fn build_inspect_container<'a>(&self, id: &str) -> Datum<'a> {
        self.datum(HttpMethod::Get, format!("/containers/{id}/json"))
            .header(CONTENT_TYPE, JSON_MEDIA_TYPE)
    }

    pub fn parse_inspect_container(&self, response: Response) -> Result<Map<String, Value>> {
        response.object().cloned()
    }

    pub fn build_remove_container<'a>(&self, id: &str, force: bool) -> Datum<'a> {
        self.datum(HttpMethod::Delete, format!("/containers/{id}"))
            .query("force", force)
    }

    /// `POST /build` with the context archive of `dir`.
    pub fn build_image_from_dir<'a>(&self, dir: &Path) -> Result<Datum<'a>> {
        let archive = create_dir_tar(dir)?;
        Ok(self.tar_datum(archive))
    }

    /// `POST /build` with an archive holding only `Dockerfile`.
    pub fn build_image_from_dockerfile<'a>(&self, dockerfile: &str) -> Result<Datum<'a>> {
        let archive = create_tar([("Dockerfile", dockerfile.as_bytes())])?;
        Ok(self.tar_datum(archive))
    }

    fn tar_datum<'a>(&self, archive: Vec<u8>) -> Datum<'a> {
        self.datum(HttpMethod::Post, "/build")
            .header(CONTENT_TYPE, TAR_MEDIA_TYPE)
            .body(Body::Bytes(archive))
    }

    /// Scan newline-delimited build progress for the built image id.
    pub fn parse_build_output(&self, output: &str) -> Result<Image> {
        let mut built = None;
        for line in output.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let Ok(Value::Object(entry)) = serde_json::from_str::<Value>(line) else {
                continue;
            };
            if let Some(error) = entry.get("error") {
                let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
                return Err(ApiError::Image(message));
            }
            let Some(stream) = entry.get("stream").and_then(Value::as_str) else {
                continue;
            };
            if let Some(id) = stream.trim().strip_prefix(BUILD_MARKER) {
                built = Some(id.trim().to_string());
            }
        }
        built.map(|id| Image { id }).ok_or_else(|| {
            ApiError::UnexpectedResponse("build output has no 'Successfully built' marker".to_string())
        })
    }

    pub fn build_version<'a>(&self) -> Datum<'a> {
        self.datum(HttpMethod::Get, "/version")
            .header(CONTENT_TYPE, JSON_MEDIA_TYPE)
    }

    pub fn parse_version(&self, response: Response) -> Result<Map<String, Value>> {
        response.object().cloned()
    }

    /// `GET /events`, bounded by optional unix timestamps.
    pub fn build_events<'a>(&self, since: Option<i64>, until: Option<i64>) -> Datum<'a> {
        let mut datum = self.datum(HttpMethod::Get, "/events");
        if let Some(since) = since {
            datum = datum.query("since", since);
        }
        if let Some(until) = until {
            datum = datum.query("until", until);
        }
        datum
    }

    /// Parse newline-delimited event JSON.
    pub fn parse_events(&self, output: &str) -> Result<Vec<Event>> {
        output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| ApiError::UnexpectedResponse(format!("event '{line}': {e}")))
            })
            .collect()
    }
}

/// Id of a container that exists on the engine.
fn created_id(container: &Container) -> Result<&str> {
    if container.id.is_empty() {
        return Err(ApiError::Container(
            "container has not been created yet".to_string(),
        ));
    }
    Ok(&container.id)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::HttpResponse;
    use crate::middleware::testing::{json_response, ScriptedTransport};

    fn client() -> EngineClient {
        EngineClient::new(ClientConfig::new("http://localhost:2375").unwrap())
    }

    #[test]
    fn create_container_request() {
        let c = client();
        let config = ContainerConfig::from_cli("run --name=web -p 8080:80 nginx").unwrap();
        let mut transport = ScriptedTransport::replying(json_response(
            201,
            r#"{"Id":"e90e34656806","Warnings":[]}"#,
        ));

        let response = c.request(&mut transport, c.build_create_container(&config)).unwrap();
        let container = c.parse_create_container(response).unwrap();

        let sent = &transport.requests[0];
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.url(), "http://localhost:2375/v1.16/containers/create?name=web");
        let body: Value = serde_json::from_slice(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["Image"], "nginx");
        assert_eq!(body["HostConfig"]["PortBindings"]["80/tcp"][0]["HostPort"], "8080");
        assert_eq!(container.id, "e90e34656806");
        assert_eq!(container.warnings, Some(Vec::new()));
    }

    #[test]
    fn create_container_without_id_is_unexpected() {
        let c = client();
        let mut transport = ScriptedTransport::replying(json_response(201, r#"{"Warnings":null}"#));
        let response = c
            .request(&mut transport, c.build_create_container(&ContainerConfig::new()))
            .unwrap();
        assert!(matches!(
            c.parse_create_container(response),
            Err(ApiError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn start_requires_a_created_container() {
        let err = client().build_start_container(&Container::with_id("")).unwrap_err();
        assert!(matches!(err, ApiError::Container(_)));

        let datum = client().build_start_container(&Container::with_id("abc")).unwrap();
        assert_eq!(datum.path, "/containers/abc/start");
    }

    #[test]
    fn stop_carries_timeout() {
        let c = client();
        let datum = c.build_stop_container(&Container::with_id("abc"), 5).unwrap();
        assert_eq!(datum.path, "/containers/abc/stop");
        assert_eq!(datum.query.get("t"), Some(&json!(5)));
        assert!(matches!(
            c.build_stop_container(&Container::with_id(""), 5),
            Err(ApiError::Container(_))
        ));
    }

    #[test]
    fn start_accepts_no_content() {
        let c = client();
        let mut transport = ScriptedTransport::replying(HttpResponse {
            status: 204,
            headers: Vec::new(),
            body: Vec::new(),
        });
        let datum = c.build_start_container(&Container::with_id("abc")).unwrap();
        let response = c.request(&mut transport, datum).unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(transport.requests[0].path, "/v1.16/containers/abc/start");
    }

    #[test]
    fn inspect_snakeifies_top_level_only() {
        let c = client();
        let mut transport = ScriptedTransport::replying(json_response(
            200,
            r#"{"Id":"abc","HostConfig":{"NetworkMode":"host"}}"#,
        ));
        let response = c.request(&mut transport, c.build_inspect_container("abc")).unwrap();
        let details = c.parse_inspect_container(response).unwrap();
        assert_eq!(details["id"], "abc");
        assert_eq!(details["host_config"], json!({"NetworkMode": "host"}));
    }

    #[test]
    fn remove_missing_container_is_not_found() {
        let c = client();
        let mut transport = ScriptedTransport::replying(HttpResponse {
            status: 404,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: b"no such container".to_vec(),
        });
        let err = c
            .request(&mut transport, c.build_remove_container("gone", true))
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(transport.requests[0].uri(), "/v1.16/containers/gone?force=true");
    }

    #[test]
    fn dockerfile_build_sends_tar() {
        let datum = client().build_image_from_dockerfile("FROM busybox\n").unwrap();
        assert_eq!(datum.path, "/build");
        assert_eq!(crate::http::header(&datum.headers, CONTENT_TYPE), Some(TAR_MEDIA_TYPE));
        assert!(matches!(datum.body, Body::Bytes(ref bytes) if !bytes.is_empty()));
    }

    #[test]
    fn build_output_yields_last_marker() {
        let output = concat!(
            "{\"stream\":\"Step 0 : FROM busybox\\n\"}\n",
            "{\"stream\":\" ---> 4986bf8c1536\\n\"}\n",
            "{\"stream\":\"Successfully built 4986bf8c1536\\n\"}\n",
        );
        let image = client().parse_build_output(output).unwrap();
        assert_eq!(image.id, "4986bf8c1536");
    }

    #[test]
    fn build_output_errors() {
        let c = client();
        let err = c
            .parse_build_output("{\"error\":\"Dockerfile parse error\"}\n")
            .unwrap_err();
        assert!(matches!(err, ApiError::Image(ref msg) if msg == "Dockerfile parse error"));

        let err = c.parse_build_output("{\"stream\":\"Step 0\"}\n").unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedResponse(_)));
    }

    #[test]
    fn events_request_and_parse() {
        let c = client();
        let datum = c.build_events(Some(10), None);
        assert_eq!(datum.query.get("since"), Some(&json!(10)));
        assert!(datum.query.get("until").is_none());

        let events = c
            .parse_events(concat!(
                "{\"status\":\"create\",\"id\":\"abc\",\"from\":\"busybox\",\"time\":1}\n",
                "{\"status\":\"start\",\"id\":\"abc\",\"time\":2}\n",
            ))
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].from.as_deref(), Some("busybox"));
        assert_eq!(events[1].status, "start");

        assert!(matches!(c.parse_events("garbage"), Err(ApiError::UnexpectedResponse(_))));
    }

    #[test]
    fn version_round_trip() {
        let c = client();
        let mut transport =
            ScriptedTransport::replying(json_response(200, r#"{"ApiVersion":"1.16","Os":"linux"}"#));
        let response = c.request(&mut transport, c.build_version()).unwrap();
        let version = c.parse_version(response).unwrap();
        assert_eq!(version["api_version"], "1.16");
        assert_eq!(
            transport.requests[0].header("User-Agent"),
            Some(c.config().user_agent.as_str())
        );
    }
}
