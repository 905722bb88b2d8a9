//! Synchronous client core for a container engine's remote HTTP API.
//!
//! # Overview
//! Builds requests and parses responses without touching the network
//! (host-does-IO pattern). Requests pass through a middleware chain that
//! handles JSON encoding, key casing, API versioning and status
//! expectations; the caller supplies the `Transport` that performs the
//! actual round-trip, keeping the core deterministic and testable.
//!
//! # Design
//! - `EngineClient` is stateless. It holds a `ClientConfig` and the chain
//!   derived from it.
//! - Each operation is split into `build_*` (produces a `Datum`) and
//!   `parse_*` (consumes a `Response`), so the I/O boundary is explicit.
//! - `ContainerConfig` accumulates the container-creation document from
//!   builder calls or a `docker run`-style command line.
//! - `context` turns a directory (honouring `.dockerignore`) or in-memory
//!   files into the tar archive the build endpoint expects.

pub mod casing;
pub mod client;
pub mod config;
pub mod container;
pub mod context;
pub mod error;
pub mod http;
pub mod middleware;
pub mod types;

pub use client::EngineClient;
pub use config::ClientConfig;
pub use container::ContainerConfig;
pub use error::{ApiError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, ResponseHead, Transport};
pub use middleware::{Body, Chain, Datum, Response, ResponseBody, Stage};
pub use types::{Container, Event, Image};
