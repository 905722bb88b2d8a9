//! Key-casing stage layered over the JSON codec.

use serde_json::{Map, Value};
use tracing::warn;

use super::{Body, Datum, JsonStage, Response, ResponseBody, Stage};
use crate::casing::{camelize_keys, snakeify_keys};
use crate::error::{ApiError, Result};
use crate::http::is_json;

/// Camelizes query and body keys before encoding, snake-cases response keys
/// after decoding. Transforms only ever see structured mappings.
#[derive(Debug, Clone, Copy, Default)]
pub struct CasingStage {
    json: JsonStage,
}

impl CasingStage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for CasingStage {
    fn request_call(&self, datum: &mut Datum<'_>) -> Result<()> {
        if is_json(&datum.headers) {
            datum.query = camelize_keys(std::mem::take(&mut datum.query));
            if let Body::Json(Value::Object(map)) = &mut datum.body {
                *map = camelize_keys(std::mem::replace(map, Map::new()));
            }
        }
        self.json.encode(datum)
    }

    fn response_call(&self, _datum: &Datum<'_>, response: &mut Response) -> Result<()> {
        match self.json.decode(response) {
            Ok(()) => {}
            Err(ApiError::UnexpectedResponse(reason)) => {
                warn!(%reason, "leaving undecodable JSON body raw");
                return Ok(());
            }
            Err(other) => return Err(other),
        }
        if is_json(&response.headers) {
            if let ResponseBody::Decoded(Some(Value::Object(map))) = &mut response.body {
                *map = snakeify_keys(std::mem::replace(map, Map::new()));
            }
        }
        Ok(())
    }
}
