//! JSON codec stage.

use serde_json::Value;

use super::{Body, Datum, Response, ResponseBody, Stage};
use crate::error::{ApiError, Result};
use crate::http::is_json;

/// Serializes mapping bodies on the way out and parses JSON bodies on the
/// way back, both only when the relevant `Content-Type` is JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStage;

impl JsonStage {
    /// Replace a mapping body with its JSON text. Text, bytes and non-mapping
    /// values are left untouched.
    pub fn encode(&self, datum: &mut Datum<'_>) -> Result<()> {
        if !is_json(&datum.headers) {
            return Ok(());
        }
        if let Body::Json(value @ Value::Object(_)) = &datum.body {
            let text = serde_json::to_string(value)
                .map_err(|e| ApiError::Serialization(e.to_string()))?;
            datum.body = Body::Text(text);
        }
        Ok(())
    }

    /// Parse a raw JSON body. Empty bodies and a literal `null` decode to
    /// `None`; anything else that fails to parse is `UnexpectedResponse` and
    /// the body is left raw.
    pub fn decode(&self, response: &mut Response) -> Result<()> {
        if !is_json(&response.headers) {
            return Ok(());
        }
        let ResponseBody::Raw(bytes) = &response.body else {
            return Ok(());
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            response.body = ResponseBody::Decoded(None);
            return Ok(());
        }
        let value: Value = serde_json::from_slice(bytes).map_err(|e| {
            ApiError::UnexpectedResponse(format!(
                "{e}: {}",
                String::from_utf8_lossy(bytes)
            ))
        })?;
        response.body = ResponseBody::Decoded((!value.is_null()).then_some(value));
        Ok(())
    }
}

impl Stage for JsonStage {
    fn request_call(&self, datum: &mut Datum<'_>) -> Result<()> {
        self.encode(datum)
    }

    fn response_call(&self, _datum: &Datum<'_>, response: &mut Response) -> Result<()> {
        self.decode(response)
    }
}
