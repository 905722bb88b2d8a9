//! Status-code expectations.

use tracing::debug;

use super::{Datum, Response, Stage};
use crate::error::{ApiError, Result};

/// Fails the response when its status is outside `Datum::expects`, mapping
/// it to the matching `ApiError` class. Requests without an expectation
/// accept any status.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpectsStage;

impl Stage for ExpectsStage {
    fn response_call(&self, datum: &Datum<'_>, response: &mut Response) -> Result<()> {
        let Some(expects) = &datum.expects else {
            return Ok(());
        };
        if expects.contains(&response.status) {
            return Ok(());
        }
        debug!(status = response.status, path = %datum.path, "unexpected status");
        Err(ApiError::from_status(response.status, response.text()))
    }
}
