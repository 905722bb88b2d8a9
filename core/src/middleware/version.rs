//! API versioning and client identity.

use super::{Datum, Stage};
use crate::error::Result;
use crate::http::{set_header, USER_AGENT};

/// Status codes accepted when the caller states no expectation.
pub const DEFAULT_EXPECTS: std::ops::RangeInclusive<u16> = 200..=204;

/// Prefixes the path with `/v{version}`, sets `User-Agent`, and defaults
/// `expects` to 200..=204. Belongs next to the transport so no other stage
/// sees the prefix.
#[derive(Debug, Clone)]
pub struct VersionStage {
    api_version: String,
    user_agent: String,
}

impl VersionStage {
    pub fn new(api_version: &str, user_agent: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            user_agent: user_agent.to_string(),
        }
    }
}

impl Stage for VersionStage {
    fn request_call(&self, datum: &mut Datum<'_>) -> Result<()> {
        let path = if datum.path.starts_with('/') {
            datum.path.clone()
        } else {
            format!("/{}", datum.path)
        };
        datum.path = format!("/v{}{path}", self.api_version);
        set_header(&mut datum.headers, USER_AGENT, &self.user_agent);
        if datum.expects.is_none() {
            datum.expects = Some(DEFAULT_EXPECTS.collect());
        }
        Ok(())
    }
}
