use crate::constants::{DEFAULT_REGION, X_AMZ_BUCKET_REGION};
use crate::region::{region_for_host, HostRegion};
use bytes::Bytes;
use http::{Response, StatusCode};
use quick_xml::de;
use serde::Deserialize;

/// Error codes S3 answers with when a request was signed for the wrong region.
const REGION_MISMATCH_CODES: [&str; 4] = [
    "PermanentRedirect",
    "TemporaryRedirect",
    "AuthorizationHeaderMalformed",
    "IllegalLocationConstraintException",
];

/// ServiceError is a failed S3 response.
///
/// ```xml
/// <Error>
///   <Code>AuthorizationHeaderMalformed</Code>
///   <Message>the region 'us-east-1' is wrong; expecting 'eu-west-1'</Message>
///   <Region>eu-west-1</Region>
/// </Error>
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("s3 responded {status} {code}: {message}")]
pub struct ServiceError {
    /// HTTP status of the response.
    pub status: StatusCode,
    /// AWS error code, empty if the body carried none.
    pub code: String,
    /// Human readable message.
    pub message: String,
    /// `<Region>` of the error body.
    pub region: Option<String>,
    /// `<Endpoint>` of the error body.
    pub endpoint: Option<String>,
    /// Value of the `x-amz-bucket-region` header.
    pub bucket_region: Option<String>,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ErrorBody {
    code: String,
    message: String,
    region: String,
    endpoint: String,
}

impl ServiceError {
    /// Parse a service error out of a response.
    ///
    /// A body that is empty or not xml yields an error without code, HEAD
    /// responses never carry one.
    pub fn from_response(resp: &Response<Bytes>) -> Self {
        let body: ErrorBody = std::str::from_utf8(resp.body())
            .ok()
            .filter(|v| !v.trim().is_empty())
            .and_then(|v| de::from_str(v).ok())
            .unwrap_or_default();
        let non_empty = |v: String| Some(v).filter(|v| !v.is_empty());

        Self {
            status: resp.status(),
            code: body.code,
            message: body.message,
            region: non_empty(body.region),
            endpoint: non_empty(body.endpoint),
            bucket_region: resp
                .headers()
                .get(X_AMZ_BUCKET_REGION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        }
    }

    /// Returns `true` if S3 rejected the request because it was sent to or
    /// signed for the wrong region.
    pub fn is_region_mismatch(&self) -> bool {
        if !matches!(self.status.as_u16(), 301 | 307 | 400) {
            return false;
        }
        if REGION_MISMATCH_CODES.contains(&self.code.as_str()) {
            return true;
        }
        // HEAD: no body, only the header tells.
        self.code.is_empty() && self.bucket_region.is_some()
    }

    /// The region S3 says the bucket lives in, if it said so.
    ///
    /// Checked in order: `x-amz-bucket-region`, `<Region>`, then the region of
    /// `<Endpoint>`.
    pub fn disclosed_region(&self) -> Option<String> {
        if let Some(region) = &self.bucket_region {
            return Some(region.clone());
        }
        if let Some(region) = &self.region {
            return Some(region.clone());
        }

        match region_for_host(self.endpoint.as_deref()?) {
            HostRegion::Region(r) => Some(r),
            HostRegion::Global => Some(DEFAULT_REGION.to_string()),
            HostRegion::Unknown => None,
        }
    }
}
