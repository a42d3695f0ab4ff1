use crate::constants::*;
use crate::provide_credential::DefaultCredentialProvider;
use crate::region::{region_for_host, regional_host, HostRegion};
use crate::sign_request::{scope_region, sign_request_authorization_header};
use crate::{Config, Credential, RegionCache, ServiceError};
use bytes::Bytes;
use http::request::Parts;
use http::uri::Authority;
use http::{header, HeaderValue, Request, Response, Uri};
use log::{debug, warn};
use s3sign_core::hash::hex_sha256;
use s3sign_core::time::{format_iso8601, now};
use s3sign_core::{Context, Error, ProvideCredential, Result, SigningCredential};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// RegionAwareClient signs and sends S3 requests, learning the region of
/// every bucket it talks to.
///
/// When S3 answers that a request was signed for the wrong region and
/// discloses the right one, the region is cached, the request is re-signed
/// and sent again. This happens at most once per call.
///
/// Clones share the region cache and the loaded credential.
#[derive(Clone, Debug)]
pub struct RegionAwareClient {
    ctx: Context,
    loader: Arc<dyn ProvideCredential<Credential = Credential>>,
    credential: Arc<Mutex<Option<Credential>>>,
    regions: RegionCache,
    default_region: Option<String>,
}

impl RegionAwareClient {
    /// Create a new client loading credentials from `loader`.
    pub fn new(ctx: Context, loader: impl ProvideCredential<Credential = Credential>) -> Self {
        Self {
            ctx,
            loader: Arc::new(loader),
            credential: Arc::new(Mutex::new(None)),
            regions: RegionCache::new(),
            default_region: None,
        }
    }

    /// Create a new client from config, loading credentials with
    /// [`DefaultCredentialProvider`] and using `cfg.region` as default region.
    pub fn from_config(ctx: Context, cfg: Config) -> Self {
        let region = cfg.region.clone();
        Self::new(ctx, DefaultCredentialProvider::new(Arc::new(cfg)))
            .with_default_region(region.as_deref())
    }

    /// Region used for hosts that don't carry one, like custom endpoints.
    pub fn with_default_region(mut self, region: Option<&str>) -> Self {
        self.default_region = region.filter(|v| !v.is_empty()).map(|v| v.to_string());
        self
    }

    /// Share `cache` with this client.
    pub fn with_region_cache(mut self, cache: RegionCache) -> Self {
        self.regions = cache;
        self
    }

    /// The bucket to region cache of this client.
    pub fn region_cache(&self) -> &RegionCache {
        &self.regions
    }

    /// Sign and send `req` against `bucket`.
    ///
    /// Responses that are not a region mismatch are returned as is, including
    /// error statuses. A region mismatch that can't be fixed is returned as
    /// [`ErrorKind::Service`](s3sign_core::ErrorKind::Service) with the
    /// [`ServiceError`] as source.
    pub async fn send(&self, bucket: &str, req: Request<Bytes>) -> Result<Response<Bytes>> {
        let cred = self.credential().await?;
        let (parts, body) = req.into_parts();
        let payload_hash = match parts.headers.get(X_AMZ_CONTENT_SHA_256) {
            Some(v) => v.to_str()?.to_string(),
            None => hex_sha256(&body),
        };

        let region = self.signing_region(bucket, &parts.uri);
        debug!("signing request for bucket {bucket} with region {region:?}");
        let resp = self
            .send_signed(&parts, &body, &cred, &payload_hash, region.as_deref())
            .await?;
        let Some(err) = region_mismatch(&resp) else {
            self.remember(bucket, region.as_deref(), &resp);
            return Ok(resp);
        };

        let Some(disclosed) = err
            .disclosed_region()
            .filter(|r| r.as_str() != scope_region(region.as_deref()))
        else {
            warn!("bucket {bucket} rejected the region {region:?} without telling a better one");
            return Err(service_error(bucket, err));
        };

        debug!("bucket {bucket} lives in {disclosed}, retrying");
        self.regions.insert(bucket, &disclosed);
        let resp = self
            .send_signed(&parts, &body, &cred, &payload_hash, Some(&disclosed))
            .await?;
        if let Some(err) = region_mismatch(&resp) {
            warn!("bucket {bucket} still rejects the region {disclosed} after retry");
            return Err(service_error(bucket, err));
        }

        self.remember(bucket, Some(&disclosed), &resp);
        Ok(resp)
    }

    /// Cache hit, then the region of the host, then the default region.
    fn signing_region(&self, bucket: &str, uri: &Uri) -> Option<String> {
        if let Some(region) = self.regions.get(bucket) {
            return Some(region);
        }

        match region_for_host(uri.host().unwrap_or_default()) {
            HostRegion::Region(region) => Some(region),
            HostRegion::Global => None,
            HostRegion::Unknown => self.default_region.clone(),
        }
    }

    fn remember(&self, bucket: &str, region: Option<&str>, resp: &Response<Bytes>) {
        if !resp.status().is_success() {
            return;
        }

        let header_region = resp
            .headers()
            .get(X_AMZ_BUCKET_REGION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());
        self.regions
            .insert(bucket, header_region.unwrap_or(scope_region(region)));
    }

    async fn credential(&self) -> Result<Credential> {
        let cred = self.credential.lock().expect("lock poisoned").clone();
        let cred = if cred.is_valid() {
            cred
        } else {
            let cred = self.loader.provide_credential(&self.ctx).await?;
            *self.credential.lock().expect("lock poisoned") = cred.clone();
            cred
        };

        cred.ok_or_else(|| Error::credential_invalid("no credential found for signing"))
    }

    async fn send_signed(
        &self,
        parts: &Parts,
        body: &Bytes,
        cred: &Credential,
        payload_hash: &str,
        region: Option<&str>,
    ) -> Result<Response<Bytes>> {
        let mut parts = parts.clone();

        if let Some(host) = parts
            .uri
            .authority()
            .and_then(|v| regional_host(v.as_str(), region))
        {
            if parts.uri.authority().map(|v| v.as_str()) != Some(host.as_str()) {
                debug!("rewrite host {:?} to {host}", parts.uri.authority());
                let mut uri = parts.uri.into_parts();
                uri.authority = Some(Authority::from_str(&host)?);
                parts.uri = Uri::from_parts(uri)?;
                parts.headers.remove(header::HOST);
            }
        }

        parts
            .headers
            .insert(X_AMZ_CONTENT_SHA_256, HeaderValue::from_str(payload_hash)?);
        parts
            .headers
            .insert(X_AMZ_DATE, HeaderValue::try_from(format_iso8601(now()))?);
        sign_request_authorization_header(AWS4_HMAC_SHA256, &mut parts, cred, payload_hash, region)?;

        self.ctx
            .http_send(Request::from_parts(parts, body.clone()))
            .await
    }
}

/// Only parse bodies of statuses that can carry a region mismatch.
fn region_mismatch(resp: &Response<Bytes>) -> Option<ServiceError> {
    if !matches!(resp.status().as_u16(), 301 | 307 | 400) {
        return None;
    }
    Some(ServiceError::from_response(resp)).filter(|err| err.is_region_mismatch())
}

fn service_error(bucket: &str, err: ServiceError) -> Error {
    Error::service(format!("request to bucket {bucket} failed: {err}")).with_source(err)
}
