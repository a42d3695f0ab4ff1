//! Reqwest-based transport for s3sign.
//!
//! `ReqwestHttpSend` implements [`HttpSend`] on top of a [`reqwest::Client`].
//! It is the transport a `RegionAwareClient` hands signed requests to.
//!
//! ## Example
//!
//! ```no_run
//! use s3sign_core::{Context, OsEnv};
//! use s3sign_http_send_reqwest::ReqwestHttpSend;
//!
//! let ctx = Context::new()
//!     .with_http_send(ReqwestHttpSend::default())
//!     .with_env(OsEnv);
//! ```
//!
//! Redirects are never followed by the default client: S3 answers a request
//! sent to the wrong region with a redirect that the region retry logic needs
//! to see.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use log::{debug, warn};
use reqwest::redirect::Policy;
use reqwest::{Client, Request};
use s3sign_core::{Error, HttpSend, Result};

/// Reqwest-based implementation of the `HttpSend` trait.
#[derive(Debug, Clone)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl Default for ReqwestHttpSend {
    fn default() -> Self {
        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .unwrap_or_else(|err| {
                warn!("failed to build reqwest client without redirects, using default: {err}");
                Client::new()
            });

        Self { client }
    }
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    ///
    /// The client should be built with `redirect(Policy::none())`.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        debug!("sending {} {}", req.method(), req.uri());

        let req = Request::try_from(req)
            .map_err(|e| Error::request_invalid("failed to convert http request").with_source(e))?;
        let resp: http::Response<_> = self
            .client
            .execute(req)
            .await
            .map_err(|e| Error::unexpected("failed to send http request").with_source(e))?
            .into();

        let (parts, body) = resp.into_parts();
        let bs = BodyExt::collect(body)
            .await
            .map(|buf| buf.to_bytes())
            .map_err(|e| Error::unexpected("failed to read http response body").with_source(e))?;

        debug!("received {} with {} bytes body", parts.status, bs.len());
        Ok(http::Response::from_parts(parts, bs))
    }
}
