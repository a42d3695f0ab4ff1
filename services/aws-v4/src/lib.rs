//! AWS SigV4 signer for S3 with region self-correction.
//!
//! ## Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use s3sign_aws_v4::{Config, RegionAwareClient};
//! use s3sign_core::{Context, OsEnv, Result};
//! use s3sign_http_send_reqwest::ReqwestHttpSend;
//!
//! # async fn example() -> Result<()> {
//! let ctx = Context::new()
//!     .with_http_send(ReqwestHttpSend::default())
//!     .with_env(OsEnv);
//! let client = RegionAwareClient::from_config(ctx.clone(), Config::default().from_env(&ctx));
//!
//! let req = http::Request::get("https://examplebucket.s3.amazonaws.com/test.txt")
//!     .body(Bytes::new())?;
//! let resp = client.send("examplebucket", req).await?;
//! println!("{}", resp.status());
//! # Ok(())
//! # }
//! ```

mod config;
pub use config::Config;

mod credential;
pub use credential::Credential;

mod provide_credential;
pub use provide_credential::*;

mod sign_request;
pub use sign_request::build_authorization_header_value;
pub use sign_request::build_canonical_request_string;
pub use sign_request::build_signing_key;
pub use sign_request::build_string_to_sign;
pub use sign_request::sign_request_authorization_header;
pub use sign_request::RequestSigner;

mod region;
pub use region::region_for_host;
pub use region::regional_host;
pub use region::HostRegion;

mod region_cache;
pub use region_cache::RegionCache;

mod service_error;
pub use service_error::ServiceError;

mod client;
pub use client::RegionAwareClient;

mod constants;
pub use constants::AWS4_HMAC_SHA256;
pub use constants::DEFAULT_REGION;
pub use constants::UNSIGNED_PAYLOAD;
