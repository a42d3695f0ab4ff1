//! Tests against a real S3 bucket, enabled with `S3SIGN_AWS_V4_TEST=on`.
//!
//! - `S3SIGN_AWS_V4_BUCKET`: bucket to test against
//! - `S3SIGN_AWS_V4_ACCESS_KEY` / `S3SIGN_AWS_V4_SECRET_KEY`: key pair
//! - `S3SIGN_AWS_V4_REGION`: optional, only used to check what got cached

use anyhow::Result;
use bytes::Bytes;
use http::{Method, Request, StatusCode};
use log::{debug, warn};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;
use s3sign_aws_v4::{Config, RegionAwareClient, RequestSigner, StaticCredentialProvider};
use s3sign_core::{Context, OsEnv, SignRequest};
use s3sign_http_send_reqwest::ReqwestHttpSend;
use std::env;
use std::time::Duration;

struct Live {
    client: RegionAwareClient,
    bucket: String,
}

impl Live {
    /// Always start from the global endpoint so the region has to be learnt.
    fn url(&self, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{key}", self.bucket)
    }
}

fn init_live_test() -> Option<Live> {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = dotenv::dotenv();

    if env::var("S3SIGN_AWS_V4_TEST").ok().as_deref() != Some("on") {
        return None;
    }

    let ctx = Context::new()
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);
    let client = RegionAwareClient::new(
        ctx,
        StaticCredentialProvider::new(
            &env::var("S3SIGN_AWS_V4_ACCESS_KEY").expect("env S3SIGN_AWS_V4_ACCESS_KEY must set"),
            &env::var("S3SIGN_AWS_V4_SECRET_KEY").expect("env S3SIGN_AWS_V4_SECRET_KEY must set"),
        ),
    );
    let bucket = env::var("S3SIGN_AWS_V4_BUCKET").expect("env S3SIGN_AWS_V4_BUCKET must set");

    Some(Live { client, bucket })
}

fn request(method: Method, url: &str, body: &'static str) -> Result<Request<Bytes>> {
    Ok(Request::builder()
        .method(method)
        .uri(url)
        .body(Bytes::from_static(body.as_bytes()))?)
}

#[tokio::test]
async fn test_head_object_learns_region() -> Result<()> {
    let Some(live) = init_live_test() else {
        warn!("S3SIGN_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };

    let req = request(Method::HEAD, &live.url("not_exist_file"), "")?;
    let resp = live.client.send(&live.bucket, req).await?;
    debug!("got response: {resp:?}");
    assert_eq!(StatusCode::NOT_FOUND, resp.status());

    let region = live.client.region_cache().get(&live.bucket);
    debug!("learnt region: {region:?}");
    if let Ok(expected) = env::var("S3SIGN_AWS_V4_REGION") {
        // 404 is not cached, only a mismatch tells the region.
        if expected != "us-east-1" {
            assert_eq!(region.as_deref(), Some(expected.as_str()));
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_put_and_get_object() -> Result<()> {
    let Some(live) = init_live_test() else {
        warn!("S3SIGN_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };

    let url = live.url("put_object_test");
    let resp = live
        .client
        .send(&live.bucket, request(Method::PUT, &url, "Hello, World!")?)
        .await?;
    assert_eq!(StatusCode::OK, resp.status());

    let resp = live
        .client
        .send(&live.bucket, request(Method::GET, &url, "")?)
        .await?;
    assert_eq!(StatusCode::OK, resp.status());
    assert_eq!(resp.body().as_ref(), b"Hello, World!");
    Ok(())
}

#[tokio::test]
async fn test_head_object_with_special_characters() -> Result<()> {
    let Some(live) = init_live_test() else {
        warn!("S3SIGN_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };

    let key = utf8_percent_encode("!@#$%^&*()_+-=;:'><,/?.txt", NON_ALPHANUMERIC).to_string();
    let resp = live
        .client
        .send(&live.bucket, request(Method::HEAD, &live.url(&key), "")?)
        .await?;
    assert_eq!(StatusCode::NOT_FOUND, resp.status());
    Ok(())
}

#[tokio::test]
async fn test_list_bucket() -> Result<()> {
    let Some(live) = init_live_test() else {
        warn!("S3SIGN_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };

    let url = live.url("?list-type=2&delimiter=/&encoding-type=url");
    let resp = live
        .client
        .send(&live.bucket, request(Method::GET, &url, "")?)
        .await?;
    assert_eq!(StatusCode::OK, resp.status());
    Ok(())
}

#[tokio::test]
async fn test_presigned_get_object() -> Result<()> {
    let Some(live) = init_live_test() else {
        warn!("S3SIGN_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };

    // Presigned urls can't be retried, sign for the right region up front.
    let ctx = Context::new().with_env(OsEnv);
    let cfg = Config::default().from_env(&ctx);
    let region = env::var("S3SIGN_AWS_V4_REGION").ok().or(cfg.region);
    let url = match region.as_deref() {
        Some(r) => format!("https://{}.s3.{r}.amazonaws.com/not_exist_file", live.bucket),
        None => live.url("not_exist_file"),
    };
    let cred = s3sign_aws_v4::Credential::new(
        &env::var("S3SIGN_AWS_V4_ACCESS_KEY")?,
        &env::var("S3SIGN_AWS_V4_SECRET_KEY")?,
    );

    let (mut parts, body) = request(Method::GET, &url, "")?.into_parts();
    RequestSigner::new(region.as_deref())
        .sign_request(&ctx, &mut parts, Some(&cred), Some(Duration::from_secs(3600)))
        .await?;
    let req = Request::from_parts(parts, body);
    debug!("presigned url: {}", req.uri());

    let resp = Client::new().execute(req.try_into()?).await?;
    assert_eq!(StatusCode::NOT_FOUND, resp.status());
    Ok(())
}
