use anyhow::Result;
use bytes::Bytes;
use s3sign_aws_v4::{Config, RegionAwareClient};
use s3sign_core::{Context, OsEnv};
use s3sign_http_send_reqwest::ReqwestHttpSend;
use std::env;

/// Fetch an object through the global endpoint and let the client find the
/// bucket's region.
///
/// ```shell
/// AWS_ACCESS_KEY_ID=... AWS_SECRET_ACCESS_KEY=... \
///     cargo run --example region_aware_get -- <bucket> <key>
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let _ = env_logger::builder().try_init();

    let mut args = env::args().skip(1);
    let (Some(bucket), Some(key)) = (args.next(), args.next()) else {
        eprintln!("usage: region_aware_get <bucket> <key>");
        return Ok(());
    };

    let ctx = Context::new()
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);
    let client = RegionAwareClient::from_config(ctx.clone(), Config::default().from_env(&ctx));

    let req = http::Request::get(format!("https://{bucket}.s3.amazonaws.com/{key}"))
        .body(Bytes::new())?;
    let resp = client.send(&bucket, req).await?;

    println!("status: {}", resp.status());
    println!("bytes: {}", resp.body().len());
    println!(
        "region: {}",
        client.region_cache().get(&bucket).unwrap_or_default()
    );
    Ok(())
}
