//! Derive the S3 region from an endpoint host.
//!
//! Host shapes are matched against an ordered list of endpoint patterns, most
//! specific first:
//!
//! | host | region |
//! |---|---|
//! | `[bucket.]s3-external-1.amazonaws.com` | global |
//! | `[bucket.]s3-accelerate[.dualstack].amazonaws.com` | unknown |
//! | `[bucket.]s3.amazonaws.com` | global |
//! | `[bucket.]s3.dualstack.<region>.amazonaws.com[.cn]` | `<region>` |
//! | `[bucket.]s3.<region>.amazonaws.com[.cn]` | `<region>` |
//! | `[bucket.]s3-website.<region>.amazonaws.com` | `<region>` |
//! | `[bucket.]s3-website-<region>.amazonaws.com` | `<region>` |
//! | `[bucket.]s3-<region>.amazonaws.com` | `<region>` |

use crate::constants::DEFAULT_REGION;

/// Region information carried by a host name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRegion {
    /// The classic global endpoint, signed as `us-east-1`.
    Global,
    /// A regional endpoint.
    Region(String),
    /// Not an S3 endpoint we recognize. Nothing can be said about the region.
    Unknown,
}

impl HostRegion {
    /// The region to put into the signing scope, `None` for the global endpoint.
    ///
    /// `Unknown` also yields `None`; use [`HostRegion::is_known`] to tell
    /// them apart.
    pub fn signing_region(&self) -> Option<&str> {
        match self {
            HostRegion::Region(r) => Some(r),
            HostRegion::Global | HostRegion::Unknown => None,
        }
    }

    /// Whether the host was recognized as an S3 endpoint.
    pub fn is_known(&self) -> bool {
        !matches!(self, HostRegion::Unknown)
    }
}

/// Parse the region out of an S3 host such as `s3-eu-central-1.amazonaws.com`
/// or `bucket.s3.cn-north-1.amazonaws.com.cn`.
///
/// Matching is case-insensitive and ignores a trailing port.
pub fn region_for_host(host: &str) -> HostRegion {
    match S3Endpoint::parse(host) {
        Some(ep) => ep.region,
        None => HostRegion::Unknown,
    }
}

/// Render the host that serves `region`, keeping the bucket prefix and port
/// of `host`.
///
/// `None` and `us-east-1` map to the global endpoint. Returns `None` when
/// `host` is not a recognized S3 endpoint (custom endpoints are never
/// rewritten) or when the partition has no endpoint for the requested region.
pub fn regional_host(host: &str, region: Option<&str>) -> Option<String> {
    let ep = S3Endpoint::parse(host)?;
    let region = region.filter(|r| !r.is_empty());

    let endpoint = match (ep.style, ep.partition, region) {
        (EndpointStyle::Standard, Partition::Aws, None) => "s3".to_string(),
        (EndpointStyle::Standard, Partition::Aws, Some(DEFAULT_REGION)) => "s3".to_string(),
        (EndpointStyle::Standard, _, Some(r)) => format!("s3.{r}"),
        (EndpointStyle::Dualstack, Partition::Aws, None) => format!("s3.dualstack.{DEFAULT_REGION}"),
        (EndpointStyle::Dualstack, _, Some(r)) => format!("s3.dualstack.{r}"),
        (EndpointStyle::Website, Partition::Aws, None) => format!("s3-website-{DEFAULT_REGION}"),
        (EndpointStyle::Website, _, Some(r)) => format!("s3-website.{r}"),
        (_, Partition::China, None) => return None,
    };

    let mut s = String::with_capacity(host.len() + 16);
    if !ep.prefix.is_empty() {
        s.push_str(&ep.prefix);
        s.push('.');
    }
    s.push_str(&endpoint);
    s.push_str(ep.partition.suffix());
    if let Some(port) = &ep.port {
        s.push(':');
        s.push_str(port);
    }
    Some(s)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Partition {
    Aws,
    China,
}

impl Partition {
    fn suffix(self) -> &'static str {
        match self {
            Partition::Aws => ".amazonaws.com",
            Partition::China => ".amazonaws.com.cn",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndpointStyle {
    Standard,
    Dualstack,
    Website,
}

#[derive(Debug)]
struct S3Endpoint {
    /// Labels in front of the endpoint, e.g. the bucket of a virtual-hosted request.
    prefix: String,
    region: HostRegion,
    style: EndpointStyle,
    partition: Partition,
    port: Option<String>,
}

impl S3Endpoint {
    fn parse(host: &str) -> Option<Self> {
        let host = host.trim().to_ascii_lowercase();
        let (name, port) = match host.rsplit_once(':') {
            Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                (name, Some(port.to_string()))
            }
            _ => (host.as_str(), None),
        };
        let name = name.trim_end_matches('.');

        // `.amazonaws.com.cn` must be tried before `.amazonaws.com`.
        let (rest, partition) = if let Some(rest) = name.strip_suffix(Partition::China.suffix()) {
            (rest, Partition::China)
        } else if let Some(rest) = name.strip_suffix(Partition::Aws.suffix()) {
            (rest, Partition::Aws)
        } else {
            return None;
        };

        let labels = rest.split('.').collect::<Vec<_>>();
        let (consumed, style, region) = match_endpoint(&labels, partition)?;

        Some(S3Endpoint {
            prefix: labels[..labels.len() - consumed].join("."),
            region,
            style,
            partition,
            port,
        })
    }
}

/// Match the trailing labels of a host (suffix already stripped).
///
/// Returns how many labels belong to the endpoint, its style and region.
fn match_endpoint(
    labels: &[&str],
    partition: Partition,
) -> Option<(usize, EndpointStyle, HostRegion)> {
    use EndpointStyle::*;

    let global = partition == Partition::Aws;

    match labels {
        [.., "s3-external-1"] if global => Some((1, Standard, HostRegion::Global)),
        [.., "s3-accelerate"] | [.., "s3-accelerate", "dualstack"] => None,
        [.., "s3"] if global => Some((1, Standard, HostRegion::Global)),
        [.., "s3", "dualstack", r] if is_region_name(r) => Some((3, Dualstack, named(r))),
        [.., "s3", r] if is_region_name(r) => Some((2, Standard, named(r))),
        [.., "s3-website", r] if is_region_name(r) => Some((2, Website, named(r))),
        [.., label] => {
            if let Some(r) = label.strip_prefix("s3-website-") {
                is_region_name(r).then(|| (1, Website, named(r)))
            } else if let Some(r) = label.strip_prefix("s3-") {
                is_region_name(r).then(|| (1, Standard, named(r)))
            } else {
                None
            }
        }
        [] => None,
    }
}

fn named(r: &str) -> HostRegion {
    HostRegion::Region(r.to_string())
}

/// Region names look like `eu-central-1` or `us-gov-west-1`.
///
/// `fips-` and `external-` are endpoint variants, not regions.
fn is_region_name(s: &str) -> bool {
    !s.starts_with("fips-")
        && !s.starts_with("external-")
        && s.starts_with(|c: char| c.is_ascii_lowercase())
        && s.contains('-')
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
