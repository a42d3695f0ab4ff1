use crate::constants::*;
use crate::Credential;
use async_trait::async_trait;
use http::request::Parts;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use log::debug;
use percent_encoding::utf8_percent_encode;
use s3sign_core::hash::{hex_hmac_sha256, hex_sha256, hmac_sha256};
use s3sign_core::time::{format_date, format_iso8601, now, parse_iso8601, DateTime};
use s3sign_core::{Context, Error, Result, SignRequest, SigningMethod, SigningRequest};
use std::fmt::Write;
use std::time::Duration;

/// Build the canonical request of SigV4.
///
/// ```text
/// GET
/// /test.txt
///
/// host:examplebucket.s3.amazonaws.com
/// range:bytes=0-9
/// x-amz-content-sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
/// x-amz-date:20130524T000000Z
///
/// host;range;x-amz-content-sha256;x-amz-date
/// e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
/// ```
///
/// Every header in `headers` is signed. The result does not depend on the
/// order headers were inserted in.
pub fn build_canonical_request_string(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    payload_hash: &str,
) -> Result<String> {
    let query = uri
        .query()
        .map(|v| {
            form_urlencoded::parse(v.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    canonical_request(
        method,
        &canonical_path(uri.path()),
        &canonical_query_string(&canonical_query(&query)),
        headers,
        payload_hash,
    )
}

/// Build the string to sign:
///
/// ```text
/// AWS4-HMAC-SHA256
/// 20130524T000000Z
/// 20130524/us-east-1/s3/aws4_request
/// <hex sha256 of canonical request>
/// ```
///
/// `None` region is scoped as `us-east-1`.
pub fn build_string_to_sign(
    algorithm: &str,
    canonical_request: &str,
    timestamp: &str,
    region: Option<&str>,
) -> Result<String> {
    check_algorithm(algorithm)?;
    let scope = scope(timestamp, region)?;
    debug!("calculated scope: {scope}");

    let mut f = String::with_capacity(128);
    writeln!(f, "{algorithm}")?;
    writeln!(f, "{timestamp}")?;
    writeln!(f, "{scope}")?;
    write!(f, "{}", hex_sha256(canonical_request.as_bytes()))?;
    debug!("calculated string to sign: {f}");

    Ok(f)
}

/// Derive the signing key for the date in `timestamp` and `region`.
///
/// Keys are only valid for one UTC date, callers must not cache them.
pub fn build_signing_key(
    secret_access_key: &str,
    timestamp: &str,
    region: Option<&str>,
) -> Result<Vec<u8>> {
    if secret_access_key.is_empty() {
        return Err(Error::credential_invalid("secret access key is empty"));
    }
    let date = format_date(parse_iso8601(timestamp)?);

    // Sign secret
    let secret = format!("AWS4{secret_access_key}");
    // Sign date
    let sign_date = hmac_sha256(secret.as_bytes(), date.as_bytes());
    // Sign region
    let sign_region = hmac_sha256(&sign_date, scope_region(region).as_bytes());
    // Sign service
    let sign_service = hmac_sha256(&sign_region, S3_SERVICE.as_bytes());
    // Sign request
    Ok(hmac_sha256(&sign_service, b"aws4_request"))
}

/// Assemble the `Authorization` header value.
///
/// `SignedHeaders` is read back from `canonical_request` so it always matches
/// the header set that was signed.
pub fn build_authorization_header_value(
    access_key_id: &str,
    signature: &str,
    algorithm: &str,
    canonical_request: &str,
    timestamp: &str,
    region: Option<&str>,
) -> Result<String> {
    check_algorithm(algorithm)?;
    if access_key_id.is_empty() {
        return Err(Error::credential_invalid("access key id is empty"));
    }
    let signed_headers = signed_headers_of(canonical_request)?;

    Ok(format!(
        "{algorithm} Credential={access_key_id}/{},SignedHeaders={signed_headers},Signature={signature}",
        scope(timestamp, region)?
    ))
}

/// Sign `req` in place by setting its `Authorization` header.
///
/// The timestamp is taken from the `x-amz-date` header, which must be set.
/// `host` is added from the uri authority when missing, and
/// `x-amz-security-token` when the credential carries a session token.
pub fn sign_request_authorization_header(
    algorithm: &str,
    req: &mut Parts,
    credential: &Credential,
    payload_hash: &str,
    region: Option<&str>,
) -> Result<()> {
    check_algorithm(algorithm)?;
    credential.check()?;

    let timestamp = req
        .headers
        .get(X_AMZ_DATE)
        .ok_or_else(|| Error::request_invalid("x-amz-date header is required for signing"))?
        .to_str()?
        .to_string();
    parse_iso8601(&timestamp)?;

    // Sign a copy so a failure leaves `req` untouched.
    let mut headers = req.headers.clone();
    if !headers.contains_key(header::HOST) {
        let authority = req
            .uri
            .authority()
            .ok_or_else(|| Error::request_invalid("request without host is invalid for signing"))?;
        headers.insert(header::HOST, HeaderValue::from_str(authority.as_str())?);
    }
    if let Some(token) = &credential.session_token {
        let mut value = HeaderValue::from_str(token)?;
        value.set_sensitive(true);
        headers.insert(X_AMZ_SECURITY_TOKEN, value);
    }
    // A stale signature must never be signed into the new one.
    headers.remove(header::AUTHORIZATION);

    let creq = build_canonical_request_string(&req.method, &req.uri, &headers, payload_hash)?;
    debug!("calculated canonical request: {creq}");
    let string_to_sign = build_string_to_sign(algorithm, &creq, &timestamp, region)?;
    let signing_key = build_signing_key(&credential.secret_access_key, &timestamp, region)?;
    let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

    let mut authorization = HeaderValue::from_str(&build_authorization_header_value(
        &credential.access_key_id,
        &signature,
        algorithm,
        &creq,
        &timestamp,
        region,
    )?)?;
    authorization.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, authorization);
    req.headers = headers;

    Ok(())
}

/// RequestSigner that implement AWS SigV4 for S3.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
///
/// Fills in `host`, `x-amz-date` and `x-amz-content-sha256` (defaults to
/// `UNSIGNED-PAYLOAD`) before signing. With `expires_in` the request is
/// presigned in its query string instead.
#[derive(Debug, Clone, Default)]
pub struct RequestSigner {
    region: Option<String>,

    time: Option<DateTime>,
}

impl RequestSigner {
    /// Create a new signer for `region`, `None` for the global endpoint.
    pub fn new(region: Option<&str>) -> Self {
        Self {
            region: region.map(|r| r.to_string()),

            time: None,
        }
    }

    /// The region this signer scopes signatures to.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    #[cfg(test)]
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }
}

#[async_trait]
impl SignRequest for RequestSigner {
    type Credential = Credential;

    async fn sign_request(
        &self,
        _: &Context,
        req: &mut Parts,
        credential: Option<&Self::Credential>,
        expires_in: Option<Duration>,
    ) -> Result<()> {
        let Some(cred) = credential else {
            return Ok(());
        };
        cred.check()?;
        if let Some(expire) = expires_in {
            if expire.as_secs() > MAX_PRESIGN_EXPIRES_SECS {
                return Err(Error::request_invalid(format!(
                    "presigned url can't be valid for more than {MAX_PRESIGN_EXPIRES_SECS} seconds"
                )));
            }
        }

        // `SigningRequest::build` moves uri and headers out of `req`, put
        // them back if signing fails halfway.
        let (uri, headers) = (req.uri.clone(), req.headers.clone());
        let signed = self.sign_parts(req, cred, SigningMethod::from(expires_in));
        if signed.is_err() {
            req.uri = uri;
            req.headers = headers;
        }
        signed
    }
}

impl RequestSigner {
    fn sign_parts(&self, req: &mut Parts, cred: &Credential, method: SigningMethod) -> Result<()> {
        let now = self.time.unwrap_or_else(now);
        let region = self.region.as_deref();
        let mut signed_req = SigningRequest::build(req)?;

        canonicalize_header(&mut signed_req, cred, method, now)?;
        let timestamp = match method {
            SigningMethod::Header => signed_req
                .header_get_or_default(&HeaderName::from_static(X_AMZ_DATE))?
                .to_string(),
            SigningMethod::Query(_) => format_iso8601(now),
        };
        canonicalize_query(&mut signed_req, cred, method, &timestamp, region)?;

        let payload_hash = match signed_req.headers.get(X_AMZ_CONTENT_SHA_256) {
            Some(v) => v.to_str()?.to_string(),
            None => UNSIGNED_PAYLOAD.to_string(),
        };
        let creq = canonical_request(
            &signed_req.method,
            &canonical_path(&signed_req.path),
            &canonical_query_string(&signed_req.query),
            &signed_req.headers,
            &payload_hash,
        )?;
        debug!("calculated canonical request: {creq}");

        let string_to_sign = build_string_to_sign(AWS4_HMAC_SHA256, &creq, &timestamp, region)?;
        let signing_key = build_signing_key(&cred.secret_access_key, &timestamp, region)?;
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        match method {
            SigningMethod::Query(_) => {
                signed_req.query_push(X_AMZ_SIGNATURE_QUERY, signature);
            }
            SigningMethod::Header => {
                let mut authorization = HeaderValue::from_str(&build_authorization_header_value(
                    &cred.access_key_id,
                    &signature,
                    AWS4_HMAC_SHA256,
                    &creq,
                    &timestamp,
                    region,
                )?)?;
                authorization.set_sensitive(true);

                signed_req
                    .headers
                    .insert(header::AUTHORIZATION, authorization);
            }
        }

        // Apply to the request.
        signed_req.apply(req)
    }
}

fn check_algorithm(algorithm: &str) -> Result<()> {
    if algorithm != AWS4_HMAC_SHA256 {
        return Err(Error::request_invalid(format!(
            "signature algorithm {algorithm} is not supported"
        )));
    }
    Ok(())
}

/// The region a signature is scoped to, `us-east-1` for none or empty.
pub(crate) fn scope_region(region: Option<&str>) -> &str {
    region.filter(|r| !r.is_empty()).unwrap_or(DEFAULT_REGION)
}

/// Scope: "20220313/<region>/s3/aws4_request"
fn scope(timestamp: &str, region: Option<&str>) -> Result<String> {
    let date = format_date(parse_iso8601(timestamp)?);
    Ok(format!(
        "{date}/{}/{S3_SERVICE}/aws4_request",
        scope_region(region)
    ))
}

/// The signed header list is the line before the payload hash.
fn signed_headers_of(canonical_request: &str) -> Result<&str> {
    canonical_request
        .lines()
        .rev()
        .nth(1)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::request_invalid("canonical request has no signed headers"))
}

fn canonical_request(
    method: &Method,
    path: &str,
    query: &str,
    headers: &HeaderMap,
    payload_hash: &str,
) -> Result<String> {
    // 256 is specially chosen to avoid reallocation for most requests.
    let mut f = String::with_capacity(256);

    writeln!(f, "{method}")?;
    writeln!(f, "{path}")?;
    writeln!(f, "{query}")?;

    let mut signed_headers = headers.keys().map(|k| k.as_str()).collect::<Vec<_>>();
    signed_headers.sort_unstable();
    for name in signed_headers.iter() {
        let mut values = Vec::with_capacity(1);
        for v in headers.get_all(*name) {
            values.push(v.to_str()?.trim_matches(|c| c == ' ' || c == '\t'));
        }
        writeln!(f, "{name}:{}", values.join(","))?;
    }
    writeln!(f)?;
    writeln!(f, "{}", signed_headers.join(";"))?;
    write!(f, "{payload_hash}")?;

    Ok(f)
}

/// URI encode a path, keeping `/` and existing `%XX` escapes.
fn canonical_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let bs = path.as_bytes();
    let mut s = String::with_capacity(path.len());
    let mut start = 0;
    let mut i = 0;
    while i < bs.len() {
        let escaped = bs[i] == b'%'
            && i + 2 < bs.len()
            && bs[i + 1].is_ascii_hexdigit()
            && bs[i + 2].is_ascii_hexdigit();
        if !escaped {
            i += 1;
            continue;
        }

        s.extend(utf8_percent_encode(&path[start..i], &AWS_URI_ENCODE_SET));
        s.push('%');
        s.push(bs[i + 1].to_ascii_uppercase() as char);
        s.push(bs[i + 2].to_ascii_uppercase() as char);
        i += 3;
        start = i;
    }
    s.extend(utf8_percent_encode(&path[start..], &AWS_URI_ENCODE_SET));

    s
}

/// Encode decoded query pairs and sort them by key, then value.
fn canonical_query(query: &[(String, String)]) -> Vec<(String, String)> {
    let mut query = query
        .iter()
        .map(|(k, v)| {
            (
                utf8_percent_encode(k, &AWS_QUERY_ENCODE_SET).to_string(),
                utf8_percent_encode(v, &AWS_QUERY_ENCODE_SET).to_string(),
            )
        })
        .collect::<Vec<_>>();
    query.sort();
    query
}

/// `a=1&b=&c=3`, valueless keys keep their `=`.
fn canonical_query_string(query: &[(String, String)]) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn canonicalize_header(
    ctx: &mut SigningRequest,
    cred: &Credential,
    method: SigningMethod,
    now: DateTime,
) -> Result<()> {
    for (_, value) in ctx.headers.iter_mut() {
        SigningRequest::header_value_normalize(value)?;
    }
    ctx.headers.remove(header::AUTHORIZATION);

    // Insert HOST header if not present.
    if ctx.headers.get(header::HOST).is_none() {
        ctx.headers
            .insert(header::HOST, HeaderValue::from_str(ctx.authority.as_str())?);
    }

    if method == SigningMethod::Header {
        // Insert DATE header if not present.
        if ctx.headers.get(X_AMZ_DATE).is_none() {
            ctx.headers
                .insert(X_AMZ_DATE, HeaderValue::try_from(format_iso8601(now))?);
        }

        // Insert X_AMZ_CONTENT_SHA_256 header if not present.
        if ctx.headers.get(X_AMZ_CONTENT_SHA_256).is_none() {
            ctx.headers.insert(
                X_AMZ_CONTENT_SHA_256,
                HeaderValue::from_static(UNSIGNED_PAYLOAD),
            );
        }

        // Insert X_AMZ_SECURITY_TOKEN header if security token exists.
        if let Some(token) = &cred.session_token {
            let mut value = HeaderValue::from_str(token)?;
            // Set token value sensitive to valid leaking.
            value.set_sensitive(true);

            ctx.headers.insert(X_AMZ_SECURITY_TOKEN, value);
        }
    }

    Ok(())
}

fn canonicalize_query(
    ctx: &mut SigningRequest,
    cred: &Credential,
    method: SigningMethod,
    timestamp: &str,
    region: Option<&str>,
) -> Result<()> {
    if let SigningMethod::Query(expire) = method {
        let signed_headers = ctx.header_name_to_vec_sorted().join(";");
        ctx.query_push(X_AMZ_ALGORITHM_QUERY, AWS4_HMAC_SHA256);
        ctx.query_push(
            X_AMZ_CREDENTIAL_QUERY,
            format!("{}/{}", cred.access_key_id, scope(timestamp, region)?),
        );
        ctx.query_push(X_AMZ_DATE_QUERY, timestamp);
        ctx.query_push(X_AMZ_EXPIRES_QUERY, expire.as_secs().to_string());
        ctx.query_push(X_AMZ_SIGNED_HEADERS_QUERY, signed_headers);

        if let Some(token) = &cred.session_token {
            ctx.query_push(X_AMZ_SECURITY_TOKEN_QUERY, token.as_str());
        }
    }

    ctx.query = canonical_query(&ctx.query);

    Ok(())
}
