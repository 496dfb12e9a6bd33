use sha2::{Digest, Sha256};

/// The headers that participate in the canonical request. Per §4.6 the set
/// is fixed at `{"content-type"}` intersected with headers actually present
/// — adding a header here would be a protocol version bump, not a config
/// knob, so it stays a `const` rather than a parameter.
const SIGNED_HEADER_NAMES: &[&str] = &["content-type"];

/// The inputs that fully determine a canonical request (§3 `SignedRequest`,
/// §4.6). Built fresh per call on both the signing and verifying side from
/// the bytes actually sent/received — never trust a caller-supplied digest.
#[derive(Debug, Clone)]
pub struct CanonicalRequest<'a> {
    pub method: &'a str,
    /// Path only, no query string or fragment.
    pub path: &'a str,
    /// Raw query string (no leading `?`), empty if none.
    pub query: &'a str,
    /// `content-type` header value, if the request carried one.
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

impl CanonicalRequest<'_> {
    /// Build the canonical request string (§4.6). Exposed mainly for tests;
    /// callers normally want [`Self::digest`].
    #[must_use]
    pub fn canonicalize(&self) -> String {
        let http_method = self.method.to_uppercase();
        let canonical_uri = if self.path.is_empty() { "/" } else { self.path };
        let canonical_query = canonicalize_query(self.query);
        let (canonical_headers, signed_headers) = canonicalize_headers(self.content_type);
        let body_sha256 = hex_sha256(self.body);

        [
            http_method.as_str(),
            canonical_uri,
            canonical_query.as_str(),
            canonical_headers.as_str(),
            signed_headers.as_str(),
            body_sha256.as_str(),
        ]
        .join("\n")
    }

    /// Hex-encoded SHA-256 of [`Self::canonicalize`] — the
    /// `canonical_request_sha256` JWT claim value.
    #[must_use]
    pub fn digest(&self) -> String {
        hex_sha256(self.canonicalize().as_bytes())
    }
}

/// Convenience free function mirroring [`CanonicalRequest::digest`].
#[must_use]
pub fn canonical_request_digest(req: &CanonicalRequest<'_>) -> String {
    req.digest()
}

/// Sort query pairs by `(key, value)` and rejoin with `&`, keeping raw
/// (non-re-encoded) values, per §4.6.
fn canonicalize_query(raw_query: &str) -> String {
    let mut pairs: Vec<(&str, &str)> = raw_query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|kv| kv.split_once('=').unwrap_or((kv, "")))
        .collect();
    pairs.sort_unstable();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// `canonical_headers` = for each included header,
/// `lowercase(name) + ":" + trim(value) + "\n"`, where the included set is
/// `{"content-type"} ∩ headers present`. `signed_headers` is the
/// semicolon-joined sorted list of included header names.
fn canonicalize_headers(content_type: Option<&str>) -> (String, String) {
    let mut included: Vec<(&str, &str)> = Vec::new();
    if let Some(value) = content_type {
        for name in SIGNED_HEADER_NAMES {
            if *name == "content-type" {
                included.push((name, value.trim()));
            }
        }
    }
    included.sort_unstable_by_key(|(name, _)| *name);

    let canonical_headers: String = included
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers = included
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    (canonical_headers, signed_headers)
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
