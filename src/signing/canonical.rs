//! Canonical request building for AWS Signature V4.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::{BTreeMap, BTreeSet};

/// Characters left as-is in query strings and path segments.
const UNRESERVED_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// URI-encode a single value with the SigV4 unreserved set.
pub fn uri_encode(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED_SET).to_string()
}

/// Decode a value that may already be percent-encoded, then encode it once.
fn normalize(value: &str) -> String {
    let decoded = percent_decode_str(value).decode_utf8_lossy();
    uri_encode(&decoded)
}

/// Build the canonical URI from an already-encoded URL path.
///
/// Each segment is encoded exactly once, so `a%20b` and `a b` both
/// canonicalize to `a%20b`.
pub fn build_canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    normalized
        .split('/')
        .map(normalize)
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the canonical query string.
///
/// Parameters are sorted by encoded name, then by encoded value. A bare
/// flag such as `uploads` becomes `uploads=`.
pub fn build_canonical_query_string(query_string: &str) -> String {
    let mut params: Vec<(String, String)> = query_string
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (normalize(key), normalize(value))
        })
        .collect();

    params.sort();

    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical headers block.
///
/// Header names are lowercased and sorted; values have runs of whitespace
/// collapsed. Repeated headers are comma-joined.
pub fn build_canonical_headers(headers: &[(String, String)]) -> String {
    let mut header_map: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (name, value) in headers {
        let name_lower = name.to_lowercase();
        if !super::should_sign_header(&name_lower) {
            continue;
        }

        let trimmed = value.split_whitespace().collect::<Vec<_>>().join(" ");
        header_map.entry(name_lower).or_default().push(trimmed);
    }

    header_map
        .iter()
        .map(|(name, values)| format!("{}:{}\n", name, values.join(",")))
        .collect()
}

/// Build the semicolon-separated signed headers list.
pub fn build_signed_headers(headers: &[(String, String)]) -> String {
    let names: BTreeSet<String> = headers
        .iter()
        .map(|(name, _)| name.to_lowercase())
        .filter(|name| super::should_sign_header(name))
        .collect();

    names.into_iter().collect::<Vec<_>>().join(";")
}

/// Build the canonical request string.
///
/// ```text
/// HTTPMethod\n
/// CanonicalURI\n
/// CanonicalQueryString\n
/// CanonicalHeaders\n
/// SignedHeaders\n
/// HashedPayload
/// ```
pub fn build_canonical_request(
    method: &str,
    uri: &str,
    query_string: &str,
    headers: &[(String, String)],
    payload_hash: &str,
) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method.to_uppercase(),
        build_canonical_uri(uri),
        build_canonical_query_string(query_string),
        build_canonical_headers(headers),
        build_signed_headers(headers),
        payload_hash
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("foo"), "foo");
        assert_eq!(uri_encode("foo bar"), "foo%20bar");
        assert_eq!(uri_encode("a/b=c"), "a%2Fb%3Dc");
    }

    #[test]
    fn test_canonical_uri_encodes_once() {
        assert_eq!(build_canonical_uri(""), "/");
        assert_eq!(build_canonical_uri("/bucket/my%20file.bin"), "/bucket/my%20file.bin");
        assert_eq!(build_canonical_uri("/bucket/my file.bin"), "/bucket/my%20file.bin");
        assert_eq!(build_canonical_uri("bucket/dir/key"), "/bucket/dir/key");
    }

    #[test]
    fn test_canonical_query_string() {
        assert_eq!(build_canonical_query_string(""), "");
        assert_eq!(build_canonical_query_string("uploads"), "uploads=");
        assert_eq!(
            build_canonical_query_string("uploadId=abc&partNumber=2"),
            "partNumber=2&uploadId=abc"
        );
        assert_eq!(
            build_canonical_query_string("prefix=a%2Fb&uploads"),
            "prefix=a%2Fb&uploads="
        );
    }

    #[test]
    fn test_signed_headers_filtering() {
        let headers = vec![
            ("Host".to_string(), "example.com".to_string()),
            ("X-Amz-Date".to_string(), "20231215T103045Z".to_string()),
            ("Content-MD5".to_string(), "abc".to_string()),
            ("User-Agent".to_string(), "s3mp".to_string()),
        ];

        assert_eq!(build_signed_headers(&headers), "content-md5;host;x-amz-date");
        let canonical = build_canonical_headers(&headers);
        assert!(canonical.contains("content-md5:abc\n"));
        assert!(!canonical.contains("user-agent"));
    }

    #[test]
    fn test_headers_whitespace_normalization() {
        let headers = vec![
            ("Host".to_string(), "  example.com  ".to_string()),
            ("X-Amz-Meta-Test".to_string(), "value  with   spaces".to_string()),
        ];

        let result = build_canonical_headers(&headers);
        assert!(result.contains("host:example.com\n"));
        assert!(result.contains("x-amz-meta-test:value with spaces\n"));
    }
}
