//! HTTP helpers for extracting request information and protocol headers.

use actix_web::{HttpMessage, HttpRequest};

/// Header carrying the hex HMAC signature
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Header carrying the decimal signing timestamp
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

/// Header used to correlate a request across both services
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Signature metadata attached to an inbound sync request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub signature: String,
    pub timestamp: u64,
}

/// Read `X-Signature` and `X-Timestamp`, describing the first problem found
pub fn extract_signature_headers(req: &HttpRequest) -> Result<SignatureHeaders, &'static str> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or("Missing X-Signature header")?;

    let timestamp = req
        .headers()
        .get(TIMESTAMP_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or("Missing X-Timestamp header")?
        .trim()
        .parse()
        .map_err(|_| "Invalid X-Timestamp format")?;

    Ok(SignatureHeaders {
        signature: signature.trim().to_string(),
        timestamp,
    })
}

/// Extract client IP address from request headers
///
/// Prefers the first hop of `X-Forwarded-For`, then `X-Real-IP`, then the
/// peer address of the connection.
pub fn extract_client_ip(req: &HttpRequest) -> String {
    for header_name in ["X-Forwarded-For", "X-Real-IP"] {
        let first_hop = req
            .headers()
            .get(header_name)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        if let Some(ip) = first_hop {
            return ip.to_string();
        }
    }

    req.connection_info()
        .peer_addr()
        .unwrap_or("unknown")
        .to_string()
}

/// Extract user agent from request headers
pub fn extract_user_agent(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("User-Agent")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}

/// Request id stored by the request id middleware, if it ran
pub fn extract_request_id(req: &HttpRequest) -> Option<String> {
    req.extensions().get::<String>().cloned()
}

/// Route label for metrics: the matched pattern, so parameterised paths group together
pub fn route_label(req: &HttpRequest) -> String {
    req.match_pattern()
        .unwrap_or_else(|| "unmatched".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_extract_signature_headers() {
        let req = TestRequest::default()
            .insert_header((SIGNATURE_HEADER, "abc"))
            .insert_header((TIMESTAMP_HEADER, "1700000000"))
            .to_http_request();

        let headers = extract_signature_headers(&req).unwrap();
        assert_eq!(headers.signature, "abc");
        assert_eq!(headers.timestamp, 1_700_000_000);
    }

    #[test]
    fn test_extract_signature_headers_errors() {
        let missing_signature = TestRequest::default()
            .insert_header((TIMESTAMP_HEADER, "1700000000"))
            .to_http_request();
        assert_eq!(
            extract_signature_headers(&missing_signature),
            Err("Missing X-Signature header")
        );

        let missing_timestamp = TestRequest::default()
            .insert_header((SIGNATURE_HEADER, "abc"))
            .to_http_request();
        assert_eq!(
            extract_signature_headers(&missing_timestamp),
            Err("Missing X-Timestamp header")
        );

        let bad_timestamp = TestRequest::default()
            .insert_header((SIGNATURE_HEADER, "abc"))
            .insert_header((TIMESTAMP_HEADER, "-5"))
            .to_http_request();
        assert_eq!(
            extract_signature_headers(&bad_timestamp),
            Err("Invalid X-Timestamp format")
        );
    }

    #[test]
    fn test_extract_client_ip_prefers_forwarded_for() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .insert_header(("X-Real-IP", "198.51.100.2"))
            .to_http_request();
        assert_eq!(extract_client_ip(&req), "203.0.113.7");

        let req = TestRequest::default()
            .insert_header(("X-Real-IP", "198.51.100.2"))
            .to_http_request();
        assert_eq!(extract_client_ip(&req), "198.51.100.2");
    }
}
