//! TestFlight
//!
//! Everything that knows about Apple TestFlight public join pages: the
//! status record produced by a fetch, join-URL handling, the HTTP client and
//! the page parser.

pub mod client;
pub mod page;

use url::Url;

pub const TESTFLIGHT_HOST: &str = "testflight.apple.com";

/// The structured result of one successful fetch of a join page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStatus {
    pub app_id: String,
    pub is_full: bool,
    pub name: String,
    pub icon_url: String,
}

pub fn join_url(app_id: &str) -> String {
    format!("https://{TESTFLIGHT_HOST}/join/{app_id}")
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid URL")]
pub struct InvalidAppRef;

/// Resolve an operator-supplied app reference to an app id.
///
/// Accepts either a bare id or a join URL, which must have exactly the shape
/// `http(s)://testflight.apple.com/join/<id>`.
pub fn parse_app_ref(input: &str) -> Result<String, InvalidAppRef> {
    let input = input.trim();
    if !input.starts_with("https://") && !input.starts_with("http://") {
        if input.is_empty() {
            return Err(InvalidAppRef);
        }
        return Ok(input.to_string());
    }

    let url = Url::parse(input).map_err(|_| InvalidAppRef)?;
    if url.host_str() != Some(TESTFLIGHT_HOST) {
        return Err(InvalidAppRef);
    }
    let mut segments = url.path_segments().ok_or(InvalidAppRef)?;
    match (segments.next(), segments.next(), segments.next()) {
        (Some("join"), Some(id), None) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(InvalidAppRef),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_id_passes_through() {
        assert_eq!(parse_app_ref("abc123").unwrap(), "abc123");
        assert_eq!(parse_app_ref("  abc123 ").unwrap(), "abc123");
    }

    #[test]
    fn join_url_is_accepted() {
        assert_eq!(
            parse_app_ref("https://testflight.apple.com/join/abc123").unwrap(),
            "abc123"
        );
        assert_eq!(
            parse_app_ref("http://testflight.apple.com/join/abc123").unwrap(),
            "abc123"
        );
    }

    #[test]
    fn wrong_host_is_rejected() {
        assert!(parse_app_ref("https://wrong-host.com/join/abc123").is_err());
        assert!(parse_app_ref("https://apple.com/join/abc123").is_err());
    }

    #[test]
    fn wrong_shape_is_rejected() {
        assert!(parse_app_ref("https://testflight.apple.com/abc123").is_err());
        assert!(parse_app_ref("https://testflight.apple.com/join/").is_err());
        assert!(parse_app_ref("https://testflight.apple.com/join/abc123/extra").is_err());
        assert!(parse_app_ref("https://testflight.apple.com/").is_err());
        assert!(parse_app_ref("").is_err());
    }

    #[test]
    fn join_url_roundtrip() {
        assert_eq!(join_url("abc123"), "https://testflight.apple.com/join/abc123");
        assert_eq!(parse_app_ref(&join_url("abc123")).unwrap(), "abc123");
    }
}
