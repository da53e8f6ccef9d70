//! Deep links: `<base>/verify/<percent-encoded token>?c=<checksum>`.

use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use url::Url;

use crate::error::TokenError;

const VERIFY_SEGMENT: &str = "verify";
const CHECKSUM_PARAM: &str = "c";

pub fn build_deep_link(base: &Url, token: &str, checksum: &str) -> Result<Url, TokenError> {
    let base = base.as_str().trim_end_matches('/');
    let encoded = utf8_percent_encode(token, NON_ALPHANUMERIC);
    let link = format!("{base}/{VERIFY_SEGMENT}/{encoded}?{CHECKSUM_PARAM}={checksum}");
    Url::parse(&link).map_err(|e| TokenError::DeepLink(e.to_string()))
}

/// Parsed deep link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLink {
    pub token: String,
    pub checksum: Option<String>,
}

/// Extract the token and checksum from a deep link.
pub fn parse_deep_link(link: &str) -> Result<DeepLink, TokenError> {
    let url = Url::parse(link).map_err(|e| TokenError::DeepLink(e.to_string()))?;
    let segments: Vec<&str> = url
        .path_segments()
        .ok_or_else(|| TokenError::DeepLink("link has no path".into()))?
        .collect();
    let token = match segments.as_slice() {
        [.., verify, token] if *verify == VERIFY_SEGMENT && !token.is_empty() => percent_decode_str(token)
            .decode_utf8()
            .map_err(|e| TokenError::DeepLink(e.to_string()))?
            .into_owned(),
        _ => return Err(TokenError::DeepLink(format!("expected /{VERIFY_SEGMENT}/<token>"))),
    };
    let checksum = url
        .query_pairs()
        .find(|(k, _)| k == CHECKSUM_PARAM)
        .map(|(_, v)| v.into_owned());
    Ok(DeepLink { token, checksum })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_survives_the_link() {
        let base = Url::parse("https://verify.example.org/app/").unwrap();
        let token = "ab+/cd==";
        let link = build_deep_link(&base, token, "0123456789abcdef").unwrap();
        assert_eq!(
            link.as_str(),
            "https://verify.example.org/app/verify/ab%2B%2Fcd%3D%3D?c=0123456789abcdef"
        );
        let parsed = parse_deep_link(link.as_str()).unwrap();
        assert_eq!(parsed.token, token);
        assert_eq!(parsed.checksum.as_deref(), Some("0123456789abcdef"));
    }

    #[test]
    fn checksum_is_optional() {
        let parsed = parse_deep_link("https://x.test/verify/abc").unwrap();
        assert_eq!(parsed.checksum, None);
    }

    #[test]
    fn wrong_shape_is_rejected() {
        assert!(parse_deep_link("https://x.test/other/abc").is_err());
        assert!(parse_deep_link("https://x.test/verify/").is_err());
        assert!(parse_deep_link("not a url").is_err());
    }
}
