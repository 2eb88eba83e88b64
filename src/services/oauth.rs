//! OAuth 1.0 request signing (RFC 5849, HMAC-SHA1)
//!
//! The API accepts only OAuth1-signed requests. Signing covers the query or
//! form parameters of the request, so callers must pass the exact parameter
//! set they send on the wire.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

// RFC 3986 unreserved characters stay bare; everything else is escaped.
const ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, ENCODE_SET).to_string()
}

/// The four opaque secret strings identifying this bot account.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_secret: String,
}

impl Credentials {
    /// Build the `Authorization` header for one request.
    pub fn authorization(&self, method: &str, url: &str, params: &[(&str, &str)]) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
            .to_string();
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        self.sign(method, url, params, &timestamp, &nonce)
    }

    // Deterministic inner signing step, split out so the published test
    // vector can pin the implementation.
    fn sign(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        timestamp: &str,
        nonce: &str,
    ) -> String {
        let oauth_params = [
            ("oauth_consumer_key", self.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp),
            ("oauth_token", self.access_token.as_str()),
            ("oauth_version", "1.0"),
        ];

        let mut encoded: Vec<(String, String)> = params
            .iter()
            .chain(oauth_params.iter())
            .map(|(key, value)| (encode(key), encode(value)))
            .collect();
        encoded.sort();
        let param_string = encoded
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&");

        let base = format!(
            "{}&{}&{}",
            method.to_ascii_uppercase(),
            encode(url),
            encode(&param_string)
        );
        let key = format!(
            "{}&{}",
            encode(&self.consumer_secret),
            encode(&self.access_secret)
        );

        let mut mac =
            HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
        mac.update(base.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());

        let mut header_params: Vec<(&str, String)> = oauth_params
            .iter()
            .map(|(key, value)| (*key, encode(value)))
            .collect();
        header_params.push(("oauth_signature", encode(&signature)));
        header_params.sort();

        let fields = header_params
            .iter()
            .map(|(key, value)| format!(r#"{}="{}""#, key, value))
            .collect::<Vec<_>>()
            .join(", ");
        format!("OAuth {}", fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_encoding_is_rfc3986() {
        assert_eq!(encode("abc-123_~."), "abc-123_~.");
        assert_eq!(encode("a b+c/d=e"), "a%20b%2Bc%2Fd%3De");
    }

    // The HMAC-SHA1 example published in the Twitter API documentation
    // (same parameters as the RFC 5849 walkthrough).
    #[test]
    fn signs_the_published_hmac_sha1_example() {
        let credentials = Credentials {
            consumer_key: "xvz1evFS4wEEPTGEFPHBog".into(),
            consumer_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".into(),
            access_token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".into(),
            access_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".into(),
        };
        let params = [
            ("include_entities", "true"),
            ("status", "Hello Ladies + Gentlemen, a signed OAuth request!"),
        ];

        let header = credentials.sign(
            "POST",
            "https://api.twitter.com/1.1/statuses/update.json",
            &params,
            "1318622958",
            "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
        );

        assert!(header.starts_with("OAuth "));
        assert!(
            header.contains(r#"oauth_signature="tnnArxj06cWHq44gCs1OSKk%2FjLY%3D""#),
            "unexpected header: {}",
            header
        );
    }

    #[test]
    fn header_lists_all_oauth_fields() {
        let credentials = Credentials {
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
            access_token: "at".into(),
            access_secret: "as".into(),
        };
        let header = credentials.authorization("GET", "https://example.org/w/api.php", &[]);
        for field in [
            "oauth_consumer_key",
            "oauth_nonce",
            "oauth_signature",
            "oauth_signature_method",
            "oauth_timestamp",
            "oauth_token",
            "oauth_version",
        ] {
            assert!(header.contains(field), "missing {} in {}", field, header);
        }
    }
}
