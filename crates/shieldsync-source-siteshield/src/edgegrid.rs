//! EdgeGrid request signing
//!
//! Akamai APIs authenticate with the `EG1-HMAC-SHA256` scheme: each request
//! carries an `Authorization` header holding the client and access tokens,
//! a UTC timestamp, a per-request nonce, and a signature over the request
//! line. The signing key is itself derived from the client secret and the
//! timestamp, so a header is only valid close to the moment it was minted.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// EdgeGrid API client credentials
///
/// The `Debug` implementation redacts every field; credentials must never
/// reach logs.
#[derive(Clone)]
pub struct EdgeGridCredentials {
    /// Client token ("akab-…")
    pub client_token: String,
    /// Client secret
    pub client_secret: String,
    /// Access token ("akab-…")
    pub access_token: String,
}

impl std::fmt::Debug for EdgeGridCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeGridCredentials")
            .field("client_token", &"<REDACTED>")
            .field("client_secret", &"<REDACTED>")
            .field("access_token", &"<REDACTED>")
            .finish()
    }
}

/// Signs requests with the `EG1-HMAC-SHA256` scheme
pub struct EdgeGridSigner {
    credentials: EdgeGridCredentials,
}

impl EdgeGridSigner {
    /// Create a signer from credentials
    pub fn new(credentials: EdgeGridCredentials) -> Self {
        Self { credentials }
    }

    /// Produce the `Authorization` header value for one request
    ///
    /// `body` is hashed into the signature for POST requests only; the
    /// scheme ignores request bodies on other methods.
    pub fn authorization(&self, method: &str, url: &Url, body: &[u8]) -> String {
        self.authorization_at(method, url, body, Utc::now(), Uuid::new_v4())
    }

    /// Deterministic variant with caller-supplied timestamp and nonce
    fn authorization_at(
        &self,
        method: &str,
        url: &Url,
        body: &[u8],
        now: DateTime<Utc>,
        nonce: Uuid,
    ) -> String {
        let timestamp = now.format("%Y%m%dT%H:%M:%S+0000").to_string();

        let auth_base = format!(
            "EG1-HMAC-SHA256 client_token={};access_token={};timestamp={};nonce={};",
            self.credentials.client_token, self.credentials.access_token, timestamp, nonce
        );

        let content_hash = if method == "POST" && !body.is_empty() {
            BASE64.encode(Sha256::digest(body))
        } else {
            String::new()
        };

        let path_and_query = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        // Tab-separated request line; the headers field stays empty because
        // we sign no additional headers.
        let data_to_sign = [
            method,
            url.scheme(),
            url.host_str().unwrap_or_default(),
            &path_and_query,
            "",
            &content_hash,
            &auth_base,
        ]
        .join("\t");

        let signing_key = BASE64.encode(hmac_sha256(
            self.credentials.client_secret.as_bytes(),
            timestamp.as_bytes(),
        ));
        let signature = BASE64.encode(hmac_sha256(
            signing_key.as_bytes(),
            data_to_sign.as_bytes(),
        ));

        format!("{auth_base}signature={signature}")
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC-SHA256 accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signer() -> EdgeGridSigner {
        EdgeGridSigner::new(EdgeGridCredentials {
            client_token: "akab-client-token".to_string(),
            client_secret: "client-secret".to_string(),
            access_token: "akab-access-token".to_string(),
        })
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap()
    }

    fn fixed_nonce() -> Uuid {
        Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff)
    }

    #[test]
    fn header_carries_scheme_tokens_and_signature() {
        let url = Url::parse("https://akab-host.luna.akamaiapis.net/siteshield/v1/maps").unwrap();
        let header = signer().authorization_at("GET", &url, b"", fixed_time(), fixed_nonce());

        assert!(header.starts_with("EG1-HMAC-SHA256 "));
        assert!(header.contains("client_token=akab-client-token;"));
        assert!(header.contains("access_token=akab-access-token;"));
        assert!(header.contains("timestamp=20240301T12:30:45+0000;"));
        assert!(header.contains("signature="));
        // The secret itself never appears
        assert!(!header.contains("client-secret"));
    }

    #[test]
    fn signing_is_deterministic_for_fixed_inputs() {
        let url = Url::parse("https://akab-host.luna.akamaiapis.net/siteshield/v1/maps").unwrap();
        let a = signer().authorization_at("GET", &url, b"", fixed_time(), fixed_nonce());
        let b = signer().authorization_at("GET", &url, b"", fixed_time(), fixed_nonce());
        assert_eq!(a, b);
    }

    #[test]
    fn nonce_method_and_query_each_change_the_signature() {
        let url = Url::parse("https://akab-host.luna.akamaiapis.net/siteshield/v1/maps").unwrap();
        let with_query =
            Url::parse("https://akab-host.luna.akamaiapis.net/siteshield/v1/maps?x=1").unwrap();
        let base = signer().authorization_at("GET", &url, b"", fixed_time(), fixed_nonce());

        let other_nonce = signer().authorization_at(
            "GET",
            &url,
            b"",
            fixed_time(),
            Uuid::from_u128(1),
        );
        let other_method = signer().authorization_at("POST", &url, b"", fixed_time(), fixed_nonce());
        let other_path = signer().authorization_at("GET", &with_query, b"", fixed_time(), fixed_nonce());

        assert_ne!(base, other_nonce);
        assert_ne!(
            base.rsplit("signature=").next(),
            other_method.rsplit("signature=").next()
        );
        assert_ne!(
            base.rsplit("signature=").next(),
            other_path.rsplit("signature=").next()
        );
    }

    #[test]
    fn post_body_is_hashed_into_the_signature() {
        let url = Url::parse("https://akab-host.luna.akamaiapis.net/siteshield/v1/maps").unwrap();
        let empty = signer().authorization_at("POST", &url, b"", fixed_time(), fixed_nonce());
        let with_body =
            signer().authorization_at("POST", &url, b"{\"x\":1}", fixed_time(), fixed_nonce());
        assert_ne!(empty, with_body);
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let credentials = EdgeGridCredentials {
            client_token: "token-12345".to_string(),
            client_secret: "secret-12345".to_string(),
            access_token: "access-12345".to_string(),
        };
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("12345"));
        assert!(rendered.contains("REDACTED"));
    }
}
